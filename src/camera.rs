//! Pinhole camera model and the reference-view geometry helpers.
//!
//! Conventions: `R`, `t` map world to camera (`X_c = R X_w + t`), `K` is the
//! upper-triangular intrinsic matrix, pixel coordinates are texel indices
//! (pixel `(x, y)` sits at `(x, y)`, not at `(x + 0.5, y + 0.5)`).
use crate::hypothesis::Plane;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// World-to-camera rotation
    pub r: Matrix3<f32>,
    /// World-to-camera translation
    pub t: Vector3<f32>,
    /// Intrinsic matrix
    pub k: Matrix3<f32>,
    /// Image width the intrinsics refer to
    pub width: usize,
    /// Image height the intrinsics refer to
    pub height: usize,
    pub depth_min: f32,
    pub depth_max: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            r: Matrix3::identity(),
            t: Vector3::zeros(),
            k: Matrix3::identity(),
            width: 0,
            height: 0,
            depth_min: 0.0,
            depth_max: 0.0,
        }
    }
}

/// Depth search interval for the reference view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: f32,
    pub max: f32,
}

impl DepthRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Range of `camera`, widened by `[lower, upper]` factors.
    pub fn from_camera(camera: &Camera, scale: [f32; 2]) -> Self {
        Self {
            min: camera.depth_min * scale[0],
            max: camera.depth_max * scale[1],
        }
    }

    #[inline]
    pub fn contains(&self, depth: f32) -> bool {
        depth >= self.min && depth <= self.max
    }

    #[inline]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }
}

/// Pixel position and depth of a point projected into a camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

impl Camera {
    #[inline]
    pub fn fx(&self) -> f32 {
        self.k[(0, 0)]
    }
    #[inline]
    pub fn fy(&self) -> f32 {
        self.k[(1, 1)]
    }
    #[inline]
    pub fn cx(&self) -> f32 {
        self.k[(0, 2)]
    }
    #[inline]
    pub fn cy(&self) -> f32 {
        self.k[(1, 2)]
    }

    /// Camera centre in world coordinates.
    pub fn center(&self) -> Vector3<f32> {
        -(self.r.transpose() * self.t)
    }

    /// Copy of the camera with intrinsics rescaled to a `new_w × new_h` image.
    ///
    /// The horizontal terms follow `new_w / width`, the vertical terms follow
    /// `new_h / height`; the two factors may differ.
    pub fn rescaled(&self, new_w: usize, new_h: usize) -> Self {
        let mut out = *self;
        if self.width == 0 || self.height == 0 {
            out.width = new_w;
            out.height = new_h;
            return out;
        }
        let sx = new_w as f32 / self.width as f32;
        let sy = new_h as f32 / self.height as f32;
        out.k[(0, 0)] *= sx;
        out.k[(0, 2)] *= sx;
        out.k[(1, 1)] *= sy;
        out.k[(1, 2)] *= sy;
        out.width = new_w;
        out.height = new_h;
        out
    }

    /// Viewing ray through pixel `(x, y)` with unit z component.
    #[inline]
    pub fn ray(&self, x: f32, y: f32) -> Vector3<f32> {
        Vector3::new((x - self.cx()) / self.fx(), (y - self.cy()) / self.fy(), 1.0)
    }

    /// Back-project pixel `(x, y)` at `depth` into camera coordinates.
    #[inline]
    pub fn point_in_camera(&self, x: f32, y: f32, depth: f32) -> Vector3<f32> {
        self.ray(x, y) * depth
    }

    /// Back-project pixel `(x, y)` at `depth` into world coordinates.
    #[inline]
    pub fn point_in_world(&self, x: f32, y: f32, depth: f32) -> Vector3<f32> {
        self.camera_to_world(&self.point_in_camera(x, y, depth))
    }

    #[inline]
    pub fn camera_to_world(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.r.transpose() * (p - self.t)
    }

    #[inline]
    pub fn world_to_camera(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.r * p + self.t
    }

    /// Project camera-space point `p`; `None` when it lies behind the camera.
    #[inline]
    pub fn project_camera_point(&self, p: &Vector3<f32>) -> Option<Projection> {
        let h = self.k * p;
        if h.z.is_nan() || h.z <= f32::EPSILON || !h.x.is_finite() || !h.y.is_finite() {
            return None;
        }
        Some(Projection {
            x: h.x / h.z,
            y: h.y / h.z,
            depth: p.z,
        })
    }

    /// Project world point `p` into this camera.
    #[inline]
    pub fn project(&self, p: &Vector3<f32>) -> Option<Projection> {
        self.project_camera_point(&self.world_to_camera(p))
    }

    /// True when the pixel coordinate lies inside the image rectangle.
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x <= (self.width as f32 - 1.0) && y <= (self.height as f32 - 1.0)
    }

    /// Depth at which the ray through `(x, y)` meets `plane`, if in front.
    #[inline]
    pub fn depth_from_plane(&self, plane: &Plane, x: f32, y: f32) -> Option<f32> {
        let denom = plane.normal.dot(&self.ray(x, y));
        if denom.is_nan() || denom >= 0.0 {
            return None;
        }
        let depth = -plane.offset / denom;
        (depth.is_finite() && depth > 0.0).then_some(depth)
    }

    /// Offset `d` of the plane with `normal` through pixel `(x, y)` at `depth`.
    #[inline]
    pub fn distance_to_origin(&self, x: f32, y: f32, depth: f32, normal: &Vector3<f32>) -> f32 {
        -normal.dot(&self.point_in_camera(x, y, depth))
    }

    #[inline]
    pub fn normal_to_world(&self, n: &Vector3<f32>) -> Vector3<f32> {
        self.r.transpose() * n
    }
}
