//! Plane hypotheses and the random draws used to seed and refine them.
//!
//! The propagation field stores a [`Plane`] (`n·X + d = 0` in reference camera
//! coordinates). Exported results use [`PlaneHypothesis`] (normal + depth at the
//! pixel), which is what the upsampler and the DMB writers consume.
use crate::camera::{Camera, DepthRange};
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Plane in reference camera coordinates, `normal · X + offset = 0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub offset: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vector3::new(0.0, 0.0, -1.0),
            offset: 0.0,
        }
    }
}

impl Plane {
    /// Plane through pixel `(x, y)` at `depth` with `normal`.
    pub fn from_depth(camera: &Camera, x: f32, y: f32, depth: f32, normal: Vector3<f32>) -> Self {
        Self {
            normal,
            offset: camera.distance_to_origin(x, y, depth, &normal),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.offset.is_finite() && self.normal.iter().all(|v| v.is_finite())
    }
}

/// Per-pixel output value: unit normal plus depth along the viewing ray.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneHypothesis {
    pub normal: Vector3<f32>,
    pub depth: f32,
}

impl PlaneHypothesis {
    pub fn to_plane(&self, camera: &Camera, x: f32, y: f32) -> Plane {
        Plane::from_depth(camera, x, y, self.depth, self.normal)
    }

    /// True when the depth is positive and the normal is usable.
    pub fn is_valid(&self) -> bool {
        self.depth.is_finite()
            && self.depth > 0.0
            && self.normal.iter().all(|v| v.is_finite())
            && self.normal.norm_squared() > 1e-6
    }
}

/// Angle in radians between two (not necessarily unit) vectors.
pub fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let denom = a.norm() * b.norm();
    if denom <= f32::EPSILON {
        return std::f32::consts::PI;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Flip `normal` so it points against the viewing ray.
#[inline]
pub fn face_camera(normal: Vector3<f32>, ray: &Vector3<f32>) -> Vector3<f32> {
    if normal.dot(ray) > 0.0 {
        -normal
    } else {
        normal
    }
}

/// Uniformly distributed unit normal facing the camera along `ray`.
pub fn random_normal<R: Rng + ?Sized>(rng: &mut R, ray: &Vector3<f32>) -> Vector3<f32> {
    let (q1, q2, s) = loop {
        let q1: f32 = rng.gen_range(-1.0..1.0);
        let q2: f32 = rng.gen_range(-1.0..1.0);
        let s = q1 * q1 + q2 * q2;
        if s < 1.0 {
            break (q1, q2, s);
        }
    };
    let root = (1.0 - s).sqrt();
    let n = Vector3::new(2.0 * q1 * root, 2.0 * q2 * root, 1.0 - 2.0 * s);
    face_camera(n.normalize(), ray)
}

/// Random perturbation of `normal` by at most `amplitude` per component.
pub fn perturb_normal<R: Rng + ?Sized>(
    rng: &mut R,
    normal: &Vector3<f32>,
    amplitude: f32,
    ray: &Vector3<f32>,
) -> Vector3<f32> {
    if amplitude <= 0.0 {
        return *normal;
    }
    let noise = Vector3::new(
        rng.gen_range(-amplitude..amplitude),
        rng.gen_range(-amplitude..amplitude),
        rng.gen_range(-amplitude..amplitude),
    );
    let n = normal + noise;
    let norm = n.norm();
    if norm <= f32::EPSILON {
        return *normal;
    }
    face_camera(n / norm, ray)
}

/// Uniform depth draw inside `range`.
pub fn random_depth<R: Rng + ?Sized>(rng: &mut R, range: &DepthRange) -> f32 {
    if range.span() <= 0.0 {
        return range.min;
    }
    rng.gen_range(range.min..range.max)
}

/// Depth perturbed by a relative `amplitude`, kept inside `range`.
pub fn perturb_depth<R: Rng + ?Sized>(
    rng: &mut R,
    depth: f32,
    amplitude: f32,
    range: &DepthRange,
) -> f32 {
    if amplitude <= 0.0 {
        return depth;
    }
    let lo = ((1.0 - amplitude) * depth).max(range.min);
    let hi = ((1.0 + amplitude) * depth).min(range.max);
    if hi <= lo {
        return depth.clamp(range.min, range.max);
    }
    rng.gen_range(lo..hi)
}

/// Random camera-facing plane through pixel `(x, y)` with a depth in `range`.
pub fn random_plane<R: Rng + ?Sized>(
    rng: &mut R,
    camera: &Camera,
    x: f32,
    y: f32,
    range: &DepthRange,
) -> Plane {
    let ray = camera.ray(x, y);
    let normal = random_normal(rng, &ray);
    let depth = random_depth(rng, range);
    Plane::from_depth(camera, x, y, depth, normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn camera() -> Camera {
        Camera {
            k: Matrix3::new(100.0, 0.0, 32.0, 0.0, 100.0, 24.0, 0.0, 0.0, 1.0),
            width: 64,
            height: 48,
            depth_min: 1.0,
            depth_max: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn random_planes_face_camera_and_stay_in_range() {
        let cam = camera();
        let range = DepthRange::new(1.0, 5.0);
        let mut rng = SmallRng::seed_from_u64(7);
        for i in 0..500 {
            let (x, y) = ((i % 64) as f32, (i / 64) as f32);
            let plane = random_plane(&mut rng, &cam, x, y, &range);
            assert!((plane.normal.norm() - 1.0).abs() < 1e-4);
            assert!(plane.normal.dot(&cam.ray(x, y)) <= 0.0);
            let depth = cam.depth_from_plane(&plane, x, y).expect("valid depth");
            assert!(depth >= 0.999 && depth <= 5.001, "depth {depth} out of range");
        }
    }

    #[test]
    fn perturbed_depth_respects_range() {
        let range = DepthRange::new(2.0, 3.0);
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..200 {
            let d = perturb_depth(&mut rng, 2.99, 0.1, &range);
            assert!((2.0..=3.0).contains(&d));
        }
    }

    #[test]
    fn angle_between_orthogonal_vectors() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 2.0, 0.0);
        assert!((angle_between(&a, &b) - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
