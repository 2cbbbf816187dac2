//! Planar prior built from a converged depth map.
//!
//! Pipeline:
//! - Support points: per-tile lowest-cost pixels, split by textureness
//!   ([`support`]).
//! - Delaunay triangulation of the support points ([`delaunay`]).
//! - One plane per triangle, fitted through the back-projected vertices
//!   ([`fit`]).
//! - Rasterisation into a per-pixel id/plane field consumed by the
//!   propagation cost ([`raster`]).
//!
//! A prior built at a coarse level can be lifted to a finer one with
//! [`upsample_prior`], which blends the prior depth/normal with the joint
//! bilateral upsampler and re-derives per-pixel planes.

pub mod delaunay;
pub mod fit;
pub mod raster;
pub mod support;

pub use delaunay::{triangulate, Triangle};
pub use fit::{fit_plane, fit_triangle_plane};
pub use raster::{PriorField, INHERITED_MASK};
pub use support::{select_support_points, SupportParams, SupportPoint};

use crate::camera::Camera;
use crate::device::DeviceContext;
use crate::edges::texture_field;
use crate::error::StereoError;
use crate::hypothesis::{face_camera, Plane};
use crate::image::{ImageF32, ImageVec3};
use crate::result::StereoResult;
use crate::upsample::{joint_bilateral_upsample, scale_factor, JbuParams};
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorParams {
    pub support: SupportParams,
    /// Scharr magnitude above which a reference pixel counts as textured.
    pub texture_gradient_threshold: f32,
    /// Fewer accepted support points than this disables the prior.
    pub min_support_points: usize,
}

impl Default for PriorParams {
    fn default() -> Self {
        Self {
            support: SupportParams::default(),
            texture_gradient_threshold: 1.0,
            min_support_points: 3,
        }
    }
}

/// Prior field together with the geometry it was built from.
#[derive(Debug)]
pub struct PriorBuild {
    pub field: PriorField,
    pub support_points: Vec<SupportPoint>,
    pub triangles: Vec<Triangle>,
    pub planes: Vec<Plane>,
}

/// Build the planar prior of `result` at its own resolution.
///
/// `image` is the reference intensity image used for the texture field,
/// `confidence` an optional per-pixel bonus subtracted from the cost.
/// Returns `None` when too few support points survive or the triangulation
/// is empty; propagation then runs without a prior.
pub fn build_prior(
    ctx: &DeviceContext,
    camera: &Camera,
    image: &ImageF32,
    result: &StereoResult,
    confidence: Option<&ImageF32>,
    params: &PriorParams,
) -> Result<Option<PriorBuild>, StereoError> {
    let (w, h) = (result.width(), result.height());
    if (image.w, image.h) != (w, h) {
        return Err(StereoError::dimension_mismatch((w, h), (image.w, image.h)));
    }
    if let Some(c) = confidence.filter(|c| (c.w, c.h) != (w, h)) {
        return Err(StereoError::dimension_mismatch((w, h), (c.w, c.h)));
    }
    let texture = texture_field(image, params.texture_gradient_threshold);
    let support_points: Vec<SupportPoint> =
        select_support_points(&result.cost, confidence, &texture, &params.support)
            .into_iter()
            .filter(|p| {
                let d = result.depth.get(p.x, p.y);
                d.is_finite() && d > 0.0
            })
            .collect();
    if support_points.len() < params.min_support_points.max(3) {
        debug!(
            "build_prior: {} support points, prior disabled",
            support_points.len()
        );
        return Ok(None);
    }

    let mut triangles = Vec::new();
    let mut planes = Vec::new();
    for tri in triangulate(&support_points) {
        if let Some(plane) = fit_triangle_plane(camera, &tri, &result.depth) {
            triangles.push(tri);
            planes.push(plane);
        }
    }
    if triangles.is_empty() {
        debug!("build_prior: empty triangulation, prior disabled");
        return Ok(None);
    }

    let mut field = PriorField::allocate(ctx, w, h)?;
    let covered = field.rasterize(&triangles, &planes);
    debug!(
        "build_prior w={} h={} support={} triangles={} covered={}",
        w,
        h,
        support_points.len(),
        triangles.len(),
        covered
    );
    Ok(Some(PriorBuild {
        field,
        support_points,
        triangles,
        planes,
    }))
}

/// Lift a prior field to the resolution of `guidance`.
///
/// Prior depth and normal are evaluated per coarse pixel, upsampled jointly
/// and turned back into planes through `fine_camera`. Mask ids are copied
/// from the nearest coarse pixel; fine pixels without a usable sample get no
/// prior.
pub fn upsample_prior(
    ctx: &DeviceContext,
    coarse: &PriorField,
    coarse_camera: &Camera,
    fine_camera: &Camera,
    guidance: &ImageF32,
    params: &JbuParams,
) -> Result<PriorField, StereoError> {
    let (cw, ch) = (coarse.width(), coarse.height());
    let (w, h) = (guidance.w, guidance.h);
    let mut depth = ImageF32::new(cw, ch);
    let mut normal = ImageVec3::new(cw, ch);
    for y in 0..ch {
        for x in 0..cw {
            let idx = y * cw + x;
            let Some(plane) = coarse.plane_at(idx) else {
                continue;
            };
            if let Some(d) = coarse_camera.depth_from_plane(plane, x as f32, y as f32) {
                depth.data[idx] = d;
                normal.data[idx] = plane.normal;
            }
        }
    }
    let maps = joint_bilateral_upsample(guidance, &depth, Some(&normal), params);
    let up_normal = maps.normal.unwrap_or_else(|| ImageVec3::new(w, h));
    let scale = scale_factor((w, h), (cw, ch));

    let mut field = PriorField::allocate(ctx, w, h)?;
    if cw == 0 || ch == 0 {
        return Ok(field);
    }
    for y in 0..h {
        for x in 0..w {
            let cx = (x / scale).min(cw - 1);
            let cy = (y / scale).min(ch - 1);
            let mask = coarse.mask_at(cy * cw + cx);
            if mask == 0 {
                continue;
            }
            let idx = y * w + x;
            let d = maps.depth.data[idx];
            let n: Vector3<f32> = up_normal.data[idx];
            if !(d.is_finite() && d > 0.0) || n.norm_squared() < 1e-6 {
                continue;
            }
            let (fx, fy) = (x as f32, y as f32);
            let n = face_camera(n.normalize(), &fine_camera.ray(fx, fy));
            field.set(idx, mask, Plane::from_depth(fine_camera, fx, fy, d, n));
        }
    }
    debug!(
        "upsample_prior {}x{} -> {}x{} coverage={:.3}",
        cw,
        ch,
        w,
        h,
        field.coverage()
    );
    Ok(field)
}
