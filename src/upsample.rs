//! Joint bilateral upsampling of coarse depth/normal maps.
//!
//! Each fine pixel blends the coarse samples within `radius` of its
//! projection into the coarse grid. Weights are Gaussian in the coarse-grid
//! distance and in the guidance-intensity difference between the fine pixel
//! and the fine pixel each coarse sample maps to. A pixel with no usable
//! coarse sample in its support falls back to the nearest coarse sample at
//! `(x / scale, y / scale)`, then to zero.
use crate::image::{ImageF32, ImageVec3};
use crate::result::LevelSeed;
use log::debug;
use nalgebra::Vector3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JbuParams {
    /// Support radius in coarse pixels.
    pub radius: usize,
    /// Spatial sigma in coarse pixels.
    pub sigma_spatial: f32,
    /// Range sigma on guidance intensities in `[0, 1]`.
    pub sigma_range: f32,
}

impl Default for JbuParams {
    fn default() -> Self {
        Self {
            radius: 2,
            sigma_spatial: 1.0,
            sigma_range: 0.1,
        }
    }
}

/// Output of [`joint_bilateral_upsample`].
#[derive(Clone, Debug, PartialEq)]
pub struct UpsampledMaps {
    pub depth: ImageF32,
    pub normal: Option<ImageVec3>,
}

/// Integer scale between a target and a coarse resolution (at least 1).
pub fn scale_factor(target: (usize, usize), coarse: (usize, usize)) -> usize {
    let sx = target.0 / coarse.0.max(1);
    let sy = target.1 / coarse.1.max(1);
    sx.max(sy).max(1)
}

#[inline]
fn nearest_coord(v: usize, scale: usize, len: usize) -> usize {
    (v / scale).min(len.saturating_sub(1))
}

#[inline]
fn proportional_coord(v: usize, target: usize, len: usize) -> usize {
    (v * len / target.max(1)).min(len.saturating_sub(1))
}

/// Nearest-neighbour resample of `coarse` to `w × h`. For an integer
/// upscale `s` pixel `(x, y)` reads `(x / s, y / s)`; downscales pick
/// proportionally.
pub fn resample_nearest(coarse: &ImageF32, w: usize, h: usize) -> ImageF32 {
    if coarse.w == 0 || coarse.h == 0 {
        return ImageF32::new(w, h);
    }
    ImageF32::from_fn(w, h, |x, y| {
        coarse.get(
            proportional_coord(x, w, coarse.w),
            proportional_coord(y, h, coarse.h),
        )
    })
}

fn resample_nearest_vec3(coarse: &ImageVec3, w: usize, h: usize) -> ImageVec3 {
    let mut out = ImageVec3::new(w, h);
    if coarse.w == 0 || coarse.h == 0 {
        return out;
    }
    for y in 0..h {
        for x in 0..w {
            let v = coarse.get(
                proportional_coord(x, w, coarse.w),
                proportional_coord(y, h, coarse.h),
            );
            out.set(x, y, v);
        }
    }
    out
}

struct Blend {
    depth: f32,
    normal: Vector3<f32>,
}

fn blend_pixel(
    guidance: &ImageF32,
    depth: &ImageF32,
    normal: Option<&ImageVec3>,
    scale: usize,
    params: &JbuParams,
    x: usize,
    y: usize,
) -> Blend {
    let r = params.radius as i64;
    let two_ss = 2.0 * params.sigma_spatial * params.sigma_spatial;
    let two_sr = 2.0 * params.sigma_range * params.sigma_range;
    let centre_x = x as f32 / scale as f32;
    let centre_y = y as f32 / scale as f32;
    let base_x = centre_x.round() as i64;
    let base_y = centre_y.round() as i64;
    let g0 = guidance.get(x, y);

    let mut sum_w = 0.0f32;
    let mut sum_d = 0.0f32;
    let mut sum_n = Vector3::zeros();
    for j in -r..=r {
        let sy = base_y + j;
        if sy < 0 || sy >= depth.h as i64 {
            continue;
        }
        for i in -r..=r {
            let sx = base_x + i;
            if sx < 0 || sx >= depth.w as i64 {
                continue;
            }
            let (sx, sy) = (sx as usize, sy as usize);
            let d = depth.get(sx, sy);
            if !d.is_finite() || d <= 0.0 {
                continue;
            }
            let dx = sx as f32 - centre_x;
            let dy = sy as f32 - centre_y;
            let g = guidance.get_clamped((sx * scale) as isize, (sy * scale) as isize);
            let dg = g - g0;
            let w = (-(dx * dx + dy * dy) / two_ss - dg * dg / two_sr).exp();
            sum_w += w;
            sum_d += w * d;
            if let Some(normal) = normal {
                sum_n += normal.get(sx, sy) * w;
            }
        }
    }
    Blend {
        depth: sum_d / sum_w,
        normal: sum_n / sum_w,
    }
}

/// Lift `depth` (and `normal`) to the resolution of `guidance`.
///
/// Equal resolutions return the inputs unchanged. A scale of 1 with differing
/// dimensions, or a target smaller than the input, resamples by nearest
/// neighbour. Otherwise every output sample is finite.
pub fn joint_bilateral_upsample(
    guidance: &ImageF32,
    depth: &ImageF32,
    normal: Option<&ImageVec3>,
    params: &JbuParams,
) -> UpsampledMaps {
    let (w, h) = (guidance.w, guidance.h);
    // Normals are sampled at depth coordinates.
    let normal = normal.filter(|n| (n.w, n.h) == (depth.w, depth.h));
    if (depth.w, depth.h) == (w, h) {
        return UpsampledMaps {
            depth: depth.clone(),
            normal: normal.cloned(),
        };
    }
    let scale = scale_factor((w, h), (depth.w, depth.h));
    if scale == 1 || depth.w == 0 || depth.h == 0 || depth.w > w || depth.h > h {
        debug!(
            "joint_bilateral_upsample nearest {}x{} -> {}x{}",
            depth.w, depth.h, w, h
        );
        return UpsampledMaps {
            depth: resample_nearest(depth, w, h),
            normal: normal.map(|n| resample_nearest_vec3(n, w, h)),
        };
    }

    let pixel = |idx: usize| -> (f32, Vector3<f32>) {
        let (x, y) = (idx % w, idx / w);
        let blend = blend_pixel(guidance, depth, normal, scale, params, x, y);
        let nx = nearest_coord(x, scale, depth.w);
        let ny = nearest_coord(y, scale, depth.h);
        let d = if blend.depth.is_finite() {
            blend.depth
        } else {
            let fallback = depth.get(nx, ny);
            if fallback.is_finite() {
                fallback
            } else {
                0.0
            }
        };
        let n = match normal {
            Some(coarse) => {
                let len = blend.normal.norm();
                if len.is_finite() && len > 1e-6 {
                    blend.normal / len
                } else {
                    let fallback = coarse.get(nx, ny);
                    if fallback.iter().all(|c| c.is_finite()) {
                        fallback
                    } else {
                        Vector3::zeros()
                    }
                }
            }
            None => Vector3::zeros(),
        };
        (d, n)
    };

    #[cfg(feature = "parallel")]
    let samples: Vec<(f32, Vector3<f32>)> = (0..w * h).into_par_iter().map(pixel).collect();
    #[cfg(not(feature = "parallel"))]
    let samples: Vec<(f32, Vector3<f32>)> = (0..w * h).map(pixel).collect();

    let mut out_depth = ImageF32::new(w, h);
    let mut out_normal = ImageVec3::new(w, h);
    for (idx, (d, n)) in samples.into_iter().enumerate() {
        out_depth.data[idx] = d;
        out_normal.data[idx] = n;
    }
    debug!(
        "joint_bilateral_upsample {}x{} -> {}x{} scale={} normals={}",
        depth.w,
        depth.h,
        w,
        h,
        scale,
        normal.is_some()
    );
    UpsampledMaps {
        depth: out_depth,
        normal: normal.is_some().then_some(out_normal),
    }
}

/// Bring a warm-start seed to the resolution of `guidance`. The auxiliary
/// cost is resampled by nearest neighbour.
pub fn upsample_seed(guidance: &ImageF32, seed: &LevelSeed, params: &JbuParams) -> LevelSeed {
    let (w, h) = (guidance.w, guidance.h);
    let maps = joint_bilateral_upsample(guidance, &seed.depth, Some(&seed.normal), params);
    let normal = maps
        .normal
        .unwrap_or_else(|| resample_nearest_vec3(&seed.normal, w, h));
    let auxiliary_cost = seed.auxiliary_cost.as_ref().map(|cost| {
        if (cost.w, cost.h) == (w, h) {
            cost.clone()
        } else {
            resample_nearest(cost, w, h)
        }
    });
    LevelSeed {
        depth: maps.depth,
        normal,
        auxiliary_cost,
    }
}
