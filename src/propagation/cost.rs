//! Matching cost of a plane hypothesis against the source views.
//!
//! Photometric term: `1 - NCC` of a bilateral-weighted window in the reference
//! image and its plane-induced homography warp into a source image, clamped
//! to `[0, MAX_COST]`. Geometric term (optional): forward–backward reprojection
//! error through the source view's depth map, capped and weighted.
use super::field::MAX_COST;
use super::params::PropagationParams;
use super::views::{ViewCosts, MAX_SOURCES};
use crate::camera::Camera;
use crate::device::DeviceResources;
use crate::hypothesis::{angle_between, Plane};
use crate::prior::PriorField;
use nalgebra::{Matrix3, Vector3};

/// Which cost terms are evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostMode {
    Photometric,
    /// Photometric plus reprojection error through neighbour depth maps.
    /// With `mandatory`, a view whose reprojection error reaches the cap
    /// scores `MAX_COST` regardless of its photometric match.
    Geometric { mandatory: bool },
}

#[derive(Clone, Debug)]
struct SourceView {
    camera: Camera,
    /// Reference camera → source camera.
    r_fwd: Matrix3<f32>,
    t_fwd: Vector3<f32>,
    /// Source camera → reference camera.
    r_back: Matrix3<f32>,
    t_back: Vector3<f32>,
}

/// Reference-side window samples around one pixel, shared by every view and
/// every candidate evaluated at that pixel.
#[derive(Clone, Debug)]
pub(crate) struct ReferencePatch {
    offsets: Vec<(f32, f32)>,
    values: Vec<f32>,
    weights: Vec<f32>,
    sum_w: f32,
    mean: f32,
    variance: f32,
}

pub(crate) struct CostEvaluator<'a> {
    params: &'a PropagationParams,
    resources: &'a DeviceResources,
    reference: Camera,
    k_inv: Matrix3<f32>,
    sources: Vec<SourceView>,
    offsets: Vec<(i32, i32)>,
    mode: CostMode,
}

impl<'a> CostEvaluator<'a> {
    pub(crate) fn new(
        params: &'a PropagationParams,
        resources: &'a DeviceResources,
        mode: CostMode,
    ) -> Self {
        let reference = *resources.reference_camera();
        let k_inv = reference.k.try_inverse().unwrap_or_else(Matrix3::identity);
        let sources = (1..resources.num_images())
            .map(|view| {
                let camera = *resources.camera(view);
                let r_fwd = camera.r * reference.r.transpose();
                let t_fwd = camera.t - r_fwd * reference.t;
                let r_back = r_fwd.transpose();
                let t_back = -(r_back * t_fwd);
                SourceView {
                    camera,
                    r_fwd,
                    t_fwd,
                    r_back,
                    t_back,
                }
            })
            .collect();
        let radius = params.patch_radius as i32;
        let step = params.patch_step.max(1);
        let mut offsets = Vec::new();
        for dy in (-radius..=radius).step_by(step) {
            for dx in (-radius..=radius).step_by(step) {
                offsets.push((dx, dy));
            }
        }
        Self {
            params,
            resources,
            reference,
            k_inv,
            sources,
            offsets,
            mode,
        }
    }

    pub(crate) fn params(&self) -> &PropagationParams {
        self.params
    }

    pub(crate) fn num_sources(&self) -> usize {
        self.sources.len().min(MAX_SOURCES)
    }

    pub(crate) fn reference_camera(&self) -> &Camera {
        &self.reference
    }

    pub(crate) fn reference_patch(&self, x: usize, y: usize) -> ReferencePatch {
        let tex = self.resources.image(0);
        let center = tex.fetch(x, y);
        let two_ss = 2.0 * self.params.sigma_spatial * self.params.sigma_spatial;
        let two_sc = 2.0 * self.params.sigma_color * self.params.sigma_color;
        let n = self.offsets.len();
        let mut patch = ReferencePatch {
            offsets: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            weights: Vec::with_capacity(n),
            sum_w: 0.0,
            mean: 0.0,
            variance: 0.0,
        };
        let mut sum_v = 0.0f32;
        let mut sum_vv = 0.0f32;
        for &(dx, dy) in &self.offsets {
            let px = x as f32 + dx as f32;
            let py = y as f32 + dy as f32;
            let value = tex.sample(px, py);
            let spatial = (dx * dx + dy * dy) as f32;
            let diff = value - center;
            let w = (-spatial / two_ss - diff * diff / two_sc).exp();
            patch.offsets.push((px, py));
            patch.values.push(value);
            patch.weights.push(w);
            patch.sum_w += w;
            sum_v += w * value;
            sum_vv += w * value * value;
        }
        if patch.sum_w > 0.0 {
            patch.mean = sum_v / patch.sum_w;
            patch.variance = sum_vv / patch.sum_w - patch.mean * patch.mean;
        }
        patch
    }

    /// Plane-induced homography from reference to source pixels.
    fn homography(&self, src: &SourceView, plane: &Plane) -> Option<Matrix3<f32>> {
        if !plane.is_finite() || plane.offset.abs() <= f32::EPSILON {
            return None;
        }
        let h = src.camera.k
            * (src.r_fwd - (src.t_fwd * plane.normal.transpose()) / plane.offset)
            * self.k_inv;
        Some(h)
    }

    fn photometric_cost(
        &self,
        view: usize,
        patch: &ReferencePatch,
        x: usize,
        y: usize,
        plane: &Plane,
    ) -> f32 {
        if patch.sum_w <= 0.0 || patch.variance < self.params.min_variance {
            return MAX_COST;
        }
        let src = &self.sources[view];
        let Some(h) = self.homography(src, plane) else {
            return MAX_COST;
        };
        let center = h * Vector3::new(x as f32, y as f32, 1.0);
        if center.z <= f32::EPSILON {
            return MAX_COST;
        }
        if !src.camera.contains(center.x / center.z, center.y / center.z) {
            return MAX_COST;
        }

        let tex = self.resources.image(view + 1);
        let mut sum_s = 0.0f32;
        let mut sum_ss = 0.0f32;
        let mut sum_rs = 0.0f32;
        for ((&(px, py), &w), &r) in patch
            .offsets
            .iter()
            .zip(&patch.weights)
            .zip(&patch.values)
        {
            let p = h * Vector3::new(px, py, 1.0);
            if p.z <= f32::EPSILON {
                return MAX_COST;
            }
            let s = tex.sample(p.x / p.z, p.y / p.z);
            sum_s += w * s;
            sum_ss += w * s * s;
            sum_rs += w * r * s;
        }
        let inv = 1.0 / patch.sum_w;
        let mean_s = sum_s * inv;
        let var_s = sum_ss * inv - mean_s * mean_s;
        if var_s < self.params.min_variance {
            return MAX_COST;
        }
        let covar = sum_rs * inv - patch.mean * mean_s;
        let ncc = covar / (patch.variance * var_s).sqrt();
        if !ncc.is_finite() {
            return MAX_COST;
        }
        (1.0 - ncc).clamp(0.0, MAX_COST)
    }

    /// Forward–backward reprojection error (pixels) through the depth map of
    /// source `view`, capped at `max_reprojection_error`.
    fn reprojection_error(&self, view: usize, x: usize, y: usize, plane: &Plane) -> f32 {
        let cap = self.params.max_reprojection_error;
        let Some(depth_map) = self.resources.depth(view + 1) else {
            return cap;
        };
        let (fx, fy) = (x as f32, y as f32);
        let Some(depth) = self.reference.depth_from_plane(plane, fx, fy) else {
            return cap;
        };
        let src = &self.sources[view];
        let in_src = src.r_fwd * self.reference.point_in_camera(fx, fy, depth) + src.t_fwd;
        let Some(p) = src.camera.project_camera_point(&in_src) else {
            return cap;
        };
        if !src.camera.contains(p.x, p.y) {
            return cap;
        }
        let sx = depth_map.width() as f32 / src.camera.width.max(1) as f32;
        let sy = depth_map.height() as f32 / src.camera.height.max(1) as f32;
        let src_depth = depth_map.sample(p.x * sx, p.y * sy);
        if !(src_depth.is_finite() && src_depth > 0.0) {
            return cap;
        }
        let back = src.r_back * src.camera.point_in_camera(p.x, p.y, src_depth) + src.t_back;
        let Some(q) = self.reference.project_camera_point(&back) else {
            return cap;
        };
        let err = ((q.x - fx).powi(2) + (q.y - fy).powi(2)).sqrt();
        if err.is_finite() {
            err.min(cap)
        } else {
            cap
        }
    }

    /// Cost of `plane` at `(x, y)` against each source view.
    pub(crate) fn view_costs(
        &self,
        patch: &ReferencePatch,
        x: usize,
        y: usize,
        plane: &Plane,
        out: &mut ViewCosts,
    ) {
        for (view, slot) in out.iter_mut().enumerate().take(self.num_sources()) {
            let photometric = self.photometric_cost(view, patch, x, y, plane);
            *slot = match self.mode {
                CostMode::Photometric => photometric,
                CostMode::Geometric { mandatory } => {
                    let err = self.reprojection_error(view, x, y, plane);
                    if mandatory && err >= self.params.max_reprojection_error {
                        MAX_COST
                    } else {
                        photometric + self.params.geom_weight * err
                    }
                }
            };
        }
    }

    /// Penalty for deviating from the planar prior at pixel `idx`; zero where
    /// the prior is absent.
    pub(crate) fn prior_penalty(
        &self,
        prior: &PriorField,
        idx: usize,
        x: usize,
        y: usize,
        plane: &Plane,
    ) -> f32 {
        let Some(prior_plane) = prior.plane_at(idx) else {
            return 0.0;
        };
        let (fx, fy) = (x as f32, y as f32);
        let Some(prior_depth) = self.reference.depth_from_plane(prior_plane, fx, fy) else {
            return 0.0;
        };
        let weight = self.params.prior_weight;
        let Some(depth) = self.reference.depth_from_plane(plane, fx, fy) else {
            return weight;
        };
        let rel = (depth - prior_depth) / prior_depth;
        let angle = angle_between(&plane.normal, &prior_plane.normal);
        let sd = self.params.prior_depth_sigma;
        let sa = self.params.prior_angle_sigma;
        let similarity = (-(rel * rel) / (2.0 * sd * sd) - (angle * angle) / (2.0 * sa * sa)).exp();
        weight * (1.0 - similarity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceContext;
    use crate::image::ImageF32;

    fn texture(x: usize, y: usize) -> f32 {
        let (x, y) = (x as f32, y as f32);
        0.5 + 0.2 * (0.9 * x + 0.3 * y).sin() + 0.15 * (0.37 * x - 0.8 * y + 1.0).sin()
    }

    fn camera(w: usize, h: usize, tx: f32) -> Camera {
        Camera {
            k: Matrix3::new(100.0, 0.0, w as f32 / 2.0, 0.0, 100.0, h as f32 / 2.0, 0.0, 0.0, 1.0),
            t: Vector3::new(tx, 0.0, 0.0),
            width: w,
            height: h,
            depth_min: 4.0,
            depth_max: 6.0,
            ..Default::default()
        }
    }

    fn fronto(cam: &Camera, depth: f32) -> Plane {
        Plane::from_depth(cam, 0.0, 0.0, depth, Vector3::new(0.0, 0.0, -1.0))
    }

    #[test]
    fn cost_is_invariant_to_affine_photometric_change() {
        let (w, h) = (40, 30);
        let reference = ImageF32::from_fn(w, h, texture);
        let brighter = ImageF32::from_fn(w, h, |x, y| 1.1 * texture(x, y) + 0.03);
        let cams = [camera(w, h, 0.0), camera(w, h, 0.0)];
        let ctx = DeviceContext::new();
        let res = DeviceResources::upload(&ctx, &[reference, brighter], &cams, None).expect("upload");
        let params = PropagationParams::default();
        let eval = CostEvaluator::new(&params, &res, CostMode::Photometric);
        let plane = fronto(&cams[0], 5.0);
        let patch = eval.reference_patch(20, 15);
        let mut costs = [MAX_COST; MAX_SOURCES];
        eval.view_costs(&patch, 20, 15, &plane, &mut costs);
        assert!(costs[0] < 1e-3, "cost {}", costs[0]);
    }

    #[test]
    fn correct_depth_beats_wrong_depth() {
        let (w, h) = (48, 32);
        // Source shifted by disparity f * b / Z = 100 * 0.4 / 5 = 8 px.
        let reference = ImageF32::from_fn(w, h, texture);
        let source = ImageF32::from_fn(w, h, |x, y| {
            let (sx, sy) = (x as f32 + 8.0, y as f32);
            0.5 + 0.2 * (0.9 * sx + 0.3 * sy).sin() + 0.15 * (0.37 * sx - 0.8 * sy + 1.0).sin()
        });
        let cams = [camera(w, h, 0.0), camera(w, h, -0.4)];
        let ctx = DeviceContext::new();
        let res = DeviceResources::upload(&ctx, &[reference, source], &cams, None).expect("upload");
        let params = PropagationParams::default();
        let eval = CostEvaluator::new(&params, &res, CostMode::Photometric);
        let patch = eval.reference_patch(18, 16);
        let mut good = [MAX_COST; MAX_SOURCES];
        let mut bad = [MAX_COST; MAX_SOURCES];
        eval.view_costs(&patch, 18, 16, &fronto(&cams[0], 5.0), &mut good);
        eval.view_costs(&patch, 18, 16, &fronto(&cams[0], 4.4), &mut bad);
        assert!(good[0] < 0.05, "matching cost {}", good[0]);
        assert!(bad[0] > good[0] + 0.1, "wrong depth {} vs {}", bad[0], good[0]);
    }

    #[test]
    fn untextured_window_scores_max_cost() {
        let (w, h) = (20, 20);
        let flat = ImageF32::filled(w, h, 0.4);
        let cams = [camera(w, h, 0.0), camera(w, h, 0.0)];
        let ctx = DeviceContext::new();
        let res =
            DeviceResources::upload(&ctx, &[flat.clone(), flat], &cams, None).expect("upload");
        let params = PropagationParams::default();
        let eval = CostEvaluator::new(&params, &res, CostMode::Photometric);
        let patch = eval.reference_patch(10, 10);
        let mut costs = [0.0; MAX_SOURCES];
        eval.view_costs(&patch, 10, 10, &fronto(&cams[0], 5.0), &mut costs);
        assert_eq!(costs[0], MAX_COST);
    }

    #[test]
    fn consistent_depth_maps_have_zero_reprojection_error() {
        let (w, h) = (32, 24);
        let image = ImageF32::from_fn(w, h, texture);
        let cams = [camera(w, h, 0.0), camera(w, h, -0.2)];
        let depth = ImageF32::filled(w, h, 5.0);
        let ctx = DeviceContext::new();
        let res = DeviceResources::upload(
            &ctx,
            &[image.clone(), image],
            &cams,
            Some(&[depth.clone(), depth]),
        )
        .expect("upload");
        let params = PropagationParams::default();
        let eval = CostEvaluator::new(&params, &res, CostMode::Geometric { mandatory: true });
        let err = eval.reprojection_error(0, 16, 12, &fronto(&cams[0], 5.0));
        assert!(err < 1e-3, "error {err}");
        let off = eval.reprojection_error(0, 16, 12, &fronto(&cams[0], 4.0));
        assert!(off > 0.5, "error {off}");
    }

    #[test]
    fn prior_penalty_grows_with_distance_from_the_prior_plane() {
        let (w, h) = (20, 20);
        let image = ImageF32::from_fn(w, h, texture);
        let cams = [camera(w, h, 0.0), camera(w, h, 0.0)];
        let ctx = DeviceContext::new();
        let res = DeviceResources::upload(&ctx, &[image.clone(), image], &cams, None).expect("upload");
        let params = PropagationParams::default();
        let eval = CostEvaluator::new(&params, &res, CostMode::Photometric);
        let (x, y) = (10, 10);
        let idx = y * w + x;
        let at_depth = |d: f32| fronto(&cams[0], d);
        let tilted = |a: f32| {
            let n = Vector3::new(a.sin(), 0.0, -a.cos());
            Plane::from_depth(&cams[0], x as f32, y as f32, 5.0, n)
        };

        let mut prior = PriorField::allocate(&ctx, w, h).expect("alloc");
        assert_eq!(eval.prior_penalty(&prior, idx, x, y, &at_depth(4.2)), 0.0);

        prior.set(idx, 1, at_depth(5.0));
        assert!(eval.prior_penalty(&prior, idx, x, y, &at_depth(5.0)).abs() < 1e-6);
        let by_depth: Vec<f32> = [5.1, 5.25, 5.5]
            .iter()
            .map(|&d| eval.prior_penalty(&prior, idx, x, y, &at_depth(d)))
            .collect();
        assert!(by_depth[0] > 0.0);
        assert!(by_depth[0] < by_depth[1] && by_depth[1] < by_depth[2], "{by_depth:?}");
        assert!(by_depth[2] <= params.prior_weight);

        let by_angle: Vec<f32> = [0.1, 0.3, 0.6]
            .iter()
            .map(|&a| eval.prior_penalty(&prior, idx, x, y, &tilted(a)))
            .collect();
        assert!(by_angle[0] > 0.0);
        assert!(by_angle[0] < by_angle[1] && by_angle[1] < by_angle[2], "{by_angle:?}");

        // A plane facing away from the camera has no depth at the pixel.
        let away = Plane {
            normal: Vector3::new(0.0, 0.0, 1.0),
            offset: 5.0,
        };
        assert_eq!(eval.prior_penalty(&prior, idx, x, y, &away), params.prior_weight);
    }
}
