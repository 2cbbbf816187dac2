use serde::{Deserialize, Serialize};

/// Parameters of the checkerboard propagation engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationParams {
    /// Red+black sweeps per photometric run.
    pub max_iterations: usize,
    /// Red+black sweeps per geometric-consistency run.
    pub geom_iterations: usize,
    /// Matching window half-size in pixels.
    pub patch_radius: usize,
    /// Sampling step inside the matching window.
    pub patch_step: usize,
    /// Spatial sigma of the bilateral window weights (pixels).
    pub sigma_spatial: f32,
    /// Intensity sigma of the bilateral window weights (intensities in `[0, 1]`).
    pub sigma_color: f32,
    /// Windows whose weighted variance falls below this are untextured.
    pub min_variance: f32,
    /// Number of best views averaged for the initial cost.
    pub top_k: usize,
    /// Per-view cost counted as "good" at iteration 0; decays with iterations.
    pub good_cost: f32,
    /// Per-view cost counted as "bad".
    pub bad_cost: f32,
    /// Minimum number of good candidates (exclusive) for a view to be selected.
    pub min_good: usize,
    /// Maximum number of bad candidates (exclusive) for a view to be selected.
    pub max_bad: usize,
    /// Width of the cost-to-weight mapping of selected views.
    pub view_weight_beta: f32,
    /// Relative depth perturbation of the refinement draws.
    pub depth_perturbation: f32,
    /// Per-component normal perturbation of the refinement draws.
    pub normal_perturbation: f32,
    /// Weight of the reprojection error in geometric mode.
    pub geom_weight: f32,
    /// Reprojection error cap in pixels.
    pub max_reprojection_error: f32,
    /// Maximum penalty of the planar prior.
    pub prior_weight: f32,
    /// Relative depth sigma of the planar prior.
    pub prior_depth_sigma: f32,
    /// Normal angle sigma of the planar prior (radians).
    pub prior_angle_sigma: f32,
    /// Seed of the per-pixel random generators.
    pub seed: u64,
}

impl Default for PropagationParams {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            geom_iterations: 4,
            patch_radius: 5,
            patch_step: 2,
            sigma_spatial: 5.0,
            sigma_color: 0.1,
            min_variance: 1e-6,
            top_k: 4,
            good_cost: 0.8,
            bad_cost: 1.2,
            min_good: 2,
            max_bad: 3,
            view_weight_beta: 0.3,
            depth_perturbation: 0.02,
            normal_perturbation: 0.06,
            geom_weight: 0.2,
            max_reprojection_error: 3.0,
            prior_weight: 0.5,
            prior_depth_sigma: 0.05,
            prior_angle_sigma: 0.25,
            seed: 0x5EED,
        }
    }
}

impl PropagationParams {
    /// Good-cost threshold at sweep `iteration`.
    pub fn good_threshold(&self, iteration: usize) -> f32 {
        let i = iteration as f32;
        self.good_cost * (-(i * i) / 90.0).exp()
    }
}
