use crate::diagnostics::{PyramidStage, TimingBreakdown};
use crate::propagation::RunStats;
use serde::Serialize;

/// Planar-prior pass of one level.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorStage {
    pub support_points: usize,
    pub triangles: usize,
    /// Pixels whose prior came from the coarser level.
    pub inherited_pixels: usize,
    pub coverage: f32,
    pub run: RunStats,
}

/// One pyramid level of a controller run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReport {
    pub level_index: usize,
    pub width: usize,
    pub height: usize,
    /// `true` when the level started from a seed rather than random draws.
    pub reloaded: bool,
    pub run: RunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<PriorStage>,
    pub valid_ratio: f32,
}

/// Trace of one reference view through the controller.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: String,
    pub num_views: usize,
    pub depth_min: f32,
    pub depth_max: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pyramid: Option<PyramidStage>,
    pub levels: Vec<LevelReport>,
    pub mean_cost: f32,
    pub valid_ratio: f32,
    pub peak_device_bytes: usize,
    pub timings: TimingBreakdown,
}
