//! Serializable run diagnostics.
//!
//! `RunReport` is returned next to every controller result; the driver writes
//! it as JSON beside the depth maps. It records the level stack, each level's
//! propagation statistics and planar-prior pass, and a timing breakdown.

pub mod pyramid;
pub mod report;
pub mod timing;

pub use pyramid::{PyramidLevelReport, PyramidStage};
pub use report::{LevelReport, PriorStage, RunReport};
pub use timing::{StageTiming, TimingBreakdown};
