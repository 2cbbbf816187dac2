//! JSON configuration of the batch driver.
pub mod stereo;

pub use stereo::{load_config, OutputConfig, ProblemSource, StereoToolConfig};
