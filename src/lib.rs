#![doc = include_str!("../README.md")]

// Core model
pub mod camera;
pub mod error;
pub mod hypothesis;
pub mod image;
pub mod params;
pub mod problem;
pub mod result;

// Engine
pub mod device;
pub mod hierarchy;
pub mod prior;
pub mod propagation;
pub mod pyramid;
pub mod upsample;

// Support
pub mod config;
pub mod diagnostics;
pub mod edges;
pub mod io;

// --- High-level re-exports -------------------------------------------------

pub use crate::camera::{Camera, DepthRange};
pub use crate::error::{InputError, StereoError};
pub use crate::hierarchy::{HierarchicalController, ProblemInput, StereoRun, ViewInput};
pub use crate::hypothesis::{Plane, PlaneHypothesis};
pub use crate::params::StereoParams;
pub use crate::problem::Problem;
pub use crate::result::{LevelSeed, StereoResult};

pub use crate::diagnostics::{LevelReport, RunReport};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use patchmatch_mvs::prelude::*;
///
/// # fn main() -> Result<(), StereoError> {
/// # let views: Vec<ViewInput> = Vec::new();
/// let controller = HierarchicalController::new(StereoParams::default().with_hierarchy());
/// let run = controller.run(&ProblemInput::new(views), None)?;
/// println!("valid={:.3}", run.report.valid_ratio);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::{ImageF32, ImageVec3};
    pub use crate::{
        Camera, HierarchicalController, ProblemInput, StereoError, StereoParams, StereoResult,
        ViewInput,
    };
}
