//! Multi-resolution working levels for hierarchical propagation.
//!
//! Level 0 is every view fitted to the maximum working size. Level `L` has
//! the dimensions `max(1, w0 >> L) × max(1, h0 >> L)`, produced by an
//! optional separable 5-tap Gaussian pre-blur followed by bilinear
//! resampling; cameras are rescaled alongside. Consecutive levels therefore
//! differ by an integer factor of at least 2.
//!
//! Border samples clamp to the image extents.

pub mod filters;
pub mod levels;
pub mod options;

pub use filters::{blur, SeparableFilter, StaticSeparableFilter, GAUSSIAN_5TAP};
pub use levels::{fit_within, level_size, rescale_to, LevelPyramid, PyramidLevel};
pub use options::PyramidOptions;
