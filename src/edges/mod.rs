//! Image gradients and the derived texture field.
//!
//! - Scharr gradient computation returning `gx`, `gy` and magnitude.
//! - A binary texture field (textured = `1.0`) from the Scharr magnitude,
//!   used to classify support points for the planar prior.
//!
//! Borders are handled by clamping indices (replicate).

pub mod grad;

pub use grad::{scharr_gradients, texture_field, Grad};
