use super::filters::{SeparableFilter, StaticSeparableFilter, GAUSSIAN_5TAP};

use serde::{Deserialize, Serialize};

/// Options controlling level construction.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidOptions {
    /// Number of levels (>= 1); level `L` is `1 / 2^L` of the working size.
    pub levels: usize,
    /// Longer image side at level 0; larger inputs are downscaled.
    pub max_image_size: usize,
    /// Number of initial downscale steps that apply the separable filter.
    ///
    /// `k >= levels` blurs before every decimation, `0` never blurs.
    pub blur_levels: usize,
    /// Filter used for the separable blur stage.
    #[serde(skip)]
    pub filter: StaticSeparableFilter,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self {
            levels: 1,
            max_image_size: 3200,
            blur_levels: usize::MAX,
            filter: GAUSSIAN_5TAP,
        }
    }
}

impl PyramidOptions {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            ..Self::default()
        }
    }

    pub fn with_blur_levels(mut self, blur_levels: usize) -> Self {
        self.blur_levels = blur_levels;
        self
    }

    pub fn with_max_image_size(mut self, max_image_size: usize) -> Self {
        self.max_image_size = max_image_size;
        self
    }

    pub fn with_filter(mut self, filter: StaticSeparableFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl std::fmt::Debug for PyramidOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyramidOptions")
            .field("levels", &self.levels)
            .field("max_image_size", &self.max_image_size)
            .field("blur_levels", &self.blur_levels)
            .field("filter_taps", &self.filter.taps().len())
            .finish()
    }
}
