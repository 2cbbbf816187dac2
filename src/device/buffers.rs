use super::DeviceContext;
use crate::error::StereoError;
use crate::propagation::field::HypothesisField;
use log::debug;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Per-pixel working state for one resolution: hypothesis field, selected
/// source views (bitmask) and random generator state.
///
/// Reallocated whenever the working resolution changes.
#[derive(Debug)]
pub struct PixelBuffers {
    pub(crate) field: HypothesisField,
    pub(crate) views: super::DeviceBuffer<u32>,
    pub(crate) rngs: super::DeviceBuffer<SmallRng>,
}

/// Per-pixel generator seed derived from the run seed and the pixel index.
#[inline]
pub(crate) fn pixel_seed(seed: u64, idx: usize) -> u64 {
    seed ^ (idx as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

impl PixelBuffers {
    #[track_caller]
    pub fn allocate(
        ctx: &DeviceContext,
        width: usize,
        height: usize,
        seed: u64,
    ) -> Result<Self, StereoError> {
        let len = width * height;
        let field = HypothesisField::allocate(ctx, width, height)?;
        let views = ctx.alloc(len, 0u32)?;
        let rngs = ctx.alloc_with(len, |idx| SmallRng::seed_from_u64(pixel_seed(seed, idx)))?;
        debug!("PixelBuffers::allocate w={width} h={height} seed={seed}");
        Ok(Self { field, views, rngs })
    }

    pub fn width(&self) -> usize {
        self.field.width()
    }

    pub fn height(&self) -> usize {
        self.field.height()
    }

    pub fn field(&self) -> &HypothesisField {
        &self.field
    }
}
