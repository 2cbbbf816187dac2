//! Generation-tagged hypothesis field.
//!
//! A checkerboard phase computes its updates against a read-only snapshot of
//! the field and commits them in one step, bumping the generation. Pixels of
//! the committing phase are the only ones written, so every read of a phase
//! sees exactly the values committed by the previous generation.
use super::checkerboard::Phase;
use crate::device::{DeviceBuffer, DeviceContext};
use crate::error::StereoError;
use crate::hypothesis::Plane;

/// Cost of an invalid or unevaluated hypothesis.
pub const MAX_COST: f32 = 2.0;

#[derive(Debug)]
pub struct HypothesisField {
    width: usize,
    height: usize,
    planes: DeviceBuffer<Plane>,
    costs: DeviceBuffer<f32>,
    generation: u64,
}

impl HypothesisField {
    #[track_caller]
    pub fn allocate(ctx: &DeviceContext, width: usize, height: usize) -> Result<Self, StereoError> {
        let len = width * height;
        Ok(Self {
            width,
            height,
            planes: ctx.alloc(len, Plane::default())?,
            costs: ctx.alloc(len, MAX_COST)?,
            generation: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of committed writes since allocation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn plane(&self, idx: usize) -> &Plane {
        &self.planes[idx]
    }

    #[inline]
    pub fn cost(&self, idx: usize) -> f32 {
        self.costs[idx]
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn costs(&self) -> &[f32] {
        &self.costs
    }

    /// Replace the whole field (initialisation); counts as one generation.
    pub fn commit_all(&mut self, values: Vec<(Plane, f32)>) {
        debug_assert_eq!(values.len(), self.planes.len());
        for (idx, (plane, cost)) in values.into_iter().enumerate() {
            self.planes[idx] = plane;
            self.costs[idx] = cost;
        }
        self.generation += 1;
    }

    /// Commit the updates of one checkerboard phase.
    ///
    /// `updates` is indexed by pixel; entries for pixels outside `phase` must
    /// be `None` and are ignored.
    pub fn commit_phase(&mut self, phase: Phase, updates: Vec<Option<(Plane, f32)>>) {
        debug_assert_eq!(updates.len(), self.planes.len());
        let width = self.width;
        for (idx, update) in updates.into_iter().enumerate() {
            let Some((plane, cost)) = update else {
                continue;
            };
            if !phase.owns(idx % width, idx / width) {
                continue;
            }
            self.planes[idx] = plane;
            self.costs[idx] = cost;
        }
        self.generation += 1;
    }
}
