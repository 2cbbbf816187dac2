//! Checkerboard PatchMatch propagation.
//!
//! One sweep runs the red phase then the black phase. Within a phase every
//! pixel of that colour is updated independently from a snapshot of the
//! field: it gathers the lowest-cost hypothesis of each of the eight neighbour
//! regions, re-selects its source views from the candidates' per-view costs,
//! keeps the best of current and propagated planes under the new view
//! weights, then tries six random refinements. All updates of the phase are
//! committed together.

pub mod checkerboard;
pub mod cost;
pub mod field;
pub mod params;
pub mod refine;
pub mod views;

pub use checkerboard::{NeighborRegions, Phase};
pub use cost::CostMode;
pub use field::{HypothesisField, MAX_COST};
pub use params::PropagationParams;
pub use views::{ViewWeights, MAX_SOURCES};

use crate::camera::DepthRange;
use crate::device::{DeviceResources, PixelBuffers};
use crate::error::StereoError;
use crate::hypothesis::{random_plane, Plane};
use crate::prior::PriorField;
use crate::result::LevelSeed;
use cost::{CostEvaluator, ReferencePatch};
use log::debug;
use rand::rngs::SmallRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use views::ViewCosts;

/// How the field is filled before the first sweep.
#[derive(Clone, Copy, Debug)]
pub enum Initialization<'a> {
    /// Uniform random depth in range and random camera-facing normal.
    Random,
    /// Planes from a seed; pixels that are invalid in the seed, or whose
    /// auxiliary cost is at least `reseed_cost`, fall back to random draws.
    Reload {
        seed: &'a LevelSeed,
        reseed_cost: f32,
    },
}

/// Summary of one `run` call.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub sweeps: usize,
    pub generation: u64,
    pub mean_cost: f32,
    pub elapsed_ms: f64,
}

#[derive(Clone, Debug)]
pub struct PropagationEngine {
    params: PropagationParams,
    regions: NeighborRegions,
}

impl PropagationEngine {
    pub fn new(params: PropagationParams) -> Self {
        Self {
            params,
            regions: NeighborRegions::new(),
        }
    }

    pub fn params(&self) -> &PropagationParams {
        &self.params
    }

    #[track_caller]
    fn check_dimensions(
        resources: &DeviceResources,
        buffers: &PixelBuffers,
    ) -> Result<(), StereoError> {
        let expected = resources.reference_size();
        let actual = (buffers.width(), buffers.height());
        if expected != actual {
            return Err(StereoError::dimension_mismatch(expected, actual));
        }
        Ok(())
    }

    /// Fill the field and compute initial costs as the mean of the `top_k`
    /// best views; the initial view mask holds those views.
    pub fn initialize(
        &self,
        resources: &DeviceResources,
        buffers: &mut PixelBuffers,
        range: DepthRange,
        mode: CostMode,
        init: Initialization<'_>,
    ) -> Result<(), StereoError> {
        Self::check_dimensions(resources, buffers)?;
        if let Initialization::Reload { seed, .. } = init {
            if (seed.width(), seed.height()) != (buffers.width(), buffers.height()) {
                return Err(StereoError::dimension_mismatch(
                    (buffers.width(), buffers.height()),
                    (seed.width(), seed.height()),
                ));
            }
        }
        let start = Instant::now();
        let eval = CostEvaluator::new(&self.params, resources, mode);
        let camera = *resources.reference_camera();
        let width = buffers.width();
        let num_sources = eval.num_sources();
        let top_k = self.params.top_k;

        let PixelBuffers {
            field,
            views: masks,
            rngs,
        } = buffers;
        let rngs: &mut [SmallRng] = rngs;
        let masks: &mut [u32] = masks;
        let init_pixel = |(idx, (rng, mask)): (usize, (&mut SmallRng, &mut u32))| {
            let (x, y) = (idx % width, idx / width);
            let (fx, fy) = (x as f32, y as f32);
            let reloaded = match init {
                Initialization::Random => None,
                Initialization::Reload { seed, reseed_cost } => {
                    seed.plane_at(&camera, x, y, reseed_cost)
                }
            };
            let plane = reloaded.unwrap_or_else(|| random_plane(rng, &camera, fx, fy, &range));
            let patch = eval.reference_patch(x, y);
            let mut costs = [MAX_COST; MAX_SOURCES];
            eval.view_costs(&patch, x, y, &plane, &mut costs);
            let (cost, selected) = views::top_k(&costs, num_sources, top_k);
            *mask = selected;
            (plane, cost)
        };

        #[cfg(feature = "parallel")]
        let values: Vec<(Plane, f32)> = rngs
            .par_iter_mut()
            .zip(masks.par_iter_mut())
            .enumerate()
            .map(init_pixel)
            .collect();
        #[cfg(not(feature = "parallel"))]
        let values: Vec<(Plane, f32)> = rngs
            .iter_mut()
            .zip(masks.iter_mut())
            .enumerate()
            .map(init_pixel)
            .collect();

        field.commit_all(values);
        debug!(
            "PropagationEngine::initialize w={} h={} sources={} reload={} elapsed_ms={:.3}",
            width,
            field.height(),
            num_sources,
            matches!(init, Initialization::Reload { .. }),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Run `sweeps` red+black sweeps, optionally regularised by a planar prior.
    pub fn run(
        &self,
        resources: &DeviceResources,
        buffers: &mut PixelBuffers,
        range: DepthRange,
        mode: CostMode,
        prior: Option<&PriorField>,
        sweeps: usize,
    ) -> Result<RunStats, StereoError> {
        Self::check_dimensions(resources, buffers)?;
        if let Some(prior) = prior {
            if (prior.width(), prior.height()) != (buffers.width(), buffers.height()) {
                return Err(StereoError::dimension_mismatch(
                    (buffers.width(), buffers.height()),
                    (prior.width(), prior.height()),
                ));
            }
        }
        let start = Instant::now();
        let eval = CostEvaluator::new(&self.params, resources, mode);
        for iteration in 0..sweeps {
            for phase in Phase::ALL {
                self.sweep(&eval, buffers, range, prior, phase, iteration);
            }
            debug!(
                "PropagationEngine::run sweep={} mean_cost={:.4}",
                iteration,
                mean(buffers.field().costs())
            );
        }
        let stats = RunStats {
            sweeps,
            generation: buffers.field().generation(),
            mean_cost: mean(buffers.field().costs()),
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        debug!(
            "PropagationEngine::run done sweeps={} prior={} mode={:?} mean_cost={:.4} elapsed_ms={:.3}",
            sweeps,
            prior.is_some(),
            mode,
            stats.mean_cost,
            stats.elapsed_ms
        );
        Ok(stats)
    }

    fn sweep(
        &self,
        eval: &CostEvaluator<'_>,
        buffers: &mut PixelBuffers,
        range: DepthRange,
        prior: Option<&PriorField>,
        phase: Phase,
        iteration: usize,
    ) {
        let width = buffers.width();
        let height = buffers.height();
        let PixelBuffers {
            field,
            views: masks,
            rngs,
        } = buffers;
        let rngs: &mut [SmallRng] = rngs;
        let masks: &mut [u32] = masks;
        let updates: Vec<Option<(Plane, f32)>> = {
            let ctx = PixelUpdate {
                eval,
                regions: &self.regions,
                planes: field.planes(),
                costs: field.costs(),
                width,
                height,
                range,
                prior,
                iteration,
            };
            let step = |(idx, (rng, mask)): (usize, (&mut SmallRng, &mut u32))| {
                let (x, y) = (idx % width, idx / width);
                phase.owns(x, y).then(|| ctx.update(x, y, rng, mask))
            };

            #[cfg(feature = "parallel")]
            let updates = rngs
                .par_iter_mut()
                .zip(masks.par_iter_mut())
                .enumerate()
                .map(step)
                .collect();
            #[cfg(not(feature = "parallel"))]
            let updates = rngs
                .iter_mut()
                .zip(masks.iter_mut())
                .enumerate()
                .map(step)
                .collect();
            updates
        };
        field.commit_phase(phase, updates);
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return MAX_COST;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Read-only view of the field shared by all pixels of one phase.
struct PixelUpdate<'a> {
    eval: &'a CostEvaluator<'a>,
    regions: &'a NeighborRegions,
    planes: &'a [Plane],
    costs: &'a [f32],
    width: usize,
    height: usize,
    range: DepthRange,
    prior: Option<&'a PriorField>,
    iteration: usize,
}

impl PixelUpdate<'_> {
    fn evaluate(&self, patch: &ReferencePatch, x: usize, y: usize, plane: &Plane) -> ViewCosts {
        let mut costs = [MAX_COST; MAX_SOURCES];
        self.eval.view_costs(patch, x, y, plane, &mut costs);
        costs
    }

    fn score(
        &self,
        weights: &ViewWeights,
        costs: &ViewCosts,
        idx: usize,
        x: usize,
        y: usize,
        plane: &Plane,
    ) -> f32 {
        let cost = weights.aggregate(costs, self.eval.num_sources());
        match self.prior {
            Some(prior) => cost + self.eval.prior_penalty(prior, idx, x, y, plane),
            None => cost,
        }
    }

    /// Lowest-cost hypothesis of each neighbour region that yields a valid
    /// in-range depth at `(x, y)`.
    fn propagation_candidates(&self, x: usize, y: usize) -> Vec<Plane> {
        let camera = self.eval.reference_camera();
        let (fx, fy) = (x as f32, y as f32);
        let mut out = Vec::with_capacity(NeighborRegions::COUNT);
        for region in self.regions.iter() {
            let mut best: Option<(usize, f32)> = None;
            for &(dx, dy) in region {
                let nx = x as i64 + dx as i64;
                let ny = y as i64 + dy as i64;
                if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                    continue;
                }
                let nidx = ny as usize * self.width + nx as usize;
                let c = self.costs[nidx];
                if best.map_or(true, |(_, bc)| c < bc) {
                    best = Some((nidx, c));
                }
            }
            let Some((nidx, _)) = best else {
                continue;
            };
            let plane = self.planes[nidx];
            match camera.depth_from_plane(&plane, fx, fy) {
                Some(depth) if self.range.contains(depth) => out.push(plane),
                _ => {}
            }
        }
        out
    }

    fn update(&self, x: usize, y: usize, rng: &mut SmallRng, mask: &mut u32) -> (Plane, f32) {
        let idx = y * self.width + x;
        let params = self.eval.params();
        let num_sources = self.eval.num_sources();
        let patch = self.eval.reference_patch(x, y);

        let candidates = self.propagation_candidates(x, y);
        let candidate_costs: Vec<ViewCosts> = candidates
            .iter()
            .map(|plane| self.evaluate(&patch, x, y, plane))
            .collect();
        let weights =
            views::select_views(&candidate_costs, num_sources, *mask, self.iteration, params);
        *mask = weights.mask;

        let mut best = self.planes[idx];
        let current_costs = self.evaluate(&patch, x, y, &best);
        let mut best_cost = self.score(&weights, &current_costs, idx, x, y, &best);
        for (plane, costs) in candidates.iter().zip(&candidate_costs) {
            let c = self.score(&weights, costs, idx, x, y, plane);
            if c < best_cost {
                best = *plane;
                best_cost = c;
            }
        }

        let camera = self.eval.reference_camera();
        let refinements = refine::refinement_candidates(
            rng,
            camera,
            x as f32,
            y as f32,
            &best,
            &self.range,
            params,
            self.iteration,
        );
        for plane in &refinements {
            let costs = self.evaluate(&patch, x, y, plane);
            let c = self.score(&weights, &costs, idx, x, y, plane);
            if c < best_cost {
                best = *plane;
                best_cost = c;
            }
        }
        (best, best_cost)
    }
}

#[cfg(test)]
mod tests;
