//! Coarse-to-fine control of the propagation engine.
//!
//! Levels run from the coarsest to level 0. The coarsest level starts from
//! random draws, or from a caller seed when resuming; every finer level starts
//! from the joint-bilateral upsampled result of the previous one. Pixels whose
//! carried cost reaches `reseed_cost` are re-randomised.
//!
//! With the planar prior enabled, each level builds a prior from its own
//! result, completes it with the upsampled prior of the coarser level and
//! runs a second, prior-regularised propagation.
//!
//! Device resources are uploaded per level and released before the next
//! level starts; error paths release through `Drop`.

pub mod input;

pub use input::{ProblemInput, ViewInput};

use crate::camera::{Camera, DepthRange};
use crate::device::{DeviceContext, DeviceResources, PixelBuffers};
use crate::diagnostics::{LevelReport, PriorStage, PyramidStage, RunReport, TimingBreakdown};
use crate::error::StereoError;
use crate::image::ImageF32;
use crate::params::StereoParams;
use crate::prior::{build_prior, upsample_prior, PriorField};
use crate::propagation::{CostMode, Initialization, PropagationEngine};
use crate::pyramid::{LevelPyramid, PyramidLevel, PyramidOptions};
use crate::result::{LevelSeed, StereoResult};
use crate::upsample::{resample_nearest, upsample_seed, JbuParams};
use log::{debug, info, warn};
use std::time::Instant;

/// Result of one reference view plus its trace.
#[derive(Clone, Debug)]
pub struct StereoRun {
    pub result: StereoResult,
    pub report: RunReport,
}

/// Prior of the previous level, kept for upsampling into the next one.
struct CarriedPrior {
    field: PriorField,
    camera: Camera,
}

struct LevelOutcome {
    result: StereoResult,
    report: LevelReport,
    prior: Option<CarriedPrior>,
}

pub struct HierarchicalController {
    params: StereoParams,
    ctx: DeviceContext,
}

impl HierarchicalController {
    pub fn new(params: StereoParams) -> Self {
        Self::with_context(params, DeviceContext::new())
    }

    pub fn with_context(params: StereoParams, ctx: DeviceContext) -> Self {
        Self { params, ctx }
    }

    pub fn params(&self) -> &StereoParams {
        &self.params
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    #[track_caller]
    fn check_input(input: &ProblemInput) -> Result<(), StereoError> {
        match input.reference() {
            None => Err(StereoError::invalid_views("problem has no views")),
            Some(v) if v.image.w == 0 || v.image.h == 0 => {
                Err(StereoError::invalid_views("reference image is empty"))
            }
            Some(_) => Ok(()),
        }
    }

    fn seed_for_level(seed: &LevelSeed, level: &PyramidLevel, jbu: &JbuParams) -> LevelSeed {
        if (seed.width(), seed.height()) == level.size() {
            seed.clone()
        } else {
            upsample_seed(level.reference_image(), seed, jbu)
        }
    }

    /// Photometric run over all levels.
    ///
    /// `seed`, when given, replaces the random initialisation of the coarsest
    /// level (resampled to its size).
    pub fn run(
        &self,
        input: &ProblemInput,
        seed: Option<&LevelSeed>,
    ) -> Result<StereoRun, StereoError> {
        Self::check_input(input)?;
        let start = Instant::now();
        let mut timings = TimingBreakdown::default();
        let options = PyramidOptions {
            levels: self.params.num_levels(),
            ..self.params.pyramid
        };
        let pyramid = LevelPyramid::build(input.pairs(), &options);
        timings.push("pyramid", pyramid.elapsed_ms);
        let range = self.params.depth_range(&input.views[0].camera);
        info!(
            "HierarchicalController::run views={} levels={} depth=[{:.3}, {:.3}] prior={}",
            input.num_views(),
            pyramid.num_levels(),
            range.min,
            range.max,
            self.params.planar_prior
        );

        let seed = seed.filter(|s| {
            let consistent = s.is_consistent();
            if !consistent {
                warn!(
                    "HierarchicalController::run seed maps disagree in size (depth {}x{}, normal {}x{}), starting from random planes",
                    s.depth.w, s.depth.h, s.normal.w, s.normal.h
                );
            }
            consistent
        });
        let mut carried: Option<LevelSeed> = seed.cloned();
        let mut carried_prior: Option<CarriedPrior> = None;
        let mut reports = Vec::with_capacity(pyramid.num_levels());
        let mut last: Option<StereoResult> = None;
        for level in pyramid.coarse_to_fine() {
            let level_start = Instant::now();
            let level_seed = carried
                .as_ref()
                .map(|s| Self::seed_for_level(s, level, &self.params.upsample));
            let outcome = self.run_level(
                level,
                range,
                level_seed.as_ref(),
                carried_prior.as_ref(),
                input.confidence.as_ref(),
            )?;
            timings.push(
                format!("level{}", level.index),
                level_start.elapsed().as_secs_f64() * 1000.0,
            );
            carried = Some(outcome.result.to_seed());
            carried_prior = outcome.prior;
            reports.push(outcome.report);
            last = Some(outcome.result);
        }
        drop(carried_prior);

        let result = last.ok_or_else(|| StereoError::invalid_views("no pyramid level"))?;
        timings.total_ms = start.elapsed().as_secs_f64() * 1000.0;
        let report = RunReport {
            mode: "photometric".to_string(),
            num_views: input.num_views(),
            depth_min: range.min,
            depth_max: range.max,
            pyramid: Some(PyramidStage::from_pyramid(&pyramid)),
            levels: reports,
            mean_cost: result.mean_cost(),
            valid_ratio: result.valid_ratio(),
            peak_device_bytes: self.ctx.peak_bytes(),
            timings,
        };
        info!(
            "HierarchicalController::run done {}x{} mean_cost={:.4} valid={:.3} total_ms={:.1}",
            result.width(),
            result.height(),
            report.mean_cost,
            report.valid_ratio,
            report.timings.total_ms
        );
        Ok(StereoRun { result, report })
    }

    fn run_level(
        &self,
        level: &PyramidLevel,
        range: DepthRange,
        seed: Option<&LevelSeed>,
        coarser_prior: Option<&CarriedPrior>,
        confidence: Option<&ImageF32>,
    ) -> Result<LevelOutcome, StereoError> {
        let (w, h) = level.size();
        let camera = *level.reference_camera();
        let image = level.reference_image();
        let engine = PropagationEngine::new(self.params.propagation.clone());
        let sweeps = self.params.propagation.max_iterations;
        debug!(
            "HierarchicalController::run_level level={} w={} h={} reload={}",
            level.index,
            w,
            h,
            seed.is_some()
        );

        let resources = DeviceResources::upload(&self.ctx, &level.images, &level.cameras, None)?;
        let run_seed = self
            .params
            .propagation
            .seed
            .wrapping_add(level.index as u64);
        let mut buffers = PixelBuffers::allocate(&self.ctx, w, h, run_seed)?;
        let init = match seed {
            Some(seed) => Initialization::Reload {
                seed,
                reseed_cost: self.params.reseed_cost,
            },
            None => Initialization::Random,
        };
        engine.initialize(&resources, &mut buffers, range, CostMode::Photometric, init)?;
        let mut run = engine.run(&resources, &mut buffers, range, CostMode::Photometric, None, sweeps)?;
        let mut result = StereoResult::from_buffers(&buffers, &camera, Some(image));

        let mut prior_stage = None;
        let mut prior = None;
        if self.params.planar_prior {
            if let Some((field, mut stage)) =
                self.level_prior(level, &result, coarser_prior, confidence)?
            {
                stage.run = engine.run(
                    &resources,
                    &mut buffers,
                    range,
                    CostMode::Photometric,
                    Some(&field),
                    sweeps,
                )?;
                run = stage.run.clone();
                result = StereoResult::from_buffers(&buffers, &camera, Some(image));
                prior_stage = Some(stage);
                prior = Some(CarriedPrior { field, camera });
            }
        }

        drop(buffers);
        resources.release();
        let report = LevelReport {
            level_index: level.index,
            width: w,
            height: h,
            reloaded: seed.is_some(),
            run,
            prior: prior_stage,
            valid_ratio: result.valid_ratio(),
        };
        Ok(LevelOutcome {
            result,
            report,
            prior,
        })
    }

    /// Prior for one level: built from `result`, completed with the coarser
    /// level's prior. `None` when neither yields any coverage.
    ///
    /// `confidence` is resampled to the level size by nearest neighbour.
    fn level_prior(
        &self,
        level: &PyramidLevel,
        result: &StereoResult,
        coarser: Option<&CarriedPrior>,
        confidence: Option<&ImageF32>,
    ) -> Result<Option<(PriorField, PriorStage)>, StereoError> {
        let camera = level.reference_camera();
        let image = level.reference_image();
        let (w, h) = level.size();
        let confidence = confidence.map(|c| {
            if (c.w, c.h) == (w, h) {
                c.clone()
            } else {
                resample_nearest(c, w, h)
            }
        });
        let own = build_prior(
            &self.ctx,
            camera,
            image,
            result,
            confidence.as_ref(),
            &self.params.prior,
        )?;
        let inherited = match coarser {
            Some(c) => Some(upsample_prior(
                &self.ctx,
                &c.field,
                &c.camera,
                camera,
                image,
                &self.params.upsample,
            )?),
            None => None,
        };

        let mut stage = PriorStage::default();
        let field = match (own, inherited) {
            (Some(build), inherited) => {
                stage.support_points = build.support_points.len();
                stage.triangles = build.triangles.len();
                let mut field = build.field;
                if let Some(inherited) = inherited {
                    stage.inherited_pixels = field.fill_missing_from(&inherited)?;
                }
                field
            }
            (None, Some(inherited)) => {
                stage.inherited_pixels = inherited.masks().iter().filter(|&&m| m != 0).count();
                inherited
            }
            (None, None) => return Ok(None),
        };
        stage.coverage = field.coverage();
        if stage.coverage <= 0.0 {
            return Ok(None);
        }
        debug!(
            "HierarchicalController::level_prior level={} support={} triangles={} inherited={} coverage={:.3}",
            level.index,
            stage.support_points,
            stage.triangles,
            stage.inherited_pixels,
            stage.coverage
        );
        Ok(Some((field, stage)))
    }

    /// Geometric-consistency refinement of a previous result at level 0.
    ///
    /// `neighbor_depths[i]` is the depth map of view `i` (any resolution;
    /// an empty map means "no data" for that view). `seed` holds the
    /// reference depth/normal to refine.
    pub fn run_geometric(
        &self,
        input: &ProblemInput,
        neighbor_depths: &[ImageF32],
        seed: &LevelSeed,
    ) -> Result<StereoRun, StereoError> {
        Self::check_input(input)?;
        let start = Instant::now();
        let mut timings = TimingBreakdown::default();
        let options = PyramidOptions {
            levels: 1,
            ..self.params.pyramid
        };
        let pyramid = LevelPyramid::build(input.pairs(), &options);
        timings.push("pyramid", pyramid.elapsed_ms);
        let level = pyramid
            .finest()
            .ok_or_else(|| StereoError::invalid_views("no pyramid level"))?;
        let (w, h) = level.size();
        let camera = *level.reference_camera();
        let range = self.params.depth_range(&input.views[0].camera);
        let mode = CostMode::Geometric {
            mandatory: self.params.mand_consistency,
        };
        let sweeps = self.params.propagation.geom_iterations;
        info!(
            "HierarchicalController::run_geometric views={} w={} h={} sweeps={} mandatory={}",
            input.num_views(),
            w,
            h,
            sweeps,
            self.params.mand_consistency
        );

        let seed = LevelSeed::new(seed.depth.clone(), seed.normal.clone());
        let level_seed = if seed.is_consistent() {
            Some(Self::seed_for_level(&seed, level, &self.params.upsample))
        } else {
            warn!(
                "HierarchicalController::run_geometric seed maps disagree in size (depth {}x{}, normal {}x{}), starting from random planes",
                seed.depth.w, seed.depth.h, seed.normal.w, seed.normal.h
            );
            None
        };
        let engine = PropagationEngine::new(self.params.propagation.clone());
        let resources = DeviceResources::upload(
            &self.ctx,
            &level.images,
            &level.cameras,
            Some(neighbor_depths),
        )?;
        let mut buffers = PixelBuffers::allocate(&self.ctx, w, h, self.params.propagation.seed)?;
        let init = match &level_seed {
            Some(seed) => Initialization::Reload {
                seed,
                reseed_cost: f32::INFINITY,
            },
            None => Initialization::Random,
        };
        engine.initialize(&resources, &mut buffers, range, mode, init)?;
        let run = engine.run(&resources, &mut buffers, range, mode, None, sweeps)?;
        let result = StereoResult::from_buffers(&buffers, &camera, Some(level.reference_image()));
        drop(buffers);
        resources.release();
        timings.push("geometric", run.elapsed_ms);
        timings.total_ms = start.elapsed().as_secs_f64() * 1000.0;

        let report = RunReport {
            mode: "geometric".to_string(),
            num_views: input.num_views(),
            depth_min: range.min,
            depth_max: range.max,
            pyramid: None,
            levels: vec![LevelReport {
                level_index: 0,
                width: w,
                height: h,
                reloaded: level_seed.is_some(),
                run,
                prior: None,
                valid_ratio: result.valid_ratio(),
            }],
            mean_cost: result.mean_cost(),
            valid_ratio: result.valid_ratio(),
            peak_device_bytes: self.ctx.peak_bytes(),
            timings,
        };
        Ok(StereoRun { result, report })
    }
}
