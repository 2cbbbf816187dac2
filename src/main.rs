use log::{info, warn};
use patchmatch_mvs::config::{load_config, StereoToolConfig};
use patchmatch_mvs::device::{DeviceContext, MAX_IMAGES};
use patchmatch_mvs::error::{InputError, StereoError};
use patchmatch_mvs::hierarchy::{HierarchicalController, ProblemInput, ViewInput};
use patchmatch_mvs::image::io::{load_intensity_image, write_json_file};
use patchmatch_mvs::image::ImageF32;
use patchmatch_mvs::io::{
    read_camera, read_depth_dmb, read_normal_dmb, write_depth_dmb, write_normal_dmb,
    write_point_cloud,
};
use patchmatch_mvs::params::StereoParams;
use patchmatch_mvs::problem::Problem;
use patchmatch_mvs::result::LevelSeed;
use patchmatch_mvs::StereoRun;
use std::env;
use std::path::Path;
use thiserror::Error;

const DEPTHS: &str = "depths.dmb";
const DEPTHS_GEOM: &str = "depths_geom.dmb";
const NORMALS: &str = "normals.dmb";
const COSTS: &str = "costs.dmb";
const CONFIDENCE: &str = "confidence.dmb";

#[derive(Debug, Error)]
enum DriverError {
    #[error("usage: patchmatch-mvs <config.json>")]
    Usage,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Stereo(#[from] StereoError),
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DriverError> {
    let config_path = env::args().nth(1).ok_or(DriverError::Usage)?;
    let config = load_config(Path::new(&config_path))?;
    let mut problems = config.load_problems()?;
    for problem in &mut problems {
        let dropped = problem.truncate_sources(MAX_IMAGES - 1);
        if dropped > 0 {
            warn!(
                "problem {:08}: {dropped} source views beyond the limit of {} dropped",
                problem.ref_image_id,
                MAX_IMAGES - 1
            );
        }
    }
    let ctx = DeviceContext::new();
    info!(
        "{} problems in {}",
        problems.len(),
        config.dense_folder.display()
    );

    for problem in &problems {
        photometric_problem(&config, problem, &ctx)?;
    }

    if config.stereo.geom_consistency {
        let rounds = if config.stereo.multi_geometry { 2 } else { 1 };
        for round in 0..rounds {
            let source = if round == 0 { DEPTHS } else { DEPTHS_GEOM };
            for problem in &problems {
                geometric_problem(&config, problem, &ctx, source)?;
            }
        }
    }
    info!(
        "done, peak device memory {} bytes, live allocations {}",
        ctx.peak_bytes(),
        ctx.live_allocations()
    );
    Ok(())
}

fn problem_params(config: &StereoToolConfig, problem: &Problem) -> StereoParams {
    let mut params = config.stereo.clone();
    params.pyramid.max_image_size = params.pyramid.max_image_size.min(problem.cur_image_size);
    params
}

/// Load the views of `problem`; unreadable source views are skipped, an
/// unreadable reference skips the whole problem.
fn load_views(config: &StereoToolConfig, problem: &Problem) -> Option<ProblemInput> {
    let mut views = Vec::with_capacity(problem.num_images());
    for (i, image_id) in problem.image_ids().enumerate() {
        let image = load_intensity_image(&config.image_path(image_id));
        let camera = read_camera(&config.camera_path(image_id));
        match (image, camera) {
            (Ok(image), Ok(camera)) => views.push(ViewInput::new(image_id, image, camera)),
            (Err(err), _) | (_, Err(err)) => {
                warn!("view {image_id:08} skipped: {err}");
                if i == 0 {
                    return None;
                }
            }
        }
    }
    Some(ProblemInput::new(views))
}

fn load_seed(dir: &Path, depth_name: &str) -> Result<LevelSeed, InputError> {
    let depth = read_depth_dmb(&dir.join(depth_name))?;
    let normal_path = dir.join(NORMALS);
    let normal = read_normal_dmb(&normal_path)?;
    let seed = LevelSeed::new(depth, normal);
    if !seed.is_consistent() {
        return Err(InputError::Parse {
            path: normal_path,
            message: format!(
                "normal map is {}x{} but {depth_name} is {}x{}",
                seed.normal.w,
                seed.normal.h,
                seed.width(),
                seed.height()
            ),
        });
    }
    Ok(seed)
}

fn photometric_problem(
    config: &StereoToolConfig,
    problem: &Problem,
    ctx: &DeviceContext,
) -> Result<(), DriverError> {
    let Some(mut input) = load_views(config, problem) else {
        return Ok(());
    };
    let dir = config.result_dir(problem.ref_image_id);
    if config.stereo.planar_prior {
        match read_depth_dmb(&dir.join(CONFIDENCE)) {
            Ok(confidence) => input = input.with_confidence(confidence),
            Err(err) if err.is_not_found() => {}
            Err(err) => warn!("confidence of {:08} ignored: {err}", problem.ref_image_id),
        }
    }
    let seed = if config.output.warm_start {
        match load_seed(&dir, DEPTHS) {
            Ok(seed) => Some(seed),
            Err(err) => {
                warn!("no warm start for {:08}: {err}", problem.ref_image_id);
                None
            }
        }
    } else {
        None
    };

    let controller = HierarchicalController::with_context(problem_params(config, problem), ctx.clone());
    let run = controller.run(&input, seed.as_ref())?;
    write_depth_dmb(&dir.join(DEPTHS), &run.result.depth)?;
    write_normal_dmb(&dir.join(NORMALS), &run.result.normal)?;
    write_depth_dmb(&dir.join(COSTS), &run.result.cost)?;
    write_outputs(config, &input, &run, &dir, "report.json")?;
    info!(
        "problem {:08}: {}x{} valid={:.3} mean_cost={:.4}",
        problem.ref_image_id,
        run.result.width(),
        run.result.height(),
        run.report.valid_ratio,
        run.report.mean_cost
    );
    Ok(())
}

fn geometric_problem(
    config: &StereoToolConfig,
    problem: &Problem,
    ctx: &DeviceContext,
    depth_name: &str,
) -> Result<(), DriverError> {
    let Some(input) = load_views(config, problem) else {
        return Ok(());
    };
    let dir = config.result_dir(problem.ref_image_id);
    let seed = match load_seed(&dir, depth_name) {
        Ok(seed) => seed,
        Err(err) => {
            warn!("geometric pass skipped for {:08}: {err}", problem.ref_image_id);
            return Ok(());
        }
    };
    let neighbor_depths: Vec<ImageF32> = input
        .views
        .iter()
        .map(|v| {
            read_depth_dmb(&config.result_dir(v.image_id).join(depth_name)).unwrap_or_else(|err| {
                warn!("no depth for view {:08}: {err}", v.image_id);
                ImageF32::new(0, 0)
            })
        })
        .collect();

    let controller = HierarchicalController::with_context(problem_params(config, problem), ctx.clone());
    let run = controller.run_geometric(&input, &neighbor_depths, &seed)?;
    write_depth_dmb(&dir.join(DEPTHS_GEOM), &run.result.depth)?;
    write_normal_dmb(&dir.join(NORMALS), &run.result.normal)?;
    write_depth_dmb(&dir.join(COSTS), &run.result.cost)?;
    write_outputs(config, &input, &run, &dir, "report_geom.json")?;
    info!(
        "problem {:08} geometric: valid={:.3} mean_cost={:.4}",
        problem.ref_image_id, run.report.valid_ratio, run.report.mean_cost
    );
    Ok(())
}

fn write_outputs(
    config: &StereoToolConfig,
    input: &ProblemInput,
    run: &StereoRun,
    dir: &Path,
    report_name: &str,
) -> Result<(), InputError> {
    if config.output.write_report {
        write_json_file(&dir.join(report_name), &run.report)?;
    }
    if config.output.export_points {
        if let Some(reference) = input.reference() {
            let camera = reference
                .camera
                .rescaled(run.result.width(), run.result.height());
            let points = run.result.to_points(&camera);
            write_point_cloud(&dir.join("points.ply"), &points, true)?;
        }
    }
    Ok(())
}
