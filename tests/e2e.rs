mod common;

use common::scene::{checkerboard, inlier_ratio, PlaneScene, DEPTH};
use patchmatch_mvs::device::DeviceContext;
use patchmatch_mvs::image::ImageF32;
use patchmatch_mvs::{
    HierarchicalController, LevelSeed, ProblemInput, StereoError, StereoParams, ViewInput,
};

fn params() -> StereoParams {
    let mut params = StereoParams {
        depth_range_scale: [1.0, 1.0],
        ..Default::default()
    };
    params.propagation.max_iterations = 4;
    params
}

#[test]
fn single_level_run_recovers_the_plane() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = PlaneScene::new(64, 48, 100.0);
    let ctx = DeviceContext::new();
    let controller = HierarchicalController::with_context(params(), ctx.clone());
    let run = controller.run(&scene.input(), None).expect("run");

    assert_eq!((run.result.width(), run.result.height()), (64, 48));
    let ratio = inlier_ratio(&run.result, 6, 0.05);
    assert!(ratio > 0.8, "inlier ratio {ratio:.3}");
    assert_eq!(run.report.mode, "photometric");
    assert_eq!(run.report.levels.len(), 1);
    assert!(!run.report.levels[0].reloaded);
    assert_eq!(run.report.levels[0].run.generation, 1 + 2 * 4);
    assert!((run.report.depth_min - 4.2).abs() < 1e-6);
    assert_eq!(ctx.live_allocations(), 0);
    assert!(ctx.peak_bytes() > 0);
}

#[test]
fn checkerboard_pair_recovers_depth_at_the_centre() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (w, h) = (64usize, 48usize);
    let scene = PlaneScene::new(w, h, 100.0);
    let baseline = 0.4f32;
    let disparity = scene.focal * baseline / DEPTH;
    let reference = ImageF32::from_fn(w, h, |x, y| checkerboard(x as f32, y as f32, w, h));
    // Source sees the same plane shifted by the disparity and 10% brighter.
    let source = ImageF32::from_fn(w, h, |x, y| {
        1.1 * checkerboard(x as f32 - disparity, y as f32, w, h)
    });
    let input = ProblemInput::new(vec![
        ViewInput::new(0, reference, scene.camera(0.0)),
        ViewInput::new(1, source, scene.camera(baseline)),
    ]);
    let mut params = params();
    params.propagation.max_iterations = 6;
    let run = HierarchicalController::new(params)
        .run(&input, None)
        .expect("run");

    let mut depths: Vec<f32> = (h / 2 - 2..=h / 2 + 2)
        .flat_map(|y| (w / 2 - 2..=w / 2 + 2).map(move |x| (x, y)))
        .map(|(x, y)| run.result.depth.get(x, y))
        .collect();
    depths.sort_by(f32::total_cmp);
    let centre = depths[depths.len() / 2];
    assert!(
        (centre - DEPTH).abs() < 0.05 * DEPTH,
        "centre depth {centre} (expected {DEPTH})"
    );
}

#[test]
fn hierarchical_run_goes_coarse_to_fine() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = PlaneScene::new(96, 72, 120.0);
    let ctx = DeviceContext::new();
    let mut params = params().with_hierarchy();
    params.pyramid.levels = 2;
    let controller = HierarchicalController::with_context(params, ctx.clone());
    let run = controller.run(&scene.input(), None).expect("run");

    let levels = &run.report.levels;
    assert_eq!(levels.len(), 2);
    assert_eq!((levels[0].level_index, levels[0].width, levels[0].height), (1, 48, 36));
    assert_eq!((levels[1].level_index, levels[1].width, levels[1].height), (0, 96, 72));
    assert!(!levels[0].reloaded);
    assert!(levels[1].reloaded);
    assert_eq!((run.result.width(), run.result.height()), (96, 72));
    let ratio = inlier_ratio(&run.result, 8, 0.05);
    assert!(ratio > 0.8, "inlier ratio {ratio:.3}");
    assert_eq!(ctx.live_allocations(), 0);

    let json = serde_json::to_value(&run.report).expect("json");
    assert_eq!(json["levels"].as_array().map(Vec::len), Some(2));
    assert!(json["timings"]["totalMs"].as_f64().is_some());
}

#[test]
fn planar_prior_run_builds_a_prior_per_level() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = PlaneScene::new(96, 72, 120.0);
    let ctx = DeviceContext::new();
    let mut params = params().with_hierarchy().with_planar_prior();
    params.pyramid.levels = 2;
    // Treat every pixel as weakly textured so low-cost pixels become support.
    params.prior.texture_gradient_threshold = f32::MAX;
    let controller = HierarchicalController::with_context(params, ctx.clone());
    let run = controller.run(&scene.input(), None).expect("run");

    let with_prior: Vec<_> = run
        .report
        .levels
        .iter()
        .filter_map(|l| l.prior.as_ref())
        .collect();
    assert!(!with_prior.is_empty());
    for stage in &with_prior {
        assert!(stage.coverage > 0.0 && stage.coverage <= 1.0);
        assert!(stage.triangles > 0 || stage.inherited_pixels > 0);
    }
    let ratio = inlier_ratio(&run.result, 8, 0.05);
    assert!(ratio > 0.8, "inlier ratio {ratio:.3}");
    assert_eq!(ctx.live_allocations(), 0);
}

#[test]
fn confidence_map_feeds_the_prior_at_every_level() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = PlaneScene::new(96, 72, 120.0);
    let mut params = params().with_hierarchy().with_planar_prior();
    params.pyramid.levels = 2;
    params.prior.texture_gradient_threshold = f32::MAX;
    // Coarse-level resolution; level 0 reads it by nearest neighbour.
    let input = scene.input().with_confidence(ImageF32::filled(48, 36, 1.0));
    let run = HierarchicalController::new(params)
        .run(&input, None)
        .expect("run");

    let finest = run.report.levels.last().expect("level 0");
    assert_eq!(finest.level_index, 0);
    let stage = finest.prior.as_ref().expect("prior");
    // 20×15 tiles at 96×72; nearly every tile passes with the bonus.
    assert!(stage.support_points >= 270, "support points {}", stage.support_points);
    assert!(stage.support_points <= 300);
}

#[test]
fn geometric_pass_refines_a_photometric_result() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = PlaneScene::new(64, 48, 100.0);
    let input = scene.input();
    let ctx = DeviceContext::new();
    let controller =
        HierarchicalController::with_context(params().with_geom_consistency(false), ctx.clone());
    let photometric = controller.run(&input, None).expect("photometric");

    let mut neighbor_depths = vec![photometric.result.depth.clone()];
    neighbor_depths.push(scene.depth_map());
    neighbor_depths.push(ImageF32::new(0, 0));
    let seed = photometric.result.to_seed();
    let run = controller
        .run_geometric(&input, &neighbor_depths, &seed)
        .expect("geometric");

    assert_eq!(run.report.mode, "geometric");
    assert_eq!(run.report.levels.len(), 1);
    assert!(run.report.levels[0].reloaded);
    let ratio = inlier_ratio(&run.result, 6, 0.05);
    assert!(ratio > 0.8, "inlier ratio {ratio:.3}");
    assert_eq!(ctx.live_allocations(), 0);
}

#[test]
fn warm_start_seed_of_another_resolution_is_resampled() {
    let scene = PlaneScene::new(64, 48, 100.0);
    let controller = HierarchicalController::new(params());
    let seed = LevelSeed::new(
        ImageF32::filled(32, 24, DEPTH),
        patchmatch_mvs::image::ImageVec3::filled(32, 24, nalgebra::Vector3::new(0.0, 0.0, -1.0)),
    );
    let run = controller.run(&scene.input(), Some(&seed)).expect("run");
    assert!(run.report.levels[0].reloaded);
    let ratio = inlier_ratio(&run.result, 6, 0.05);
    assert!(ratio > 0.9, "inlier ratio {ratio:.3}");
}

#[test]
fn seed_with_mismatched_maps_falls_back_to_random_planes() {
    let _ = env_logger::builder().is_test(true).try_init();
    let scene = PlaneScene::new(64, 48, 100.0);
    let controller = HierarchicalController::new(params());
    let seed = LevelSeed::new(
        ImageF32::filled(64, 48, DEPTH),
        patchmatch_mvs::image::ImageVec3::filled(32, 24, nalgebra::Vector3::new(0.0, 0.0, -1.0)),
    );
    let run = controller.run(&scene.input(), Some(&seed)).expect("run");
    assert!(!run.report.levels[0].reloaded);
    let ratio = inlier_ratio(&run.result, 6, 0.05);
    assert!(ratio > 0.8, "inlier ratio {ratio:.3}");

    let neighbor_depths = vec![scene.depth_map(); 3];
    let run = controller
        .run_geometric(&scene.input(), &neighbor_depths, &seed)
        .expect("geometric");
    assert!(!run.report.levels[0].reloaded);
    assert_eq!((run.result.width(), run.result.height()), (64, 48));
}

#[test]
fn empty_problem_is_rejected() {
    let controller = HierarchicalController::new(params());
    let err = controller
        .run(&ProblemInput::default(), None)
        .expect_err("empty input");
    assert!(matches!(err, StereoError::InvalidViews { .. }));
}

#[test]
fn allocation_failure_releases_everything() {
    let scene = PlaneScene::new(64, 48, 100.0);
    let ctx = DeviceContext::with_memory_limit(64 * 48 * 4 * 3 + 1024);
    let controller = HierarchicalController::with_context(params(), ctx.clone());
    let err = controller.run(&scene.input(), None).expect_err("memory limit");
    assert!(matches!(err, StereoError::Allocation { .. }));
    assert_eq!(ctx.live_allocations(), 0);
}
