use super::*;
use crate::camera::Camera;
use crate::device::DeviceContext;
use crate::image::{ImageF32, ImageVec3};
use nalgebra::{Matrix3, Vector3};

const W: usize = 64;
const H: usize = 48;
const FOCAL: f32 = 100.0;
const DEPTH: f32 = 5.0;

fn texture(u: f32, v: f32) -> f32 {
    0.5 + 0.2 * (0.9 * u + 0.3 * v).sin()
        + 0.15 * (0.37 * u - 0.8 * v + 1.0).sin()
        + 0.08 * (1.7 * u + 1.1 * v + 0.5).sin()
}

fn camera(tx: f32) -> Camera {
    Camera {
        k: Matrix3::new(FOCAL, 0.0, 32.0, 0.0, FOCAL, 24.0, 0.0, 0.0, 1.0),
        t: Vector3::new(tx, 0.0, 0.0),
        width: W,
        height: H,
        depth_min: 4.2,
        depth_max: 6.1,
        ..Default::default()
    }
}

/// Fronto-parallel textured plane at `DEPTH` seen by a reference camera and
/// two horizontally displaced sources.
fn scene(ctx: &DeviceContext) -> DeviceResources {
    let offsets = [0.0f32, -0.4, 0.4];
    let images: Vec<ImageF32> = offsets
        .iter()
        .map(|&tx| {
            let shift = FOCAL * tx / DEPTH;
            ImageF32::from_fn(W, H, |x, y| texture(x as f32 - shift, y as f32))
        })
        .collect();
    let cameras: Vec<Camera> = offsets.iter().map(|&tx| camera(tx)).collect();
    DeviceResources::upload(ctx, &images, &cameras, None).expect("upload")
}

fn depth_inlier_ratio(buffers: &PixelBuffers, camera: &Camera, tolerance: f32) -> f32 {
    let mut inliers = 0usize;
    let mut total = 0usize;
    for y in 6..H - 6 {
        for x in 6..W - 6 {
            total += 1;
            let plane = buffers.field().plane(y * W + x);
            if let Some(d) = camera.depth_from_plane(plane, x as f32, y as f32) {
                if (d - DEPTH).abs() < tolerance {
                    inliers += 1;
                }
            }
        }
    }
    inliers as f32 / total as f32
}

#[test]
fn random_initialisation_converges_on_plane() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ctx = DeviceContext::new();
    let resources = scene(&ctx);
    let mut buffers = PixelBuffers::allocate(&ctx, W, H, 42).expect("buffers");
    let engine = PropagationEngine::new(PropagationParams::default());
    let range = DepthRange::new(4.2, 6.1);
    engine
        .initialize(&resources, &mut buffers, range, CostMode::Photometric, Initialization::Random)
        .expect("init");
    let before = depth_inlier_ratio(&buffers, resources.reference_camera(), 0.15);
    let stats = engine
        .run(&resources, &mut buffers, range, CostMode::Photometric, None, 4)
        .expect("run");
    let after = depth_inlier_ratio(&buffers, resources.reference_camera(), 0.15);
    assert_eq!(stats.generation, 1 + 2 * 4);
    assert!(after > 0.8, "inlier ratio {after:.3} (initial {before:.3})");
    assert!(after > before);
    assert!(stats.mean_cost < 1.0, "mean cost {}", stats.mean_cost);
}

#[test]
fn same_seed_gives_identical_fields() {
    let ctx = DeviceContext::new();
    let resources = scene(&ctx);
    let engine = PropagationEngine::new(PropagationParams::default());
    let range = DepthRange::new(4.2, 6.1);
    let run = || {
        let mut buffers = PixelBuffers::allocate(&ctx, W, H, 9).expect("buffers");
        engine
            .initialize(&resources, &mut buffers, range, CostMode::Photometric, Initialization::Random)
            .expect("init");
        engine
            .run(&resources, &mut buffers, range, CostMode::Photometric, None, 1)
            .expect("run");
        buffers.field().planes().to_vec()
    };
    assert_eq!(run(), run());
}

#[test]
fn reload_keeps_seeded_planes_and_reseeds_high_cost_pixels() {
    let ctx = DeviceContext::new();
    let resources = scene(&ctx);
    let camera = *resources.reference_camera();
    let mut aux = ImageF32::filled(W, H, 0.1);
    aux.set(10, 10, 1.9);
    let seed = LevelSeed {
        depth: ImageF32::filled(W, H, DEPTH),
        normal: ImageVec3::filled(W, H, Vector3::new(0.0, 0.0, -1.0)),
        auxiliary_cost: Some(aux),
    };
    let mut buffers = PixelBuffers::allocate(&ctx, W, H, 1).expect("buffers");
    let engine = PropagationEngine::new(PropagationParams::default());
    engine
        .initialize(
            &resources,
            &mut buffers,
            DepthRange::new(4.2, 6.1),
            CostMode::Photometric,
            Initialization::Reload {
                seed: &seed,
                reseed_cost: 1.0,
            },
        )
        .expect("init");
    let centre = buffers.field().plane(24 * W + 32);
    let d = camera.depth_from_plane(centre, 32.0, 24.0).expect("depth");
    assert!((d - DEPTH).abs() < 1e-4);
    assert!(buffers.field().cost(24 * W + 32) < 0.05);
    let reseeded = buffers.field().plane(10 * W + 10);
    assert_ne!(reseeded.normal, Vector3::new(0.0, 0.0, -1.0));
}

#[test]
fn mismatched_buffers_are_rejected() {
    let ctx = DeviceContext::new();
    let resources = scene(&ctx);
    let mut buffers = PixelBuffers::allocate(&ctx, W / 2, H / 2, 1).expect("buffers");
    let engine = PropagationEngine::new(PropagationParams::default());
    let err = engine
        .initialize(
            &resources,
            &mut buffers,
            DepthRange::new(4.2, 6.1),
            CostMode::Photometric,
            Initialization::Random,
        )
        .expect_err("mismatch");
    assert!(matches!(err, StereoError::DimensionMismatch { .. }));
}
