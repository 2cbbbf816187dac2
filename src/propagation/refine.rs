//! Random refinement draws around the current best hypothesis.
use super::params::PropagationParams;
use crate::camera::{Camera, DepthRange};
use crate::hypothesis::{
    face_camera, perturb_depth, perturb_normal, random_depth, random_normal, Plane,
};
use rand::Rng;

/// Number of planes produced by [`refinement_candidates`].
pub const REFINEMENT_CANDIDATES: usize = 6;

/// Six candidate planes at pixel `(x, y)`: combinations of the current,
/// a fully random and a perturbed depth/normal. Perturbation amplitudes
/// shrink with `iteration`. The current depth is clamped into `range` first.
pub fn refinement_candidates<R: Rng + ?Sized>(
    rng: &mut R,
    camera: &Camera,
    x: f32,
    y: f32,
    current: &Plane,
    range: &DepthRange,
    params: &PropagationParams,
    iteration: usize,
) -> [Plane; REFINEMENT_CANDIDATES] {
    let ray = camera.ray(x, y);
    let depth = camera
        .depth_from_plane(current, x, y)
        .map(|d| d.max(range.min).min(range.max))
        .unwrap_or_else(|| random_depth(rng, range));
    let normal = face_camera(current.normal, &ray);
    let decay = 1.0 / (1.0 + iteration as f32);

    let random_d = random_depth(rng, range);
    let random_n = random_normal(rng, &ray);
    let perturbed_d = perturb_depth(rng, depth, params.depth_perturbation * decay, range);
    let perturbed_n = perturb_normal(rng, &normal, params.normal_perturbation * decay, &ray);

    [
        (random_d, normal),
        (depth, random_n),
        (random_d, random_n),
        (perturbed_d, normal),
        (depth, perturbed_n),
        (perturbed_d, perturbed_n),
    ]
    .map(|(d, n)| Plane::from_depth(camera, x, y, d, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn candidates_are_valid_planes_in_range() {
        let camera = Camera {
            k: Matrix3::new(80.0, 0.0, 20.0, 0.0, 80.0, 15.0, 0.0, 0.0, 1.0),
            width: 40,
            height: 30,
            ..Default::default()
        };
        let range = DepthRange::new(2.0, 4.0);
        let current = Plane::from_depth(&camera, 5.0, 7.0, 3.0, Vector3::new(0.0, 0.0, -1.0));
        let mut rng = SmallRng::seed_from_u64(11);
        let params = PropagationParams::default();
        for iteration in 0..3 {
            let planes =
                refinement_candidates(&mut rng, &camera, 5.0, 7.0, &current, &range, &params, iteration);
            for plane in &planes {
                let d = camera.depth_from_plane(plane, 5.0, 7.0).expect("valid");
                assert!(d > 1.99 && d < 4.01, "depth {d}");
                assert!((plane.normal.norm() - 1.0).abs() < 1e-4);
            }
            // Candidate 4 keeps the current normal with a small depth change.
            let d = camera.depth_from_plane(&planes[3], 5.0, 7.0).expect("valid");
            assert!((d - 3.0).abs() <= 3.0 * params.depth_perturbation + 1e-4);
        }
    }

    #[test]
    fn out_of_range_depth_is_pulled_into_range() {
        let camera = Camera {
            k: Matrix3::new(80.0, 0.0, 20.0, 0.0, 80.0, 15.0, 0.0, 0.0, 1.0),
            width: 40,
            height: 30,
            ..Default::default()
        };
        let range = DepthRange::new(2.0, 4.0);
        let params = PropagationParams::default();
        let mut rng = SmallRng::seed_from_u64(5);
        for depth in [0.5, 9.0] {
            let current = Plane::from_depth(&camera, 5.0, 7.0, depth, Vector3::new(0.0, 0.0, -1.0));
            let planes =
                refinement_candidates(&mut rng, &camera, 5.0, 7.0, &current, &range, &params, 0);
            for plane in &planes {
                let d = camera.depth_from_plane(plane, 5.0, 7.0).expect("valid");
                assert!(d >= 2.0 - 1e-4 && d <= 4.0 + 1e-4, "depth {d} from {depth}");
            }
        }
    }
}
