//! Synthetic multi-view scenes: a textured fronto-parallel plane seen by a
//! reference camera and horizontally displaced sources.
use nalgebra::{Matrix3, Vector3};
use patchmatch_mvs::image::ImageF32;
use patchmatch_mvs::{Camera, ProblemInput, StereoResult, ViewInput};

pub const DEPTH: f32 = 5.0;

/// Smooth, non-periodic intensity pattern in `[0, 1]`.
pub fn texture(u: f32, v: f32) -> f32 {
    0.5 + 0.2 * (0.9 * u + 0.3 * v).sin()
        + 0.15 * (0.37 * u - 0.8 * v + 1.0).sin()
        + 0.08 * (1.7 * u + 1.1 * v + 0.5).sin()
}

/// Two-by-two checkerboard over a `w × h` frame with cells of half the frame
/// size. Low contrast keeps both colours inside the bilateral colour window.
pub fn checkerboard(u: f32, v: f32, w: usize, h: usize) -> f32 {
    let cx = (u / (w as f32 / 2.0)).floor() as i64;
    let cy = (v / (h as f32 / 2.0)).floor() as i64;
    if (cx + cy).rem_euclid(2) == 0 {
        0.45
    } else {
        0.55
    }
}

pub struct PlaneScene {
    pub width: usize,
    pub height: usize,
    pub focal: f32,
    pub offsets: Vec<f32>,
}

impl PlaneScene {
    pub fn new(width: usize, height: usize, focal: f32) -> Self {
        Self {
            width,
            height,
            focal,
            offsets: vec![0.0, -0.4, 0.4],
        }
    }

    pub fn camera(&self, tx: f32) -> Camera {
        let (w, h) = (self.width as f32, self.height as f32);
        Camera {
            k: Matrix3::new(self.focal, 0.0, w / 2.0, 0.0, self.focal, h / 2.0, 0.0, 0.0, 1.0),
            t: Vector3::new(tx, 0.0, 0.0),
            width: self.width,
            height: self.height,
            depth_min: 4.2,
            depth_max: 6.1,
            ..Default::default()
        }
    }

    /// Image of view `tx`: the texture shifted by the disparity at `DEPTH`.
    pub fn image(&self, tx: f32) -> ImageF32 {
        let shift = self.focal * tx / DEPTH;
        ImageF32::from_fn(self.width, self.height, |x, y| {
            texture(x as f32 - shift, y as f32)
        })
    }

    pub fn input(&self) -> ProblemInput {
        let views = self
            .offsets
            .iter()
            .enumerate()
            .map(|(id, &tx)| ViewInput::new(id, self.image(tx), self.camera(tx)))
            .collect();
        ProblemInput::new(views)
    }

    /// Ground-truth depth map of every view (the plane is fronto-parallel).
    pub fn depth_map(&self) -> ImageF32 {
        ImageF32::filled(self.width, self.height, DEPTH)
    }
}

/// Fraction of pixels at least `margin` away from the border whose depth is
/// within `rel_tol` of `DEPTH`.
pub fn inlier_ratio(result: &StereoResult, margin: usize, rel_tol: f32) -> f32 {
    let (w, h) = (result.width(), result.height());
    let mut inliers = 0usize;
    let mut total = 0usize;
    for y in margin..h.saturating_sub(margin) {
        for x in margin..w.saturating_sub(margin) {
            total += 1;
            let d = result.depth.get(x, y);
            if (d - DEPTH).abs() < rel_tol * DEPTH {
                inliers += 1;
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    inliers as f32 / total as f32
}
