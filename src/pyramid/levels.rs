//! Per-problem level stack: every view fitted to the working size, then
//! halved per level with an optional pre-blur. Cameras follow each resize.
use super::filters::blur;
use super::options::PyramidOptions;
use crate::camera::Camera;
use crate::image::{resize_bilinear, ImageF32};
use log::debug;
use std::time::Instant;

/// Dimensions of level `level` for a level-0 size of `w × h`.
#[inline]
pub fn level_size(w: usize, h: usize, level: usize) -> (usize, usize) {
    let shift = level.min(usize::BITS as usize - 1);
    ((w >> shift).max(1), (h >> shift).max(1))
}

/// Resize `image` to `w × h` and rescale `camera` to match.
pub fn rescale_to(image: &ImageF32, camera: &Camera, w: usize, h: usize) -> (ImageF32, Camera) {
    let mut cam = *camera;
    // Cameras read from disk may not carry the image size yet.
    if cam.width == 0 || cam.height == 0 {
        cam.width = image.w;
        cam.height = image.h;
    }
    (resize_bilinear(image, w, h), cam.rescaled(w, h))
}

/// Downscale `image` so its longer side is at most `max_image_size`.
/// Smaller images are returned unchanged.
pub fn fit_within(image: &ImageF32, camera: &Camera, max_image_size: usize) -> (ImageF32, Camera) {
    let longer = image.w.max(image.h);
    if max_image_size == 0 || longer <= max_image_size {
        return rescale_to(image, camera, image.w, image.h);
    }
    let scale = max_image_size as f64 / longer as f64;
    let w = ((image.w as f64 * scale).round() as usize).max(1);
    let h = ((image.h as f64 * scale).round() as usize).max(1);
    rescale_to(image, camera, w, h)
}

/// Images and cameras of every view at one level; index 0 is the reference.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub index: usize,
    pub images: Vec<ImageF32>,
    pub cameras: Vec<Camera>,
}

impl PyramidLevel {
    pub fn reference_image(&self) -> &ImageF32 {
        &self.images[0]
    }

    pub fn reference_camera(&self) -> &Camera {
        &self.cameras[0]
    }

    /// Reference image size.
    pub fn size(&self) -> (usize, usize) {
        (self.images[0].w, self.images[0].h)
    }
}

/// Levels ordered fine (0) to coarse.
#[derive(Clone, Debug, Default)]
pub struct LevelPyramid {
    pub levels: Vec<PyramidLevel>,
    pub elapsed_ms: f64,
}

impl LevelPyramid {
    /// Build the stack. The level count is capped so the reference keeps at
    /// least one pixel per axis per level. Empty input gives an empty stack.
    pub fn build<'a>(
        views: impl IntoIterator<Item = (&'a ImageF32, &'a Camera)>,
        options: &PyramidOptions,
    ) -> Self {
        let start = Instant::now();
        let base: Vec<(ImageF32, Camera)> = views
            .into_iter()
            .map(|(img, cam)| fit_within(img, cam, options.max_image_size))
            .collect();
        let n = base.len();
        if n == 0 {
            return Self::default();
        }

        let (w0, h0) = (base[0].0.w, base[0].0.h);
        let max_levels = (w0.min(h0).max(1).ilog2() as usize) + 1;
        let num_levels = options.levels.clamp(1, max_levels);

        let mut levels = Vec::with_capacity(num_levels);
        levels.push(PyramidLevel {
            index: 0,
            images: base.iter().map(|(img, _)| img.clone()).collect(),
            cameras: base.iter().map(|(_, cam)| *cam).collect(),
        });
        for lvl in 1..num_levels {
            let use_blur = lvl <= options.blur_levels;
            let prev = &levels[lvl - 1];
            let mut images = Vec::with_capacity(n);
            let mut cams = Vec::with_capacity(n);
            for (view, (img0, cam0)) in base.iter().enumerate() {
                let (w, h) = level_size(img0.w, img0.h, lvl);
                let src = &prev.images[view];
                let down = if use_blur {
                    resize_bilinear(&blur(&options.filter, src), w, h)
                } else {
                    resize_bilinear(src, w, h)
                };
                images.push(down);
                cams.push(cam0.rescaled(w, h));
            }
            levels.push(PyramidLevel {
                index: lvl,
                images,
                cameras: cams,
            });
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "LevelPyramid::build views={} levels={} base={}x{} elapsed_ms={:.3}",
            n, num_levels, w0, h0, elapsed_ms
        );
        Self { levels, elapsed_ms }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> Option<&PyramidLevel> {
        self.levels.get(index)
    }

    pub fn finest(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    /// Levels from the coarsest to level 0.
    pub fn coarse_to_fine(&self) -> impl Iterator<Item = &PyramidLevel> {
        self.levels.iter().rev()
    }
}
