use crate::camera::Camera;
use crate::image::ImageF32;

/// One calibrated view of a problem.
#[derive(Clone, Debug)]
pub struct ViewInput {
    pub image_id: usize,
    /// Intensities in `[0, 1]`.
    pub image: ImageF32,
    pub camera: Camera,
}

impl ViewInput {
    /// Pair an image with its camera; a camera without a recorded size takes
    /// the image's.
    pub fn new(image_id: usize, image: ImageF32, mut camera: Camera) -> Self {
        if camera.width == 0 || camera.height == 0 {
            camera.width = image.w;
            camera.height = image.h;
        }
        Self {
            image_id,
            image,
            camera,
        }
    }
}

/// Views of one problem; index 0 is the reference.
#[derive(Clone, Debug, Default)]
pub struct ProblemInput {
    pub views: Vec<ViewInput>,
    /// Per-pixel confidence of the reference view, at any resolution.
    /// Subtracted from the cost when the planar prior picks support points.
    pub confidence: Option<ImageF32>,
}

impl ProblemInput {
    pub fn new(views: Vec<ViewInput>) -> Self {
        Self {
            views,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: ImageF32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn reference(&self) -> Option<&ViewInput> {
        self.views.first()
    }

    /// `(image, camera)` of every view, reference first.
    pub fn pairs(&self) -> impl Iterator<Item = (&ImageF32, &Camera)> {
        self.views.iter().map(|v| (&v.image, &v.camera))
    }
}
