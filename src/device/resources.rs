use super::{DeviceBuffer, DeviceContext, Texture};
use crate::camera::Camera;
use crate::error::StereoError;
use crate::image::ImageF32;
use log::debug;

/// Upper bound on views per problem (reference + sources); source view sets
/// are tracked in a `u32` bitmask.
pub const MAX_IMAGES: usize = 32;

/// Per-problem device residency: one texture per view, camera parameters and,
/// in geometric mode, one depth texture per view. Index 0 is the reference.
#[derive(Debug)]
pub struct DeviceResources {
    images: Vec<Texture>,
    depths: Option<Vec<Texture>>,
    cameras: DeviceBuffer<Camera>,
}

impl DeviceResources {
    /// Upload images, cameras and optional depth maps for one problem.
    ///
    /// On failure every texture allocated so far is released before the error
    /// is returned.
    #[track_caller]
    pub fn upload(
        ctx: &DeviceContext,
        images: &[ImageF32],
        cameras: &[Camera],
        depths: Option<&[ImageF32]>,
    ) -> Result<Self, StereoError> {
        if images.is_empty() {
            return Err(StereoError::invalid_views("no reference image"));
        }
        if images.len() != cameras.len() {
            return Err(StereoError::invalid_views(format!(
                "{} images but {} cameras",
                images.len(),
                cameras.len()
            )));
        }
        if images.len() > MAX_IMAGES {
            return Err(StereoError::invalid_views(format!(
                "{} views exceed the limit of {MAX_IMAGES}",
                images.len()
            )));
        }
        for (i, (img, cam)) in images.iter().zip(cameras).enumerate() {
            if img.w != cam.width || img.h != cam.height {
                debug!(
                    "DeviceResources::upload view={i} image={}x{} camera={}x{}",
                    img.w, img.h, cam.width, cam.height
                );
                return Err(StereoError::dimension_mismatch(
                    (cam.width, cam.height),
                    (img.w, img.h),
                ));
            }
        }
        if let Some(depths) = depths {
            if depths.len() != images.len() {
                return Err(StereoError::invalid_views(format!(
                    "{} depth maps for {} views",
                    depths.len(),
                    images.len()
                )));
            }
        }

        let images = images
            .iter()
            .map(|img| Texture::upload(ctx, img))
            .collect::<Result<Vec<_>, _>>()?;
        let depths = match depths {
            Some(maps) => Some(
                maps.iter()
                    .map(|d| Texture::upload(ctx, d))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        let cameras = ctx.upload(cameras)?;
        let resources = Self {
            images,
            depths,
            cameras,
        };
        debug!(
            "DeviceResources::upload views={} depth_maps={} bytes={}",
            resources.num_images(),
            resources.depths.is_some(),
            resources.size_bytes()
        );
        Ok(resources)
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn num_sources(&self) -> usize {
        self.images.len() - 1
    }

    pub fn image(&self, view: usize) -> &Texture {
        &self.images[view]
    }

    pub fn depth(&self, view: usize) -> Option<&Texture> {
        self.depths.as_ref().map(|d| &d[view])
    }

    pub fn has_depths(&self) -> bool {
        self.depths.is_some()
    }

    pub fn camera(&self, view: usize) -> &Camera {
        &self.cameras[view]
    }

    pub fn reference_camera(&self) -> &Camera {
        &self.cameras[0]
    }

    pub fn reference_size(&self) -> (usize, usize) {
        (self.images[0].width(), self.images[0].height())
    }

    pub fn size_bytes(&self) -> usize {
        let depth_bytes: usize = self
            .depths
            .iter()
            .flatten()
            .map(Texture::size_bytes)
            .sum();
        self.images.iter().map(Texture::size_bytes).sum::<usize>()
            + depth_bytes
            + self.cameras.size_bytes()
    }

    /// Release all device allocations held for this problem.
    pub fn release(self) {
        debug!("DeviceResources::release bytes={}", self.size_bytes());
    }
}
