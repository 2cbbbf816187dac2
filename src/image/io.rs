//! I/O helpers for grayscale images and JSON.
//!
//! - `load_grayscale_image`: read a PNG/JPEG/etc. into an owned 8-bit gray buffer.
//! - `load_intensity_image`: same, converted to `ImageF32` in `[0, 1]`.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{ImageF32, ImageU8};
use crate::error::InputError;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Owned 8-bit grayscale buffer with borrowed view conversion.
#[derive(Clone, Debug)]
pub struct GrayImageU8 {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayImageU8 {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Borrow as a read-only `ImageU8` view
    pub fn as_view(&self) -> ImageU8<'_> {
        ImageU8 {
            w: self.width,
            h: self.height,
            stride: self.width,
            data: &self.data,
        }
    }
}

/// Load an image from disk and convert to 8-bit grayscale.
pub fn load_grayscale_image(path: &Path) -> Result<GrayImageU8, InputError> {
    let img = image::open(path)
        .map_err(|e| match e {
            image::ImageError::IoError(source) => InputError::io(path, source),
            other => InputError::Image {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })?
        .into_luma8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    Ok(GrayImageU8::new(width, height, img.into_raw()))
}

/// Load an image as floating-point intensities in `[0, 1]`.
pub fn load_intensity_image(path: &Path) -> Result<ImageF32, InputError> {
    Ok(load_grayscale_image(path)?.as_view().to_f32())
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), InputError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| InputError::parse(path, format!("failed to serialize JSON: {e}")))?;
    fs::write(path, json).map_err(|e| InputError::io(path, e))
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), InputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| InputError::io(parent, e))?;
        }
    }
    Ok(())
}
