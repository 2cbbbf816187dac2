//! DMB container: four little-endian `i32` header fields
//! (`type = 1`, `height`, `width`, `channels`) followed by
//! `height * width * channels` little-endian `f32` samples in row-major,
//! channel-interleaved order.
use crate::error::InputError;
use crate::image::io::ensure_parent_dir;
use crate::image::{ImageF32, ImageVec3};
use std::fs;
use std::path::Path;

const DMB_TYPE: i32 = 1;
const HEADER_BYTES: usize = 16;

/// Raw contents of a DMB file.
#[derive(Clone, Debug, PartialEq)]
pub struct DmbData {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub samples: Vec<f32>,
}

fn header_field(bytes: &[u8], i: usize) -> i32 {
    let start = i * 4;
    i32::from_le_bytes([
        bytes[start],
        bytes[start + 1],
        bytes[start + 2],
        bytes[start + 3],
    ])
}

/// Read any DMB file.
pub fn read_dmb(path: &Path) -> Result<DmbData, InputError> {
    let bytes = fs::read(path).map_err(|e| InputError::io(path, e))?;
    if bytes.len() < HEADER_BYTES {
        return Err(InputError::Truncated {
            path: path.to_path_buf(),
            expected: HEADER_BYTES,
            found: bytes.len(),
        });
    }
    let tag = header_field(&bytes, 0);
    if tag != DMB_TYPE {
        return Err(InputError::BadTag {
            path: path.to_path_buf(),
            tag,
        });
    }
    let dims = [1, 2, 3].map(|i| header_field(&bytes, i));
    if dims.iter().any(|&d| d < 0) {
        return Err(InputError::parse(path, format!("negative dimensions {dims:?}")));
    }
    let [height, width, channels] = dims.map(|d| d as usize);
    let expected = height
        .checked_mul(width)
        .and_then(|n| n.checked_mul(channels))
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_BYTES))
        .ok_or_else(|| InputError::parse(path, format!("dimensions {dims:?} overflow")))?;
    if bytes.len() < expected {
        return Err(InputError::Truncated {
            path: path.to_path_buf(),
            expected,
            found: bytes.len(),
        });
    }
    let samples = bytes[HEADER_BYTES..expected]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(DmbData {
        height,
        width,
        channels,
        samples,
    })
}

fn expect_channels(path: &Path, data: &DmbData, expected: usize) -> Result<(), InputError> {
    if data.channels != expected {
        return Err(InputError::Channels {
            path: path.to_path_buf(),
            expected,
            found: data.channels,
        });
    }
    Ok(())
}

/// Read a single-channel map (depth, cost, confidence).
pub fn read_depth_dmb(path: &Path) -> Result<ImageF32, InputError> {
    let data = read_dmb(path)?;
    expect_channels(path, &data, 1)?;
    ImageF32::from_vec(data.width, data.height, data.samples)
        .ok_or_else(|| InputError::parse(path, "sample count mismatch"))
}

/// Read a three-channel normal map.
pub fn read_normal_dmb(path: &Path) -> Result<ImageVec3, InputError> {
    let data = read_dmb(path)?;
    expect_channels(path, &data, 3)?;
    ImageVec3::from_interleaved(data.width, data.height, &data.samples)
        .ok_or_else(|| InputError::parse(path, "sample count mismatch"))
}

/// Write raw samples with the given layout.
pub fn write_dmb(
    path: &Path,
    width: usize,
    height: usize,
    channels: usize,
    samples: &[f32],
) -> Result<(), InputError> {
    if samples.len() != width * height * channels {
        return Err(InputError::parse(
            path,
            format!(
                "{} samples for a {width}x{height}x{channels} map",
                samples.len()
            ),
        ));
    }
    ensure_parent_dir(path)?;
    let mut bytes = Vec::with_capacity(HEADER_BYTES + samples.len() * 4);
    for field in [DMB_TYPE, height as i32, width as i32, channels as i32] {
        bytes.extend_from_slice(&field.to_le_bytes());
    }
    for v in samples {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes).map_err(|e| InputError::io(path, e))
}

pub fn write_depth_dmb(path: &Path, map: &ImageF32) -> Result<(), InputError> {
    let samples: Vec<f32> = (0..map.h)
        .flat_map(|y| (0..map.w).map(move |x| (x, y)))
        .map(|(x, y)| map.get(x, y))
        .collect();
    write_dmb(path, map.w, map.h, 1, &samples)
}

pub fn write_normal_dmb(path: &Path, map: &ImageVec3) -> Result<(), InputError> {
    write_dmb(path, map.w, map.h, 3, &map.to_interleaved())
}
