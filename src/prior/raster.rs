//! Per-pixel prior planes rasterised from the support triangulation.
use super::delaunay::Triangle;
use crate::device::{DeviceBuffer, DeviceContext};
use crate::error::StereoError;
use crate::hypothesis::Plane;

/// Mask id of pixels whose prior was taken over from another field.
pub const INHERITED_MASK: u32 = u32::MAX;

/// Triangle id (1-based, `0` = no prior) and plane for every pixel.
#[derive(Debug)]
pub struct PriorField {
    width: usize,
    height: usize,
    masks: DeviceBuffer<u32>,
    planes: DeviceBuffer<Plane>,
}

impl PriorField {
    #[track_caller]
    pub fn allocate(ctx: &DeviceContext, width: usize, height: usize) -> Result<Self, StereoError> {
        let len = width * height;
        Ok(Self {
            width,
            height,
            masks: ctx.alloc(len, 0u32)?,
            planes: ctx.alloc(len, Plane::default())?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn mask_at(&self, idx: usize) -> u32 {
        self.masks[idx]
    }

    /// Prior plane of pixel `idx`, `None` outside every triangle.
    #[inline]
    pub fn plane_at(&self, idx: usize) -> Option<&Plane> {
        (self.masks[idx] != 0).then(|| &self.planes[idx])
    }

    pub fn masks(&self) -> &[u32] {
        &self.masks
    }

    pub(crate) fn set(&mut self, idx: usize, mask: u32, plane: Plane) {
        self.masks[idx] = mask;
        self.planes[idx] = plane;
    }

    /// Assign every pixel to the first triangle containing it (edges
    /// inclusive). `planes[i]` belongs to `triangles[i]` and gets id `i + 1`.
    /// Returns the number of covered pixels.
    pub fn rasterize(&mut self, triangles: &[Triangle], planes: &[Plane]) -> usize {
        let mut covered = 0;
        for (i, (tri, plane)) in triangles.iter().zip(planes).enumerate() {
            let id = i as u32 + 1;
            let xs = tri.vertices.map(|p| p.x);
            let ys = tri.vertices.map(|p| p.y);
            let x0 = xs.iter().copied().min().unwrap_or(0);
            let x1 = xs.iter().copied().max().unwrap_or(0).min(self.width.saturating_sub(1));
            let y0 = ys.iter().copied().min().unwrap_or(0);
            let y1 = ys.iter().copied().max().unwrap_or(0).min(self.height.saturating_sub(1));
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let idx = y * self.width + x;
                    if idx >= self.masks.len() || self.masks[idx] != 0 {
                        continue;
                    }
                    if tri.contains(x as f64, y as f64) {
                        self.set(idx, id, *plane);
                        covered += 1;
                    }
                }
            }
        }
        covered
    }

    /// Fraction of pixels with a prior.
    pub fn coverage(&self) -> f32 {
        if self.masks.is_empty() {
            return 0.0;
        }
        self.masks.iter().filter(|&&m| m != 0).count() as f32 / self.masks.len() as f32
    }

    /// Copy priors from `other` into pixels that have none; copied pixels
    /// get [`INHERITED_MASK`].
    #[track_caller]
    pub fn fill_missing_from(&mut self, other: &PriorField) -> Result<usize, StereoError> {
        if (other.width, other.height) != (self.width, self.height) {
            return Err(StereoError::dimension_mismatch(
                (self.width, self.height),
                (other.width, other.height),
            ));
        }
        let mut filled = 0;
        for idx in 0..self.masks.len() {
            if self.masks[idx] != 0 {
                continue;
            }
            if let Some(plane) = other.plane_at(idx) {
                self.set(idx, INHERITED_MASK, *plane);
                filled += 1;
            }
        }
        Ok(filled)
    }
}
