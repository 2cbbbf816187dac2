//! Owned three-channel image of `Vector3<f32>` samples (normal maps).
use super::ImageView;
use nalgebra::Vector3;

#[derive(Clone, Debug, PartialEq)]
pub struct ImageVec3 {
    pub w: usize,
    pub h: usize,
    pub data: Vec<Vector3<f32>>,
}

impl ImageVec3 {
    pub fn new(w: usize, h: usize) -> Self {
        Self::filled(w, h, Vector3::zeros())
    }

    pub fn filled(w: usize, h: usize, value: Vector3<f32>) -> Self {
        Self {
            w,
            h,
            data: vec![value; w * h],
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Vector3<f32> {
        self.data[self.idx(x, y)]
    }
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: Vector3<f32>) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Interleaved `[x, y, z, x, y, z, ...]` samples.
    pub fn to_interleaved(&self) -> Vec<f32> {
        self.data.iter().flat_map(|v| [v.x, v.y, v.z]).collect()
    }

    /// Inverse of [`ImageVec3::to_interleaved`]; `None` on a length mismatch.
    pub fn from_interleaved(w: usize, h: usize, samples: &[f32]) -> Option<Self> {
        if samples.len() != w * h * 3 {
            return None;
        }
        let data = samples
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        Some(Self { w, h, data })
    }
}

impl ImageView for ImageVec3 {
    type Pixel = Vector3<f32>;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn stride(&self) -> usize {
        self.w
    }
    #[inline]
    fn row(&self, y: usize) -> &[Vector3<f32>] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }
    #[inline]
    fn as_slice(&self) -> Option<&[Vector3<f32>]> {
        Some(&self.data)
    }
}
