use super::{DeviceBuffer, DeviceContext};
use crate::error::StereoError;
use crate::image::ImageF32;

/// Single-channel float texture with bilinear filtering and wrap addressing.
///
/// Coordinates are texel indices: `sample(x as f32, y as f32)` returns the
/// stored texel `(x, y)` exactly.
#[derive(Debug)]
pub struct Texture {
    width: usize,
    height: usize,
    texels: DeviceBuffer<f32>,
}

impl Texture {
    #[track_caller]
    pub fn upload(ctx: &DeviceContext, image: &ImageF32) -> Result<Self, StereoError> {
        let texels = if image.stride == image.w {
            ctx.upload(&image.data[..image.w * image.h])?
        } else {
            ctx.alloc_with(image.w * image.h, |i| image.get(i % image.w, i / image.w))?
        };
        Ok(Self {
            width: image.w,
            height: image.h,
            texels,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size_bytes(&self) -> usize {
        self.texels.size_bytes()
    }

    /// Exact texel read.
    #[inline]
    pub fn fetch(&self, x: usize, y: usize) -> f32 {
        self.texels[y * self.width + x]
    }

    #[inline]
    fn wrapped(&self, x: i64, y: i64) -> f32 {
        let xi = x.rem_euclid(self.width as i64) as usize;
        let yi = y.rem_euclid(self.height as i64) as usize;
        self.texels[yi * self.width + xi]
    }

    /// Bilinear sample at continuous texel coordinates.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 || !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let fx = x.floor();
        let fy = y.floor();
        let ax = x - fx;
        let ay = y - fy;
        let x0 = fx as i64;
        let y0 = fy as i64;
        let top = self.wrapped(x0, y0) * (1.0 - ax) + self.wrapped(x0 + 1, y0) * ax;
        let bottom = self.wrapped(x0, y0 + 1) * (1.0 - ax) + self.wrapped(x0 + 1, y0 + 1) * ax;
        top * (1.0 - ay) + bottom * ay
    }

    pub fn download(&self) -> ImageF32 {
        ImageF32 {
            w: self.width,
            h: self.height,
            stride: self.width,
            data: self.texels.download(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_at_texel_returns_stored_value() {
        let ctx = DeviceContext::new();
        let image = ImageF32::from_fn(4, 3, |x, y| (x + 10 * y) as f32);
        let tex = Texture::upload(&ctx, &image).expect("upload");
        assert_eq!(tex.sample(2.0, 1.0), 12.0);
        assert_eq!(tex.fetch(3, 2), 23.0);
        assert!((tex.sample(1.5, 0.0) - 1.5).abs() < 1e-6);
        assert_eq!(tex.download(), image);
    }

    #[test]
    fn addressing_wraps_around() {
        let ctx = DeviceContext::new();
        let image = ImageF32::from_fn(4, 2, |x, _| x as f32);
        let tex = Texture::upload(&ctx, &image).expect("upload");
        assert_eq!(tex.sample(-1.0, 0.0), 3.0);
        assert_eq!(tex.sample(4.0, 5.0), 0.0);
        assert!((tex.sample(3.5, 0.0) - 1.5).abs() < 1e-6);
    }
}
