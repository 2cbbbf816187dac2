//! Bilinear resampling used for working-resolution fitting and level images.
use super::{ImageF32, ImageViewMut};

/// Bilinear sample at continuous texel coordinates, clamped at the borders.
#[inline]
pub fn sample_bilinear_clamped(image: &ImageF32, x: f32, y: f32) -> f32 {
    if image.w == 0 || image.h == 0 {
        return 0.0;
    }
    let x = x.clamp(0.0, (image.w - 1) as f32);
    let y = y.clamp(0.0, (image.h - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(image.w - 1);
    let y1 = (y0 + 1).min(image.h - 1);
    let ax = x - x0 as f32;
    let ay = y - y0 as f32;
    let top = image.get(x0, y0) * (1.0 - ax) + image.get(x1, y0) * ax;
    let bottom = image.get(x0, y1) * (1.0 - ax) + image.get(x1, y1) * ax;
    top * (1.0 - ay) + bottom * ay
}

/// Resize `src` to `w × h` with pixel-centre aligned bilinear interpolation.
pub fn resize_bilinear(src: &ImageF32, w: usize, h: usize) -> ImageF32 {
    if src.w == w && src.h == h {
        return src.clone();
    }
    let mut out = ImageF32::new(w, h);
    if src.w == 0 || src.h == 0 {
        return out;
    }
    let sx = src.w as f32 / w.max(1) as f32;
    let sy = src.h as f32 / h.max(1) as f32;
    for y in 0..h {
        let fy = (y as f32 + 0.5) * sy - 0.5;
        let row = out.row_mut(y);
        for (x, dst) in row.iter_mut().enumerate() {
            let fx = (x as f32 + 0.5) * sx - 0.5;
            *dst = sample_bilinear_clamped(src, fx, fy);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_image_stays_constant() {
        let src = ImageF32::filled(10, 7, 0.25);
        let out = resize_bilinear(&src, 4, 3);
        assert!(out.data.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn horizontal_ramp_is_preserved_under_halving() {
        let src = ImageF32::from_fn(8, 2, |x, _| x as f32);
        let out = resize_bilinear(&src, 4, 1);
        assert_eq!(out.data, vec![0.5, 2.5, 4.5, 6.5]);
    }
}
