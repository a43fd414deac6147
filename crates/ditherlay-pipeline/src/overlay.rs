//! Overlay compositing.
//!
//! Turns a fully replaced image into a translucent layer: each pixel's
//! alpha becomes how much the effect changed it, so untouched regions
//! vanish and heavily dithered regions show through.

use crate::types::{Dimensions, OverlayOpacity, PipelineError, RgbaImage, to_channel};

/// Set the alpha of every `processed` pixel to
/// `clamp(mean(|ΔR|, |ΔG|, |ΔB|) * opacity, 0, 255)`, leaving RGB as is.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] when the two images
/// differ in size.
pub fn composite(
    original: &RgbaImage,
    processed: &mut RgbaImage,
    opacity: OverlayOpacity,
) -> Result<(), PipelineError> {
    if original.dimensions() != processed.dimensions() {
        let Dimensions { width, height } = Dimensions::of(original);
        return Err(PipelineError::InvalidDimensions {
            width,
            height,
            expected: original.as_raw().len(),
            actual: processed.as_raw().len(),
        });
    }
    for (out, src) in processed.pixels_mut().zip(original.pixels()) {
        let diff: u16 = out.0[..3]
            .iter()
            .zip(&src.0[..3])
            .map(|(&a, &b)| u16::from(a.abs_diff(b)))
            .sum();
        out.0[3] = to_channel(f32::from(diff) / 3.0 * opacity.0);
    }
    Ok(())
}

/// Mean alpha of an image, 0–255.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_alpha(image: &RgbaImage) -> f64 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let total: u64 = image.pixels().map(|p| u64::from(p.0[3])).sum();
    total as f64 / count as f64
}

/// Source-over blend of `overlay` onto `base`, producing an opaque-where-
/// `base`-is preview.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] when the two images
/// differ in size.
pub fn flatten(base: &RgbaImage, overlay: &RgbaImage) -> Result<RgbaImage, PipelineError> {
    if base.dimensions() != overlay.dimensions() {
        let Dimensions { width, height } = Dimensions::of(base);
        return Err(PipelineError::InvalidDimensions {
            width,
            height,
            expected: base.as_raw().len(),
            actual: overlay.as_raw().len(),
        });
    }
    let mut out = base.clone();
    for (dst, src) in out.pixels_mut().zip(overlay.pixels()) {
        let sa = f32::from(src.0[3]) / 255.0;
        let da = f32::from(dst.0[3]) / 255.0;
        let oa = da.mul_add(1.0 - sa, sa);
        for c in 0..3 {
            let blended = if oa > 0.0 {
                (f32::from(dst.0[c]) * da).mul_add(1.0 - sa, f32::from(src.0[c]) * sa) / oa
            } else {
                0.0
            };
            dst.0[c] = to_channel(blended);
        }
        dst.0[3] = to_channel(oa * 255.0);
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(4, 4, |x, y| {
            let v = if (x + y) % 2 == 0 { 0 } else { 255 };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn identical_images_give_zero_alpha() {
        let original = checker();
        let mut processed = checker();
        composite(&original, &mut processed, OverlayOpacity(2.0)).unwrap();
        assert!(processed.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn maximal_divergence_scales_with_opacity() {
        let original = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        for (opacity, expected) in [(1.0, 255), (0.5, 128), (2.0, 255), (0.0, 0)] {
            let mut processed = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0]));
            composite(&original, &mut processed, OverlayOpacity(opacity)).unwrap();
            assert_eq!(processed.get_pixel(0, 0).0, [255, 255, 255, expected], "opacity {opacity}");
        }
    }

    #[test]
    fn alpha_uses_channel_mean() {
        let original = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let mut processed = RgbaImage::from_pixel(1, 1, Rgba([90, 0, 0, 255]));
        composite(&original, &mut processed, OverlayOpacity(1.0)).unwrap();
        assert_eq!(processed.get_pixel(0, 0).0[3], 30);
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let original = RgbaImage::new(2, 2);
        let mut processed = RgbaImage::new(3, 2);
        assert!(matches!(
            composite(&original, &mut processed, OverlayOpacity(1.0)),
            Err(PipelineError::InvalidDimensions { expected: 16, actual: 24, .. })
        ));
    }

    #[test]
    fn mean_alpha_of_empty_image_is_zero() {
        assert!(mean_alpha(&RgbaImage::new(0, 0)).abs() < f64::EPSILON);
    }

    #[test]
    fn flatten_transparent_overlay_keeps_base() {
        let base = checker();
        let overlay = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 0]));
        assert_eq!(flatten(&base, &overlay).unwrap(), base);
    }

    #[test]
    fn flatten_opaque_overlay_replaces_base() {
        let base = checker();
        let overlay = RgbaImage::from_pixel(4, 4, Rgba([200, 10, 10, 255]));
        let out = flatten(&base, &overlay).unwrap();
        assert!(out.pixels().all(|p| p.0 == [200, 10, 10, 255]));
    }

    #[test]
    fn flatten_half_alpha_blends() {
        let base = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        let out = flatten(&base, &overlay).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128, 255]);
    }
}
