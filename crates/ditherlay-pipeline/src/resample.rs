//! Dot-scale resampling.
//!
//! Dithering at `1/dot_size` resolution and enlarging the result with
//! nearest-neighbour sampling turns every dithered pixel into a
//! `dot_size`-wide block, which is what produces the coarse
//! "big dot" look.
//!
//! Both directions use the same mapping: destination `(x, y)` reads
//! source `(floor(x * src_w / dst_w), floor(y * src_h / dst_h))`,
//! copying all four channels.

use crate::types::{Dimensions, RgbaImage};

/// Working resolution for a given dot size: `max(1, floor(side / dot_size))`.
///
/// An empty side stays empty.
#[must_use]
pub fn scaled_dimensions(full: Dimensions, dot_size: u32) -> Dimensions {
    let dot = dot_size.max(1);
    let side = |len: u32| (len / dot).max(len.min(1));
    Dimensions {
        width: side(full.width),
        height: side(full.height),
    }
}

/// Nearest-neighbour resample of `image` to `target`.
///
/// Works for shrinking and enlarging alike. Resampling to the image's
/// own size returns an identical copy.
#[must_use = "returns the resampled image"]
pub fn nearest(image: &RgbaImage, target: Dimensions) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (target.width, target.height) {
        return image.clone();
    }
    let source_x = |x: u32| source_index(x, src_w, target.width);
    let source_y = |y: u32| source_index(y, src_h, target.height);
    RgbaImage::from_fn(target.width, target.height, |x, y| {
        *image.get_pixel(source_x(x), source_y(y))
    })
}

/// `floor(dst * src_len / dst_len)`, kept in bounds.
fn source_index(dst: u32, src_len: u32, dst_len: u32) -> u32 {
    let mapped = u64::from(dst) * u64::from(src_len) / u64::from(dst_len.max(1));
    u32::try_from(mapped)
        .unwrap_or(u32::MAX)
        .min(src_len.saturating_sub(1))
}

/// Shrink `image` to its dot-scale working resolution.
///
/// `dot_size <= 1` returns an unchanged copy.
#[must_use = "returns the downscaled image"]
pub fn scale_down(image: &RgbaImage, dot_size: u32) -> RgbaImage {
    if dot_size <= 1 {
        return image.clone();
    }
    let target = scaled_dimensions(Dimensions::of(image), dot_size);
    tracing::debug!(dot_size, %target, "dot-scale down");
    nearest(image, target)
}

/// Enlarge a dithered working image back to `full` resolution.
#[must_use = "returns the upscaled image"]
pub fn scale_up(image: &RgbaImage, full: Dimensions) -> RgbaImage {
    nearest(image, full)
}
