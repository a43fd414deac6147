//! Tone adjustment: the pre-dither filter chain.
//!
//! Every filter touches R, G and B only; alpha passes through. The
//! pixel-wise filters ([`brightness`], [`contrast`], [`noise`]) mutate
//! in place. The neighbourhood filters read from a snapshot of the
//! input, so each output pixel only sees pre-pass values.
//!
//! [`adjust`] composes the chain in its fixed order:
//! brightness → contrast → blur → noise → denoise → sharpen, skipping
//! each filter whose magnitude is zero.

use image::Rgba;
use rand::Rng;

use crate::types::{PipelineConfig, RgbaImage, to_channel};

/// Maximum blur radius honoured.
pub const MAX_BLUR_RADIUS: u32 = 3;

/// Maximum number of blur passes, regardless of radius.
pub const MAX_BLUR_PASSES: u32 = 2;

/// Map `f` over the RGB channels of every pixel.
fn map_rgb(image: &mut RgbaImage, f: impl Fn(f32) -> f32) {
    for pixel in image.pixels_mut() {
        for c in &mut pixel.0[..3] {
            *c = to_channel(f(f32::from(*c)));
        }
    }
}

/// Shift brightness by `amount * 2.55` (`amount` in -100..100).
pub fn brightness(image: &mut RgbaImage, amount: f32) {
    let shift = amount * 2.55;
    map_rgb(image, |v| v + shift);
}

/// Scale contrast about mid-grey (`amount` in -100..100).
///
/// `out = in * factor + 128 * (1 - factor)` with `factor = (100 + amount) / 100`.
pub fn contrast(image: &mut RgbaImage, amount: f32) {
    let factor = (100.0 + amount) / 100.0;
    let intercept = 128.0 * (1.0 - factor);
    map_rgb(image, |v| v.mul_add(factor, intercept));
}

/// One four-neighbour weighted average pass.
///
/// The centre pixel has weight 2 and each in-bounds neighbour (left,
/// right, up, down) weight 1; missing neighbours are left out of both
/// sum and count.
#[must_use = "returns the blurred image"]
pub fn blur_pass(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let center = image.get_pixel(x, y).0;
        let mut sum = center.map(|c| 2 * u32::from(c));
        let mut count = 2u32;
        let mut add = |px: u32, py: u32| {
            let n = image.get_pixel(px, py).0;
            for (s, v) in sum.iter_mut().zip(n) {
                *s += u32::from(v);
            }
            count += 1;
        };
        if x + 1 < w {
            add(x + 1, y);
        }
        if x > 0 {
            add(x - 1, y);
        }
        if y + 1 < h {
            add(x, y + 1);
        }
        if y > 0 {
            add(x, y - 1);
        }
        let avg = |s: u32| u8::try_from((s + count / 2) / count).unwrap_or(u8::MAX);
        Rgba([avg(sum[0]), avg(sum[1]), avg(sum[2]), center[3]])
    })
}

/// Blur with the four-neighbour kernel.
///
/// `radius` is capped at [`MAX_BLUR_RADIUS`]; the pass is repeated
/// `min(radius, MAX_BLUR_PASSES)` times. Radius 0 is a no-op.
#[must_use = "returns the blurred image"]
pub fn blur(image: &RgbaImage, radius: u32) -> RgbaImage {
    let passes = radius.min(MAX_BLUR_RADIUS).min(MAX_BLUR_PASSES);
    let mut out = image.clone();
    for _ in 0..passes {
        out = blur_pass(&out);
    }
    out
}

/// Add one uniform draw in `[-amount, amount]` per pixel to R, G and B
/// alike, with `amount = min(255, intensity * 2.55)`.
pub fn noise<R: Rng + ?Sized>(image: &mut RgbaImage, intensity: f32, rng: &mut R) {
    let amount = (intensity * 2.55).min(255.0);
    if amount <= 0.0 {
        return;
    }
    for pixel in image.pixels_mut() {
        let n: f32 = rng.gen_range(-amount..=amount);
        for c in &mut pixel.0[..3] {
            *c = to_channel(f32::from(*c) + n);
        }
    }
}

/// Blend each pixel toward the mean of itself and its four neighbours.
///
/// Out-of-bounds neighbours are replaced by the pixel itself, so the
/// mean is always over five samples. Blend strength is
/// `min(radius / 10, 1)`.
#[must_use = "returns the denoised image"]
pub fn denoise(image: &RgbaImage, radius: u32) -> RgbaImage {
    if radius == 0 {
        return image.clone();
    }
    #[allow(clippy::cast_precision_loss)]
    let strength = (radius as f32 / 10.0).min(1.0);
    let (w, h) = image.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let center = image.get_pixel(x, y).0;
        let neighbours = [
            (x + 1 < w).then(|| (x + 1, y)),
            (x > 0).then(|| (x - 1, y)),
            (y + 1 < h).then(|| (x, y + 1)),
            (y > 0).then(|| (x, y - 1)),
        ];
        let mut sum = center.map(f32::from);
        for n in neighbours {
            let v = n.map_or(center, |(nx, ny)| image.get_pixel(nx, ny).0);
            for (s, c) in sum.iter_mut().zip(v) {
                *s += f32::from(c);
            }
        }
        let blend = |i: usize| {
            let own = f32::from(center[i]);
            to_channel(own.mul_add(1.0 - strength, sum[i] / 5.0 * strength))
        };
        Rgba([blend(0), blend(1), blend(2), center[3]])
    })
}

/// Unsharp mask: `out = in + (in - blur(in, radius)) * min(strength / 100, 2)`.
///
/// A zero strength or radius returns the input unchanged.
#[must_use = "returns the sharpened image"]
pub fn sharpen(image: &RgbaImage, strength: f32, radius: u32) -> RgbaImage {
    if strength <= 0.0 || radius == 0 {
        return image.clone();
    }
    let factor = (strength / 100.0).min(2.0);
    let blurred = blur(image, radius);
    let mut out = image.clone();
    for (pixel, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for (c, b) in pixel.0[..3].iter_mut().zip(soft.0) {
            let v = f32::from(*c);
            *c = to_channel((v - f32::from(b)).mul_add(factor, v));
        }
    }
    out
}

/// Round a 0–100 slider value to an integer radius.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn radius_of(value: f32) -> u32 {
    value.round().max(0.0) as u32
}

/// Run the full tone chain on a copy of `image`.
///
/// `config` is expected to be [`clamped`](PipelineConfig::clamped).
#[must_use = "returns the adjusted image"]
pub fn adjust<R: Rng + ?Sized>(
    image: &RgbaImage,
    config: &PipelineConfig,
    rng: &mut R,
) -> RgbaImage {
    let mut out = image.clone();

    if config.brightness.abs() > f32::EPSILON {
        brightness(&mut out, config.brightness);
    }
    if config.contrast.abs() > f32::EPSILON {
        contrast(&mut out, config.contrast);
    }
    if config.blur > 0.0 {
        out = blur(&out, radius_of(config.blur));
    }
    if config.noise > 0.0 {
        noise(&mut out, config.noise, rng);
    }
    if config.denoise > 0.0 {
        out = denoise(&out, radius_of(config.denoise));
    }
    if config.sharpen_strength > 0.0 {
        out = sharpen(&out, config.sharpen_strength, config.sharpen_radius);
    }

    tracing::debug!(
        brightness = config.brightness,
        contrast = config.contrast,
        blur = config.blur,
        noise = config.noise,
        denoise = config.denoise,
        sharpen = config.sharpen_strength,
        "tone adjusted"
    );
    out
}
