//! Halftone circles pattern renderer.
//!
//! Replaces the dither engine with a newspaper-style dot screen:
//!
//! 1. Grid points sit at `spacing / 2 + k * spacing` on both axes.
//! 2. At each point, WCAG relative luminance is averaged over the
//!    surrounding box with Gaussian weights (`sigma = spacing / 2`).
//! 3. Darker samples get bigger dots:
//!    `radius = (min + (1 - luminance) * (max - min)) * scale`.
//! 4. Each dot is drawn as a filled circle with a one-pixel feathered
//!    edge onto a fresh, fully opaque canvas.
//!
//! Dots whose radius is 0.1 px or less are skipped.

use std::fmt;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::types::{PatternScale, PipelineConfig, RgbaImage, to_channel};

/// Smallest radius that is still drawn.
pub const MIN_VISIBLE_RADIUS: f32 = 0.1;

/// How dots and background are coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HalftoneColorMode {
    /// Black dots on white.
    #[default]
    BlackWhite,
    /// White dots on black.
    Inverted,
    /// Dots in the source colour at half brightness, on white.
    Original,
}

impl HalftoneColorMode {
    /// Configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlackWhite => "black-white",
            Self::Inverted => "inverted",
            Self::Original => "original",
        }
    }

    const fn background(self) -> [u8; 3] {
        match self {
            Self::BlackWhite | Self::Original => [255, 255, 255],
            Self::Inverted => [0, 0, 0],
        }
    }

    fn ink(self, source: [u8; 3]) -> [f32; 3] {
        match self {
            Self::BlackWhite => [0.0; 3],
            Self::Inverted => [255.0; 3],
            Self::Original => source.map(|c| f32::from(c) * 0.5),
        }
    }
}

impl fmt::Display for HalftoneColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for HalftoneColorMode {
    fn from(name: String) -> Self {
        match name.as_str() {
            "black-white" => Self::BlackWhite,
            "inverted" => Self::Inverted,
            "original" => Self::Original,
            _ => {
                tracing::warn!(%name, "unknown halftone colour mode, using black-white");
                Self::default()
            }
        }
    }
}

impl From<HalftoneColorMode> for String {
    fn from(mode: HalftoneColorMode) -> Self {
        mode.name().to_owned()
    }
}

/// Halftone parameters, read out of a [`PipelineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalftoneParams {
    /// Distance between grid points, in pixels.
    pub grid_spacing: f32,
    /// Radius for pure white.
    pub min_dot: f32,
    /// Radius for pure black.
    pub max_dot: f32,
    /// Radius multiplier.
    pub scale: PatternScale,
    /// Dot colouring.
    pub color_mode: HalftoneColorMode,
}

impl HalftoneParams {
    /// Read the halftone fields out of a configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            grid_spacing: config.halftone_grid_spacing.max(1.0),
            min_dot: config.halftone_min_dot,
            max_dot: config.halftone_max_dot,
            scale: config.pattern_scale(),
            color_mode: config.halftone_color_mode,
        }
    }
}

/// sRGB channel (0–255) to linear light (0–1), WCAG 2.0 formulation.
fn linearize(channel: u8) -> f32 {
    let c = f32::from(channel) / 255.0;
    if c <= 0.039_28 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG relative luminance of an sRGB colour, in 0–1.
#[must_use]
pub fn wcag_luminance(rgb: [u8; 3]) -> f32 {
    0.2126f32.mul_add(
        linearize(rgb[0]),
        0.7152f32.mul_add(linearize(rgb[1]), 0.0722 * linearize(rgb[2])),
    )
}

/// Dot radius for a sample luminance in 0–1.
#[must_use]
pub fn dot_radius(luminance: f32, min_dot: f32, max_dot: f32, scale: PatternScale) -> f32 {
    (1.0 - luminance).mul_add(max_dot - min_dot, min_dot) * scale.0
}

/// Gaussian-weighted mean luminance around `(cx, cy)`.
///
/// Samples every pixel in the box `floor(c - radius)..=ceil(c + radius)`
/// clipped to the image, weighting by `exp(-d² / (2 radius²))`. An empty
/// box reads as 0.5.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn sample_luminance(
    luminance: &[f32],
    width: u32,
    height: u32,
    cx: f32,
    cy: f32,
    radius: f32,
) -> f32 {
    if width == 0 || height == 0 {
        return 0.5;
    }
    let clip = |v: f32, len: u32| v.clamp(0.0, (len - 1) as f32) as u32;
    let (x0, x1) = (clip((cx - radius).floor(), width), clip((cx + radius).ceil(), width));
    let (y0, y1) = (clip((cy - radius).floor(), height), clip((cy + radius).ceil(), height));
    let two_sigma_sq = 2.0 * radius * radius;

    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let weight = (-dx.mul_add(dx, dy * dy) / two_sigma_sq).exp();
            total += luminance[y as usize * width as usize + x as usize] * weight;
            weight_sum += weight;
        }
    }
    if weight_sum > 0.0 { total / weight_sum } else { 0.5 }
}

/// Draw an anti-aliased disc blending `ink` over `canvas`.
///
/// Pixels with `d <= r` are covered; coverage falls linearly from 1 to 0
/// across the outermost pixel (`d > r - 1`). `source` supplies the
/// per-pixel colour for [`HalftoneColorMode::Original`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn draw_dot(
    canvas: &mut RgbaImage,
    source: &RgbaImage,
    cx: f32,
    cy: f32,
    radius: f32,
    mode: HalftoneColorMode,
) {
    let (w, h) = canvas.dimensions();
    let clip = |v: f32, len: u32| v.clamp(0.0, (len - 1) as f32) as u32;
    let (x0, x1) = (clip((cx - radius - 1.0).floor(), w), clip((cx + radius + 1.0).ceil(), w));
    let (y0, y1) = (clip((cy - radius - 1.0).floor(), h), clip((cy + radius + 1.0).ceil(), h));
    let r_sq = radius * radius;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let d_sq = dx.mul_add(dx, dy * dy);
            if d_sq > r_sq {
                continue;
            }
            let dist = d_sq.sqrt();
            let coverage = if dist > radius - 1.0 {
                1.0 - (dist - (radius - 1.0))
            } else {
                1.0
            };
            let src = source.get_pixel(x, y).0;
            let ink = mode.ink([src[0], src[1], src[2]]);
            let pixel = canvas.get_pixel_mut(x, y);
            for (c, i) in pixel.0[..3].iter_mut().zip(ink) {
                *c = to_channel((i - f32::from(*c)).mul_add(coverage, f32::from(*c)));
            }
        }
    }
}

/// Render the halftone screen of `image`.
///
/// Returns the opaque output image and the number of dots drawn.
#[must_use = "returns the rendered halftone"]
#[allow(clippy::cast_precision_loss)]
pub fn render(image: &RgbaImage, params: &HalftoneParams) -> (RgbaImage, usize) {
    let (w, h) = image.dimensions();
    let [br, bg, bb] = params.color_mode.background();
    let mut canvas = RgbaImage::from_pixel(w, h, Rgba([br, bg, bb, 255]));

    let table: [f32; 256] = std::array::from_fn(|i| linearize(u8::try_from(i).unwrap_or(u8::MAX)));
    let luminance: Vec<f32> = image
        .pixels()
        .map(|p| {
            let [r, g, b, _] = p.0.map(|c| table[usize::from(c)]);
            0.2126f32.mul_add(r, 0.7152f32.mul_add(g, 0.0722 * b))
        })
        .collect();

    let spacing = params.grid_spacing;
    let sigma = spacing / 2.0;
    let mut dots = 0;
    let mut row = 0u32;
    loop {
        let cy = (row as f32).mul_add(spacing, sigma);
        if cy >= h as f32 {
            break;
        }
        let mut col = 0u32;
        loop {
            let cx = (col as f32).mul_add(spacing, sigma);
            if cx >= w as f32 {
                break;
            }
            let lum = sample_luminance(&luminance, w, h, cx, cy, sigma);
            let radius = dot_radius(lum, params.min_dot, params.max_dot, params.scale);
            if radius > MIN_VISIBLE_RADIUS {
                draw_dot(&mut canvas, image, cx, cy, radius, params.color_mode);
                dots += 1;
            }
            col += 1;
        }
        row += 1;
    }

    tracing::debug!(spacing, dots, mode = %params.color_mode, "halftone rendered");
    (canvas, dots)
}
