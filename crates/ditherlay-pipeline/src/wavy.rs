//! Wavy-line ridge pattern renderer.
//!
//! Draws evenly spaced horizontal ridge lines, each perturbed by a sine
//! wave, over a fully transparent copy of the source. Ridge thickness
//! and colour follow the source brightness under the line centre.
//! Where lines overlap, the most opaque contribution wins the pixel:
//! alpha is the maximum over all lines, and the colour comes from the
//! line that set it.
//!
//! A Sobel [`GradientField`] over the source luminance is computed
//! alongside and reported through [`RidgeStats`].

use std::f32::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{PatternScale, PipelineConfig, RgbaImage, to_channel};

/// Ridge colour ramp endpoint for dark sources.
pub const PURPLE: [f32; 3] = [45.0, 27.0, 105.0];

/// Ridge colour ramp endpoint for bright sources.
pub const CYAN: [f32; 3] = [0.0, 212.0, 255.0];

/// Luma with BT.601 weights, in 0–255.
#[must_use]
pub fn luma(rgb: [u8; 3]) -> f32 {
    let [r, g, b] = rgb.map(f32::from);
    r.mul_add(0.299, g.mul_add(0.587, b * 0.114))
}

/// Ridge colour ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WavyLineColorMode {
    /// Dark purple through to cyan.
    #[default]
    PurpleBlue,
    /// Black through to white.
    Bw,
}

impl WavyLineColorMode {
    /// Configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PurpleBlue => "purple-blue",
            Self::Bw => "bw",
        }
    }

    /// Ridge colour for a source brightness in 0–255.
    #[must_use]
    pub fn ridge_color(self, brightness: f32) -> [f32; 3] {
        let t = (brightness / 255.0).clamp(0.0, 1.0);
        let (from, to) = match self {
            Self::PurpleBlue => (PURPLE, CYAN),
            Self::Bw => ([0.0; 3], [255.0; 3]),
        };
        std::array::from_fn(|i| from[i].mul_add(1.0 - t, to[i] * t).round())
    }
}

impl fmt::Display for WavyLineColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for WavyLineColorMode {
    fn from(name: String) -> Self {
        match name.as_str() {
            "purple-blue" => Self::PurpleBlue,
            "bw" => Self::Bw,
            _ => {
                tracing::warn!(%name, "unknown wavy-line colour mode, using purple-blue");
                Self::default()
            }
        }
    }
}

impl From<WavyLineColorMode> for String {
    fn from(mode: WavyLineColorMode) -> Self {
        mode.name().to_owned()
    }
}

/// Per-pixel Sobel gradient of source luminance.
///
/// Interior pixels get the 3×3 Sobel response; border rows and columns
/// copy their nearest interior neighbour. Images narrower or shorter
/// than 3 pixels have no interior and yield an all-zero field.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    width: u32,
    height: u32,
    angles: Vec<f32>,
    magnitudes: Vec<f32>,
}

impl GradientField {
    /// Run the Sobel operator over `image`.
    #[must_use]
    pub fn sobel(image: &RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        let len = w as usize * h as usize;
        let mut field = Self {
            width: w,
            height: h,
            angles: vec![0.0; len],
            magnitudes: vec![0.0; len],
        };
        if w < 3 || h < 3 {
            return field;
        }

        let lum: Vec<f32> = image.pixels().map(|p| luma([p.0[0], p.0[1], p.0[2]])).collect();
        let at = |x: u32, y: u32| lum[y as usize * w as usize + x as usize];

        for y in 0..h {
            for x in 0..w {
                let (cx, cy) = (x.clamp(1, w - 2), y.clamp(1, h - 2));
                let gx = (at(cx + 1, cy - 1) + 2.0 * at(cx + 1, cy) + at(cx + 1, cy + 1))
                    - (at(cx - 1, cy - 1) + 2.0 * at(cx - 1, cy) + at(cx - 1, cy + 1));
                let gy = (at(cx - 1, cy + 1) + 2.0 * at(cx, cy + 1) + at(cx + 1, cy + 1))
                    - (at(cx - 1, cy - 1) + 2.0 * at(cx, cy - 1) + at(cx + 1, cy - 1));
                let i = y as usize * w as usize + x as usize;
                field.angles[i] = gy.atan2(gx);
                field.magnitudes[i] = gx.hypot(gy);
            }
        }
        field
    }

    /// Gradient angle at `(x, y)`, radians.
    #[must_use]
    pub fn angle(&self, x: u32, y: u32) -> f32 {
        self.angles[self.index(x, y)]
    }

    /// Gradient magnitude at `(x, y)`.
    #[must_use]
    pub fn magnitude(&self, x: u32, y: u32) -> f32 {
        self.magnitudes[self.index(x, y)]
    }

    /// Mean magnitude over the whole field (0 for an empty image).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_magnitude(&self) -> f32 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        self.magnitudes.iter().sum::<f32>() / self.magnitudes.len() as f32
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Wavy-line parameters, read out of a [`PipelineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavyParams {
    /// Base ridge spacing in pixels.
    pub ridge_spacing: f32,
    /// Sine amplitude.
    pub wave_amplitude: f32,
    /// Ridge opacity multiplier.
    pub scale: PatternScale,
    /// Colour ramp.
    pub color_mode: WavyLineColorMode,
}

impl WavyParams {
    /// Read the wavy-line fields out of a configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            ridge_spacing: config.ridge_spacing,
            wave_amplitude: config.wave_amplitude,
            scale: config.pattern_scale(),
            color_mode: config.wavy_line_color_mode,
        }
    }

    /// Vertical distance between successive ridge lines:
    /// `max(ceil(max(spacing, 2)) * 0.7, 2)`.
    #[must_use]
    pub fn line_step(&self) -> f32 {
        (self.ridge_spacing.max(2.0).ceil() * 0.7).max(2.0)
    }

    /// Vertical offset of a ridge line at column `x`.
    #[must_use]
    pub fn wave_offset(&self, x: f32) -> f32 {
        self.wave_amplitude * (x / self.ridge_spacing.max(1.0) * TAU).sin() * 2.0
    }
}

/// Summary of one wavy-line render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeStats {
    /// Ridge lines drawn.
    pub lines: usize,
    /// Mean Sobel magnitude of the source.
    pub mean_gradient: f32,
}

/// Render the ridge pattern for `image`.
///
/// The output keeps the source RGB everywhere but starts fully
/// transparent; only pixels under a ridge gain alpha.
#[must_use = "returns the rendered ridge pattern"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn render(image: &RgbaImage, params: &WavyParams) -> (RgbaImage, RidgeStats) {
    let (w, h) = image.dimensions();
    let gradient = GradientField::sobel(image);
    let mut out = image.clone();
    for p in out.pixels_mut() {
        p.0[3] = 0;
    }

    let factor = params.scale.0;
    let step = params.line_step();
    let mut lines = 0;
    let mut line_y = 0.0f32;
    while line_y < h as f32 {
        let row = line_y.floor() as u32;
        for x in 0..w {
            let centre = image.get_pixel(x, row).0;
            let brightness = luma([centre[0], centre[1], centre[2]]);
            let half_width = (3.0 - brightness / 255.0).max(2.0);
            let ridge = params.color_mode.ridge_color(brightness);
            let base = line_y + params.wave_offset(x as f32);

            let mut dy = -half_width;
            while dy <= half_width {
                let draw_y = (base + dy).floor();
                if draw_y >= 0.0 && draw_y < h as f32 {
                    let y = draw_y as u32;
                    let fade = (1.0 - dy.abs() / half_width).max(0.0);
                    let mix = factor * fade;
                    let alpha = to_channel(255.0 * mix);
                    let px = out.get_pixel_mut(x, y);
                    if alpha >= px.0[3] {
                        let src = image.get_pixel(x, y).0;
                        for c in 0..3 {
                            let blended = f32::from(src[c]).mul_add(1.0 - mix, ridge[c] * mix);
                            px.0[c] = to_channel(blended);
                        }
                        px.0[3] = alpha;
                    }
                }
                dy += 1.0;
            }
        }
        lines += 1;
        line_y += step;
    }

    let stats = RidgeStats {
        lines,
        mean_gradient: gradient.mean_magnitude(),
    };
    tracing::debug!(step, lines, mean_gradient = stats.mean_gradient, "ridges rendered");
    (out, stats)
}
