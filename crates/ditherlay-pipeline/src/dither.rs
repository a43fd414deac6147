//! The dither engine: algorithm selection and dispatch.
//!
//! [`Algorithm`] names every selectable effect. The quantizing ones
//! (error diffusion, ordered, threshold) run through the [`Ditherer`]
//! trait on the dot-scaled working image. The two pattern renderers
//! replace the engine entirely and are driven by the pipeline with
//! their own parameters; see [`crate::halftone`] and [`crate::wavy`].
//!
//! # Strategy pattern
//!
//! Each quantizer family is its own type ([`DiffusionKernel`],
//! [`BayerSize`]) implementing [`Ditherer`], and [`Algorithm`] forwards
//! to whichever one is selected. Adding a kernel means adding a table,
//! not a new raster loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diffusion::DiffusionKernel;
use crate::ordered::BayerSize;
use crate::types::{DiffusionStrength, OrderedSpread, PipelineConfig, RgbaImage};

/// Parameters shared by every quantizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DitherParams {
    /// Quantization levels per channel, 2–256.
    pub levels: u16,
    /// Error scale for diffusion kernels.
    pub diffusion: DiffusionStrength,
    /// Threshold-offset scale for ordered dithering.
    pub spread: OrderedSpread,
    /// Cutoff for binary threshold mode.
    pub threshold: u8,
}

impl DitherParams {
    /// Read the quantizer parameters out of a configuration.
    ///
    /// `color_depth` of 1 would make the quantization step undefined, so
    /// it is raised to 2.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            levels: config.color_depth.clamp(2, 256),
            diffusion: config.diffusion_strength(),
            spread: config.ordered_spread(),
            threshold: config.threshold,
        }
    }
}

impl Default for DitherParams {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// A quantizer that rewrites R, G, B of an image in place.
pub trait Ditherer {
    /// Quantize `image` in place. Alpha must be left untouched.
    fn dither(&self, image: &mut RgbaImage, params: &DitherParams);
}

/// Every selectable effect.
///
/// Serialized as its configuration name (`"floyd-steinberg"`,
/// `"ordered-4x4"`, `"halftone-circles"`, ...). Unknown names deserialize
/// to [`PassThrough`](Self::PassThrough) with a warning rather than
/// failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    /// Raster-order error diffusion with the given weight table.
    ErrorDiffusion(DiffusionKernel),
    /// Bayer-matrix ordered dithering.
    Ordered(BayerSize),
    /// Binary cutoff on the channel mean.
    Threshold,
    /// Sine-perturbed ridge lines (pattern renderer).
    WavyLine,
    /// Gaussian-sampled halftone dots (pattern renderer).
    HalftoneCircles,
    /// No dithering; the tone-adjusted image is passed on unchanged.
    PassThrough,
}

impl Algorithm {
    /// Default selection.
    pub const DEFAULT: Self = Self::ErrorDiffusion(DiffusionKernel::FloydSteinberg);

    /// Every algorithm, in menu order.
    pub const ALL: [Self; 15] = [
        Self::ErrorDiffusion(DiffusionKernel::FloydSteinberg),
        Self::ErrorDiffusion(DiffusionKernel::JarvisJudiceNinke),
        Self::ErrorDiffusion(DiffusionKernel::Stucki),
        Self::ErrorDiffusion(DiffusionKernel::Sierra),
        Self::ErrorDiffusion(DiffusionKernel::Sierra3),
        Self::ErrorDiffusion(DiffusionKernel::SierraLite),
        Self::ErrorDiffusion(DiffusionKernel::Burkes),
        Self::ErrorDiffusion(DiffusionKernel::Atkinson),
        Self::Ordered(BayerSize::Two),
        Self::Ordered(BayerSize::Four),
        Self::Ordered(BayerSize::Eight),
        Self::Threshold,
        Self::WavyLine,
        Self::HalftoneCircles,
        Self::PassThrough,
    ];

    /// Configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ErrorDiffusion(kernel) => kernel.name(),
            Self::Ordered(size) => size.name(),
            Self::Threshold => "threshold",
            Self::WavyLine => "wavy-line",
            Self::HalftoneCircles => "halftone-circles",
            Self::PassThrough => "none",
        }
    }

    /// Look up an algorithm by configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    /// Whether this algorithm replaces the dither engine with a pattern
    /// renderer.
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::WavyLine | Self::HalftoneCircles)
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Algorithm {
    fn from(name: String) -> Self {
        Self::from_name(&name).unwrap_or_else(|| {
            tracing::warn!(%name, "unknown algorithm, passing image through");
            Self::PassThrough
        })
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.name().to_owned()
    }
}

impl Ditherer for Algorithm {
    /// Quantizers run; pattern renderers and pass-through leave the
    /// image as it is (the pipeline routes pattern renderers separately).
    fn dither(&self, image: &mut RgbaImage, params: &DitherParams) {
        match *self {
            Self::ErrorDiffusion(kernel) => kernel.dither(image, params),
            Self::Ordered(size) => size.dither(image, params),
            Self::Threshold => threshold(image, params.threshold),
            Self::WavyLine | Self::HalftoneCircles | Self::PassThrough => {}
        }
    }
}

/// Binary threshold: R, G, B all become 255 when `(r + g + b) / 3 > cutoff`,
/// otherwise 0.
///
/// Idempotent for a fixed cutoff.
pub fn threshold(image: &mut RgbaImage, cutoff: u8) {
    let cutoff = u16::from(cutoff) * 3;
    for pixel in image.pixels_mut() {
        let sum: u16 = pixel.0[..3].iter().map(|&c| u16::from(c)).sum();
        let bw = if sum > cutoff { 255 } else { 0 };
        pixel.0[..3].fill(bw);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(16, 4, |x, y| {
            let v = u8::try_from(x * 16 + y).unwrap_or(255);
            Rgba([v, v.wrapping_add(30), v / 2, 255])
        })
    }

    // --- Names ---

    #[test]
    fn names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(Algorithm::from_name(algorithm.name()), Some(algorithm));
        }
    }

    #[test]
    fn unknown_name_falls_back_to_pass_through() {
        assert_eq!(Algorithm::from(String::from("bogus")), Algorithm::PassThrough);
        assert_eq!(Algorithm::from_name("FLOYD-STEINBERG"), None);
    }

    #[test]
    fn default_is_floyd_steinberg() {
        assert_eq!(Algorithm::default().name(), "floyd-steinberg");
    }

    #[test]
    fn pattern_renderers_are_flagged() {
        let patterns: Vec<_> = Algorithm::ALL.into_iter().filter(|a| a.is_pattern()).collect();
        assert_eq!(patterns, vec![Algorithm::WavyLine, Algorithm::HalftoneCircles]);
    }

    #[test]
    fn serializes_as_name() {
        let json = serde_json::to_string(&Algorithm::Ordered(BayerSize::Eight)).unwrap();
        assert_eq!(json, r#""ordered-8x8""#);
    }

    // --- Params ---

    #[test]
    fn params_raise_single_level_to_two() {
        let config = PipelineConfig {
            color_depth: 1,
            ..PipelineConfig::default()
        };
        assert_eq!(DitherParams::from_config(&config).levels, 2);
    }

    // --- Threshold ---

    #[test]
    fn threshold_is_binary_and_uses_mean() {
        let mut img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([128, 128, 128, 10]),
            1 => Rgba([129, 128, 128, 10]),
            _ => Rgba([255, 0, 0, 10]),
        });
        threshold(&mut img, 128);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 10]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255, 10]);
        assert_eq!(img.get_pixel(2, 0).0, [0, 0, 0, 10]);
    }

    #[test]
    fn threshold_is_idempotent() {
        for cutoff in [0, 64, 128, 200, 255] {
            let mut once = gradient();
            threshold(&mut once, cutoff);
            let mut twice = once.clone();
            threshold(&mut twice, cutoff);
            assert_eq!(once, twice, "cutoff {cutoff}");
        }
    }

    #[test]
    fn threshold_ignores_depth_and_intensity() {
        let params_a = DitherParams {
            levels: 2,
            diffusion: DiffusionStrength(0.1),
            spread: OrderedSpread(0.1),
            threshold: 100,
        };
        let params_b = DitherParams {
            levels: 256,
            diffusion: DiffusionStrength(2.0),
            spread: OrderedSpread(2.0),
            threshold: 100,
        };
        let mut a = gradient();
        let mut b = gradient();
        Algorithm::Threshold.dither(&mut a, &params_a);
        Algorithm::Threshold.dither(&mut b, &params_b);
        assert_eq!(a, b);
    }

    // --- Dispatch ---

    #[test]
    fn pass_through_and_patterns_leave_image_unchanged() {
        for algorithm in [Algorithm::PassThrough, Algorithm::WavyLine, Algorithm::HalftoneCircles] {
            let mut img = gradient();
            algorithm.dither(&mut img, &DitherParams::default());
            assert_eq!(img, gradient());
        }
    }

    #[test]
    fn quantizers_limit_output_to_levels() {
        let params = DitherParams {
            levels: 2,
            ..DitherParams::default()
        };
        let quantizers = Algorithm::ALL
            .into_iter()
            .filter(|a| !a.is_pattern() && *a != Algorithm::PassThrough);
        for algorithm in quantizers {
            let mut img = gradient();
            algorithm.dither(&mut img, &params);
            assert!(
                img.pixels().all(|p| p.0[..3].iter().all(|&c| c == 0 || c == 255 || c == 128)),
                "{algorithm}"
            );
        }
    }
}
