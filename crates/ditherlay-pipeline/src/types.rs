//! Shared types for the ditherlay pixel pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color_map::TonalMapping;
use crate::dither::Algorithm;
use crate::halftone::HalftoneColorMode;
use crate::wavy::WavyLineColorMode;

/// Re-export `RgbaImage` so downstream crates can hand pixel buffers
/// to the pipeline without depending on `image` directly.
///
/// This is the pipeline's pixel buffer: 4 samples per pixel (R, G, B, A),
/// row-major, `width * height * 4` bytes.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Number of pixels covered.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Dimensions of an existing image.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Wrap a raw RGBA buffer as an [`RgbaImage`], checking its length.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] when
/// `pixels.len() != width * height * 4`.
pub fn image_from_raw(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
) -> Result<RgbaImage, PipelineError> {
    let expected = expected_len(width, height);
    let actual = pixels.len();
    if expected != Some(actual) {
        return Err(PipelineError::InvalidDimensions {
            width,
            height,
            expected: expected.unwrap_or(usize::MAX),
            actual,
        });
    }
    RgbaImage::from_raw(width, height, pixels).ok_or(PipelineError::InvalidDimensions {
        width,
        height,
        expected: expected.unwrap_or(usize::MAX),
        actual,
    })
}

/// `width * height * 4`, or `None` on overflow.
fn expected_len(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(4)
}

/// Round and clamp a floating-point sample into a `u8` channel value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_channel(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// An sRGB colour given as a `#rrggbb` hex string in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub [u8; 3]);

impl HexColor {
    /// Pure black.
    pub const BLACK: Self = Self([0, 0, 0]);
    /// Mid grey (`#808080`).
    pub const GREY: Self = Self([0x80, 0x80, 0x80]);
    /// Pure white.
    pub const WHITE: Self = Self([255, 255, 255]);

    /// Parse `#rrggbb` (the `#` is optional, hex digits are case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for anything that is not
    /// exactly six hex digits.
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let digits = text.trim().trim_start_matches('#');
        let mut rgb = [0u8; 3];
        hex::decode_to_slice(digits, &mut rgb).map_err(|e| {
            PipelineError::InvalidConfig(format!("invalid hex colour '{text}': {e}"))
        })?;
        Ok(Self(rgb))
    }

    /// Channels as floats, for interpolation.
    #[must_use]
    pub fn to_f32(self) -> [f32; 3] {
        self.0.map(f32::from)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for HexColor {
    type Err = PipelineError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl TryFrom<String> for HexColor {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

/// Fraction of each quantization error carried to unvisited neighbours
/// by the error-diffusion kernels (`ditherIntensity / 100`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionStrength(pub f32);

/// Scale applied to the `threshold - 128` offset in ordered dithering
/// (`ditherIntensity / 100`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedSpread(pub f32);

/// Multiplier from mean channel change to overlay alpha
/// (`ditherIntensity / 100`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayOpacity(pub f32);

/// Strength of a pattern renderer: dot radius scale for halftone, ridge
/// opacity for wavy lines (`ditherIntensity / 100`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternScale(pub f32);

/// Configuration for one pipeline invocation.
///
/// Field names serialize in camelCase so a host can send the same JSON
/// object its UI builds. Every field is optional on input; missing fields
/// take the `DEFAULT_*` value.
///
/// Values are not validated on construction. The pipeline runs on
/// [`clamped`](Self::clamped), which pulls each field back into its
/// accepted range instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Dither kernel or pattern renderer.
    pub algorithm: Algorithm,

    /// Quantization levels per channel (1–256). Not bits: 3-bit depth is 8.
    #[serde(deserialize_with = "lenient::color_depth")]
    pub color_depth: u16,

    /// Effect intensity in percent (0–200).
    pub dither_intensity: f32,

    /// Dot-scale factor: dither at `1/dot_size` resolution, then enlarge.
    #[serde(deserialize_with = "lenient::at_least_one")]
    pub dot_size: u32,

    /// Brightness shift (-100..100).
    pub brightness: f32,

    /// Contrast adjustment (-100..100).
    pub contrast: f32,

    /// Uniform noise magnitude (0–100).
    pub noise: f32,

    /// Neighbour-average denoise strength (0–100, saturates at 10).
    pub denoise: f32,

    /// Four-neighbour blur radius (0–100, effective cap 3).
    pub blur: f32,

    /// Unsharp-mask strength (0–100).
    pub sharpen_strength: f32,

    /// Blur radius used to build the unsharp mask (>= 1).
    #[serde(deserialize_with = "lenient::at_least_one")]
    pub sharpen_radius: u32,

    /// Binary cutoff for the threshold algorithm.
    #[serde(deserialize_with = "lenient::threshold")]
    pub threshold: u8,

    /// Post-dither luminance-to-palette remap.
    pub tonal_mapping_type: TonalMapping,

    /// Palette control point for luminance 0.
    pub shadow_color: HexColor,

    /// Palette control point for the middle breakpoint(s).
    pub midtone_color: HexColor,

    /// Palette control point for the bright end.
    pub highlight_color: HexColor,

    /// Base spacing between wavy ridge lines, in pixels.
    pub ridge_spacing: f32,

    /// Sine perturbation amplitude of each ridge line.
    pub wave_amplitude: f32,

    /// Ridge colour ramp.
    pub wavy_line_color_mode: WavyLineColorMode,

    /// Distance between halftone grid points, in pixels.
    pub halftone_grid_spacing: f32,

    /// Dot radius for pure white, in pixels.
    pub halftone_min_dot: f32,

    /// Dot radius for pure black, in pixels.
    pub halftone_max_dot: f32,

    /// Dot colouring mode.
    pub halftone_color_mode: HalftoneColorMode,

    /// Resolution the host should fetch the source at; 72 is 1:1.
    pub input_dpi: f32,

    /// Seed for the noise stage. `None` draws from OS entropy.
    pub noise_seed: Option<u64>,
}

impl PipelineConfig {
    /// Default algorithm.
    pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::DEFAULT;
    /// Default quantization levels.
    pub const DEFAULT_COLOR_DEPTH: u16 = 3;
    /// Default intensity percentage.
    pub const DEFAULT_DITHER_INTENSITY: f32 = 100.0;
    /// Default dot-scale factor (no rescaling).
    pub const DEFAULT_DOT_SIZE: u32 = 1;
    /// Default sharpen radius.
    pub const DEFAULT_SHARPEN_RADIUS: u32 = 1;
    /// Default binary threshold.
    pub const DEFAULT_THRESHOLD: u8 = 128;
    /// Default ridge spacing.
    pub const DEFAULT_RIDGE_SPACING: f32 = 3.0;
    /// Default wave amplitude.
    pub const DEFAULT_WAVE_AMPLITUDE: f32 = 1.2;
    /// Default halftone grid spacing.
    pub const DEFAULT_HALFTONE_GRID_SPACING: f32 = 8.0;
    /// Default minimum halftone dot radius.
    pub const DEFAULT_HALFTONE_MIN_DOT: f32 = 0.5;
    /// Default maximum halftone dot radius.
    pub const DEFAULT_HALFTONE_MAX_DOT: f32 = 8.0;
    /// Default source resolution (1:1).
    pub const DEFAULT_INPUT_DPI: f32 = 72.0;

    /// A copy with every numeric field pulled into its accepted range.
    ///
    /// Non-finite floats fall back to the field default.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let min_dot = clamp_finite(
            self.halftone_min_dot,
            0.0,
            f32::MAX,
            Self::DEFAULT_HALFTONE_MIN_DOT,
        );
        let clamped = Self {
            algorithm: self.algorithm,
            color_depth: self.color_depth.clamp(1, 256),
            dither_intensity: clamp_finite(
                self.dither_intensity,
                0.0,
                200.0,
                Self::DEFAULT_DITHER_INTENSITY,
            ),
            dot_size: self.dot_size.max(1),
            brightness: clamp_finite(self.brightness, -100.0, 100.0, 0.0),
            contrast: clamp_finite(self.contrast, -100.0, 100.0, 0.0),
            noise: clamp_finite(self.noise, 0.0, 100.0, 0.0),
            denoise: clamp_finite(self.denoise, 0.0, 100.0, 0.0),
            blur: clamp_finite(self.blur, 0.0, 100.0, 0.0),
            sharpen_strength: clamp_finite(self.sharpen_strength, 0.0, 100.0, 0.0),
            sharpen_radius: self.sharpen_radius.max(1),
            threshold: self.threshold,
            tonal_mapping_type: self.tonal_mapping_type,
            shadow_color: self.shadow_color,
            midtone_color: self.midtone_color,
            highlight_color: self.highlight_color,
            ridge_spacing: clamp_finite(
                self.ridge_spacing,
                1.0,
                f32::MAX,
                Self::DEFAULT_RIDGE_SPACING,
            ),
            wave_amplitude: clamp_finite(
                self.wave_amplitude,
                0.0,
                f32::MAX,
                Self::DEFAULT_WAVE_AMPLITUDE,
            ),
            wavy_line_color_mode: self.wavy_line_color_mode,
            halftone_grid_spacing: clamp_finite(
                self.halftone_grid_spacing,
                1.0,
                f32::MAX,
                Self::DEFAULT_HALFTONE_GRID_SPACING,
            ),
            halftone_min_dot: min_dot,
            halftone_max_dot: clamp_finite(
                self.halftone_max_dot,
                min_dot,
                f32::MAX,
                Self::DEFAULT_HALFTONE_MAX_DOT.max(min_dot),
            ),
            halftone_color_mode: self.halftone_color_mode,
            input_dpi: clamp_finite(self.input_dpi, 1.0, f32::MAX, Self::DEFAULT_INPUT_DPI),
            noise_seed: self.noise_seed,
        };
        if clamped != *self {
            tracing::warn!("configuration values outside their ranges were clamped");
        }
        clamped
    }

    /// Error-diffusion reading of `dither_intensity`.
    #[must_use]
    pub fn diffusion_strength(&self) -> DiffusionStrength {
        DiffusionStrength(self.dither_intensity / 100.0)
    }

    /// Ordered-dither reading of `dither_intensity`.
    #[must_use]
    pub fn ordered_spread(&self) -> OrderedSpread {
        OrderedSpread(self.dither_intensity / 100.0)
    }

    /// Overlay-compositor reading of `dither_intensity`.
    #[must_use]
    pub fn overlay_opacity(&self) -> OverlayOpacity {
        OverlayOpacity(self.dither_intensity / 100.0)
    }

    /// Pattern-renderer reading of `dither_intensity`.
    #[must_use]
    pub fn pattern_scale(&self) -> PatternScale {
        PatternScale(self.dither_intensity / 100.0)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            algorithm: Self::DEFAULT_ALGORITHM,
            color_depth: Self::DEFAULT_COLOR_DEPTH,
            dither_intensity: Self::DEFAULT_DITHER_INTENSITY,
            dot_size: Self::DEFAULT_DOT_SIZE,
            brightness: 0.0,
            contrast: 0.0,
            noise: 0.0,
            denoise: 0.0,
            blur: 0.0,
            sharpen_strength: 0.0,
            sharpen_radius: Self::DEFAULT_SHARPEN_RADIUS,
            threshold: Self::DEFAULT_THRESHOLD,
            tonal_mapping_type: TonalMapping::default(),
            shadow_color: HexColor::BLACK,
            midtone_color: HexColor::GREY,
            highlight_color: HexColor::WHITE,
            ridge_spacing: Self::DEFAULT_RIDGE_SPACING,
            wave_amplitude: Self::DEFAULT_WAVE_AMPLITUDE,
            wavy_line_color_mode: WavyLineColorMode::default(),
            halftone_grid_spacing: Self::DEFAULT_HALFTONE_GRID_SPACING,
            halftone_min_dot: Self::DEFAULT_HALFTONE_MIN_DOT,
            halftone_max_dot: Self::DEFAULT_HALFTONE_MAX_DOT,
            halftone_color_mode: HalftoneColorMode::default(),
            input_dpi: Self::DEFAULT_INPUT_DPI,
            noise_seed: None,
        }
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Integer fields read from any JSON number.
///
/// Hosts send plain JS numbers, so `2.5` or `300` arrive here. They are
/// rounded and clamped into the field's range rather than failing the
/// whole configuration.
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[allow(clippy::float_cmp)]
    fn number<'de, D: Deserializer<'de>>(
        deserializer: D,
        min: f64,
        max: f64,
    ) -> Result<f64, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        let value = if raw.is_finite() { raw.round().clamp(min, max) } else { min };
        if value != raw {
            tracing::warn!(raw, value, "integer configuration value clamped");
        }
        Ok(value)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn color_depth<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        number(deserializer, 1.0, 256.0).map(|v| v as u16)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn at_least_one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        number(deserializer, 1.0, f64::from(u32::MAX)).map(|v| v as u32)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn threshold<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        number(deserializer, 0.0, 255.0).map(|v| v as u8)
    }
}

/// Result of running the pipeline with all intermediate buffers preserved.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The caller's pixels, untouched.
    pub original: RgbaImage,
    /// After brightness/contrast/blur/noise/denoise/sharpen.
    pub adjusted: RgbaImage,
    /// After dot-scale + dither, or the pattern renderer's output.
    pub dithered: RgbaImage,
    /// After the colour mapper.
    pub mapped: RgbaImage,
    /// Final buffer handed back to the host.
    pub output: RgbaImage,
    /// Image dimensions (identical for every buffer above).
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Buffer length does not match `width * height * 4`.
    #[error("pixel buffer is {actual} bytes but {width}x{height} RGBA needs {expected}")]
    InvalidDimensions {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Required byte count.
        expected: usize,
        /// Supplied byte count.
        actual: usize,
    },

    /// Pipeline configuration could not be read.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`, so errors can cross the
/// worker boundary as JSON.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    InvalidDimensions {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidDimensions {
                width,
                height,
                expected,
                actual,
            } => PipelineErrorProxy::InvalidDimensions {
                width: *width,
                height: *height,
                expected: *expected,
                actual: *actual,
            },
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::InvalidDimensions {
                width,
                height,
                expected,
                actual,
            } => Self::InvalidDimensions {
                width,
                height,
                expected,
                actual,
            },
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diffusion::DiffusionKernel;

    // --- Buffer validation ---

    #[test]
    fn image_from_raw_accepts_exact_length() {
        let img = image_from_raw(vec![0; 3 * 2 * 4], 3, 2).unwrap();
        assert_eq!(Dimensions::of(&img), Dimensions { width: 3, height: 2 });
    }

    #[test]
    fn image_from_raw_rejects_short_buffer() {
        let err = image_from_raw(vec![0; 10], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidDimensions {
                expected: 16,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn image_from_raw_rejects_long_buffer() {
        let result = image_from_raw(vec![0; 20], 2, 2);
        assert!(matches!(result, Err(PipelineError::InvalidDimensions { .. })));
    }

    #[test]
    fn to_channel_rounds_and_clamps() {
        assert_eq!(to_channel(-12.0), 0);
        assert_eq!(to_channel(300.0), 255);
        assert_eq!(to_channel(127.5), 128);
        assert_eq!(to_channel(f32::NAN), 0);
    }

    // --- HexColor ---

    #[test]
    fn hex_color_parses_with_and_without_hash() {
        assert_eq!(HexColor::parse("#FF0080").unwrap(), HexColor([255, 0, 128]));
        assert_eq!(HexColor::parse("ff0080").unwrap(), HexColor([255, 0, 128]));
    }

    #[test]
    fn hex_color_rejects_garbage() {
        assert!(HexColor::parse("#12345").is_err());
        assert!(HexColor::parse("#zzzzzz").is_err());
    }

    #[test]
    fn hex_color_displays_lowercase_with_hash() {
        assert_eq!(HexColor([0xAB, 0x01, 0xFF]).to_string(), "#ab01ff");
    }

    // --- PipelineConfig ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.algorithm,
            Algorithm::ErrorDiffusion(DiffusionKernel::FloydSteinberg)
        );
        assert_eq!(config.color_depth, 3);
        assert!((config.dither_intensity - 100.0).abs() < f32::EPSILON);
        assert_eq!(config.dot_size, 1);
        assert_eq!(config.threshold, 128);
        assert_eq!(config.tonal_mapping_type, TonalMapping::None);
        assert_eq!(config.highlight_color, HexColor::WHITE);
        assert!(config.noise_seed.is_none());
    }

    #[test]
    fn clamped_pulls_values_into_range() {
        let config = PipelineConfig {
            color_depth: 0,
            dither_intensity: 500.0,
            dot_size: 0,
            brightness: -300.0,
            sharpen_radius: 0,
            halftone_min_dot: 4.0,
            halftone_max_dot: 2.0,
            ridge_spacing: f32::NAN,
            ..PipelineConfig::default()
        };
        let clamped = config.clamped();
        assert_eq!(clamped.color_depth, 1);
        assert!((clamped.dither_intensity - 200.0).abs() < f32::EPSILON);
        assert_eq!(clamped.dot_size, 1);
        assert!((clamped.brightness + 100.0).abs() < f32::EPSILON);
        assert_eq!(clamped.sharpen_radius, 1);
        assert!((clamped.halftone_max_dot - 4.0).abs() < f32::EPSILON);
        assert!((clamped.ridge_spacing - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn clamped_leaves_valid_config_alone() {
        let config = PipelineConfig::default();
        assert_eq!(config.clamped(), config);
    }

    #[test]
    fn intensity_readings_are_independent_newtypes() {
        let config = PipelineConfig {
            dither_intensity: 150.0,
            ..PipelineConfig::default()
        };
        assert!((config.diffusion_strength().0 - 1.5).abs() < f32::EPSILON);
        assert!((config.ordered_spread().0 - 1.5).abs() < f32::EPSILON);
        assert!((config.overlay_opacity().0 - 1.5).abs() < f32::EPSILON);
        assert!((config.pattern_scale().0 - 1.5).abs() < f32::EPSILON);
    }

    // --- Serde ---

    #[test]
    fn config_reads_host_json_with_missing_fields() {
        let json = r##"{
            "algorithm": "atkinson",
            "colorDepth": 4,
            "ditherIntensity": 80,
            "tonalMappingType": "3color",
            "highlightColor": "#FF0000"
        }"##;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.algorithm,
            Algorithm::ErrorDiffusion(DiffusionKernel::Atkinson)
        );
        assert_eq!(config.color_depth, 4);
        assert_eq!(config.tonal_mapping_type, TonalMapping::ThreeColor);
        assert_eq!(config.highlight_color, HexColor([255, 0, 0]));
        assert_eq!(config.dot_size, PipelineConfig::DEFAULT_DOT_SIZE);
    }

    #[test]
    fn config_unknown_algorithm_falls_back_to_pass_through() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"algorithm": "voronoi-stipple"}"#).unwrap();
        assert_eq!(config.algorithm, Algorithm::PassThrough);
    }

    #[test]
    fn config_malformed_color_is_rejected() {
        let result: Result<PipelineConfig, _> =
            serde_json::from_str(r#"{"shadowColor": "black"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn pipeline_config_serde_round_trip() {
        let config = PipelineConfig {
            algorithm: Algorithm::HalftoneCircles,
            color_depth: 16,
            tonal_mapping_type: TonalMapping::FiveColor,
            midtone_color: HexColor([1, 2, 3]),
            noise_seed: Some(7),
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn error_invalid_dimensions_display() {
        let err = PipelineError::InvalidDimensions {
            width: 2,
            height: 2,
            expected: 16,
            actual: 10,
        };
        assert_eq!(
            err.to_string(),
            "pixel buffer is 10 bytes but 2x2 RGBA needs 16"
        );
    }

    #[test]
    fn integer_fields_clamp_instead_of_failing() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"threshold": 300, "colorDepth": -1, "dotSize": 2.5, "sharpenRadius": -3}"#,
        )
        .unwrap();
        assert_eq!(config.threshold, 255);
        assert_eq!(config.color_depth, 1);
        assert_eq!(config.dot_size, 3);
        assert_eq!(config.sharpen_radius, 1);

        let config: PipelineConfig =
            serde_json::from_str(r#"{"threshold": -1, "colorDepth": 300, "dotSize": 0}"#).unwrap();
        assert_eq!(config.threshold, 0);
        assert_eq!(config.color_depth, 256);
        assert_eq!(config.dot_size, 1);
    }

    #[test]
    fn integer_fields_still_reject_non_numbers() {
        let result = serde_json::from_str::<PipelineConfig>(r#"{"colorDepth": "lots"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::InvalidConfig("bad value".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(deserialized, PipelineError::InvalidConfig(ref s) if s == "bad value"));

        let err = PipelineError::InvalidDimensions {
            width: 1,
            height: 1,
            expected: 4,
            actual: 3,
        };
        let json = serde_json::to_string(&err).unwrap();
        let deserialized: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            deserialized,
            PipelineError::InvalidDimensions { actual: 3, .. }
        ));
    }
}
