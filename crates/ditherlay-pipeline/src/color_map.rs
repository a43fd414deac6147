//! Post-dither colour mapping.
//!
//! Each pixel's BT.709 luminance (rounded to an integer) indexes a
//! 256-entry [`ColorLookupTable`] built once per call from the palette
//! control points. RGB is replaced; alpha is kept.

use std::fmt;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::types::{HexColor, PipelineConfig, RgbaImage, to_channel};

/// Luminance-to-palette mode.
///
/// `FiveColor` and `Custom` are placeholders that reuse fixed three-point
/// interpolations; their tables are kept exactly as hosts already see
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TonalMapping {
    /// No remap.
    #[default]
    None,
    /// Black to highlight.
    SingleColor,
    /// Shadow → midtone → highlight at 0 / 85 / 170.
    ThreeColor,
    /// Shadow → midtone (half way) / midtone / midtone → highlight /
    /// highlight → white, at 0 / 64 / 128 / 192.
    FiveColor,
    /// Same table as [`ThreeColor`](Self::ThreeColor).
    Custom,
}

impl TonalMapping {
    /// Configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SingleColor => "singleColor",
            Self::ThreeColor => "3color",
            Self::FiveColor => "5color",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TonalMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for TonalMapping {
    fn from(name: String) -> Self {
        match name.as_str() {
            "none" => Self::None,
            "singleColor" => Self::SingleColor,
            "3color" => Self::ThreeColor,
            "5color" => Self::FiveColor,
            "custom" => Self::Custom,
            _ => {
                tracing::warn!(%name, "unknown tonal mapping, leaving colours unmapped");
                Self::None
            }
        }
    }
}

impl From<TonalMapping> for String {
    fn from(mode: TonalMapping) -> Self {
        mode.name().to_owned()
    }
}

/// The three palette control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Dark end.
    pub shadow: HexColor,
    /// Middle.
    pub midtone: HexColor,
    /// Bright end.
    pub highlight: HexColor,
}

impl Palette {
    /// Read the palette out of a configuration.
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            shadow: config.shadow_color,
            midtone: config.midtone_color,
            highlight: config.highlight_color,
        }
    }
}

/// Linear interpolation between two colours, rounded per channel.
///
/// `position` is clamped to 0–1.
#[must_use]
pub fn interpolate(from: HexColor, to: HexColor, position: f32) -> Rgb<u8> {
    let t = position.clamp(0.0, 1.0);
    let (a, b) = (from.to_f32(), to.to_f32());
    Rgb(std::array::from_fn(|i| to_channel((b[i] - a[i]).mul_add(t, a[i]))))
}

/// BT.709 luminance rounded to an integer, 0–255.
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    to_channel(0.2126f32.mul_add(
        f32::from(r),
        0.7152f32.mul_add(f32::from(g), 0.0722 * f32::from(b)),
    ))
}

/// Luminance → RGB table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorLookupTable([Rgb<u8>; 256]);

impl ColorLookupTable {
    /// Build the table for `mode`, or `None` for [`TonalMapping::None`].
    #[must_use]
    pub fn build(mode: TonalMapping, palette: &Palette) -> Option<Self> {
        let entry: fn(u8, &Palette) -> Rgb<u8> = match mode {
            TonalMapping::None => return None,
            TonalMapping::SingleColor => single_color,
            TonalMapping::ThreeColor | TonalMapping::Custom => three_color,
            TonalMapping::FiveColor => five_color,
        };
        Some(Self(std::array::from_fn(|lum| {
            entry(u8::try_from(lum).unwrap_or(u8::MAX), palette)
        })))
    }

    /// Colour for a luminance value.
    #[must_use]
    pub const fn get(&self, lum: u8) -> Rgb<u8> {
        self.0[lum as usize]
    }

    /// Replace the RGB of every pixel in `image` by its table entry.
    pub fn apply(&self, image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            let Rgb(mapped) = self.get(luminance(r, g, b));
            pixel.0[..3].copy_from_slice(&mapped);
        }
    }
}

fn single_color(lum: u8, p: &Palette) -> Rgb<u8> {
    interpolate(HexColor::BLACK, p.highlight, f32::from(lum) / 255.0)
}

fn three_color(lum: u8, p: &Palette) -> Rgb<u8> {
    let l = f32::from(lum);
    match lum {
        0..85 => interpolate(p.shadow, p.midtone, l / 85.0),
        85..170 => interpolate(p.midtone, p.highlight, (l - 85.0) / 85.0),
        _ => interpolate(p.highlight, p.highlight, (l - 170.0) / 85.0),
    }
}

fn five_color(lum: u8, p: &Palette) -> Rgb<u8> {
    let l = f32::from(lum);
    match lum {
        0..64 => interpolate(p.shadow, p.midtone, l / 64.0 * 0.5),
        64..128 => interpolate(p.midtone, p.midtone, ((l - 64.0) / 64.0).mul_add(0.5, 0.5)),
        128..192 => interpolate(p.midtone, p.highlight, (l - 128.0) / 64.0),
        _ => interpolate(p.highlight, HexColor::WHITE, (l - 192.0) / 64.0),
    }
}

/// Remap `image` in place according to `mode`.
///
/// Returns whether anything was applied.
pub fn map_colors(image: &mut RgbaImage, mode: TonalMapping, palette: &Palette) -> bool {
    let Some(table) = ColorLookupTable::build(mode, palette) else {
        return false;
    };
    table.apply(image);
    tracing::debug!(%mode, "colours mapped");
    true
}
