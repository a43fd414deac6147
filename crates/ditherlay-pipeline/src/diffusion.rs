//! Error-diffusion dithering.
//!
//! One raster-order driver ([`diffuse`]) serves every kernel. A kernel
//! is only a weight table; see [`DiffusionKernel`] for the available
//! tables.
//!
//! # Algorithm
//!
//! Pixels are visited left-to-right, top-to-bottom. For each pixel and
//! each of R, G, B:
//!
//! 1. `v = clamp(source + accumulated_error, 0, 255)`
//! 2. `q = round(v / 255 * (levels - 1)) / (levels - 1) * 255`
//! 3. `error = (v - q) * strength`
//! 4. every kernel entry `(dx, dy, w)` whose target is in bounds
//!    receives `error * w / divisor`
//!
//! Out-of-bounds targets are dropped: no wraparound, no reflection.
//! The accumulators live for a single pass.
//!
//! The raster dependency means a pass must not be split across threads.

use crate::dither::{DitherParams, Ditherer};
use crate::types::{RgbaImage, to_channel};

/// A diffusion weight table.
///
/// Each neighbour at `(dx, dy)` receives `error * weight / divisor`.
/// `dy` is never negative and `dx` is positive when `dy == 0`, so only
/// unvisited pixels are touched.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    /// `(dx, dy, weight)` entries.
    pub entries: &'static [(i32, i32, u8)],
    /// Common denominator of the weights.
    pub divisor: u8,
}

impl Kernel {
    /// Fraction of the error this kernel passes on (`sum(weights) / divisor`).
    #[must_use]
    pub fn propagation(&self) -> f32 {
        let total: u32 = self.entries.iter().map(|&(_, _, w)| u32::from(w)).sum();
        #[allow(clippy::cast_precision_loss)]
        let total = total as f32;
        total / f32::from(self.divisor)
    }
}

/// ```text
///        X   7
///    3   5   1      (/16)
/// ```
pub const FLOYD_STEINBERG: Kernel = Kernel {
    entries: &[(1, 0, 7), (-1, 1, 3), (0, 1, 5), (1, 1, 1)],
    divisor: 16,
};

/// ```text
///            X   7   5
///    3   5   7   5   3
///    1   3   5   3   1      (/48)
/// ```
pub const JARVIS_JUDICE_NINKE: Kernel = Kernel {
    entries: &[
        (1, 0, 7),
        (2, 0, 5),
        (-2, 1, 3),
        (-1, 1, 5),
        (0, 1, 7),
        (1, 1, 5),
        (2, 1, 3),
        (-2, 2, 1),
        (-1, 2, 3),
        (0, 2, 5),
        (1, 2, 3),
        (2, 2, 1),
    ],
    divisor: 48,
};

/// ```text
///            X   8   4
///    2   4   8   4   2
///    1   2   4   2   1      (/42)
/// ```
pub const STUCKI: Kernel = Kernel {
    entries: &[
        (1, 0, 8),
        (2, 0, 4),
        (-2, 1, 2),
        (-1, 1, 4),
        (0, 1, 8),
        (1, 1, 4),
        (2, 1, 2),
        (-2, 2, 1),
        (-1, 2, 2),
        (0, 2, 4),
        (1, 2, 2),
        (2, 2, 1),
    ],
    divisor: 42,
};

/// Two-row Sierra, the table selected by the `sierra` algorithm name.
///
/// ```text
///            X   4   3
///    1   2   3   2   1      (/16)
/// ```
pub const SIERRA: Kernel = Kernel {
    entries: &[
        (1, 0, 4),
        (2, 0, 3),
        (-2, 1, 1),
        (-1, 1, 2),
        (0, 1, 3),
        (1, 1, 2),
        (2, 1, 1),
    ],
    divisor: 16,
};

/// Full three-row Sierra.
///
/// ```text
///            X   5   3
///    2   4   5   4   2
///        2   3   2          (/32)
/// ```
pub const SIERRA_3: Kernel = Kernel {
    entries: &[
        (1, 0, 5),
        (2, 0, 3),
        (-2, 1, 2),
        (-1, 1, 4),
        (0, 1, 5),
        (1, 1, 4),
        (2, 1, 2),
        (-1, 2, 2),
        (0, 2, 3),
        (1, 2, 2),
    ],
    divisor: 32,
};

/// ```text
///    X   2
///    1   1          (/4)
/// ```
pub const SIERRA_LITE: Kernel = Kernel {
    entries: &[(1, 0, 2), (-1, 1, 1), (0, 1, 1)],
    divisor: 4,
};

/// ```text
///            X   8   4
///    2   4   8   4   2      (/32)
/// ```
pub const BURKES: Kernel = Kernel {
    entries: &[
        (1, 0, 8),
        (2, 0, 4),
        (-2, 1, 2),
        (-1, 1, 4),
        (0, 1, 8),
        (1, 1, 4),
        (2, 1, 2),
    ],
    divisor: 32,
};

/// Atkinson passes on 6/8 of the error.
///
/// ```text
///        X   1   1
///    1   1   1
///    1              (/8)
/// ```
pub const ATKINSON: Kernel = Kernel {
    entries: &[
        (1, 0, 1),
        (2, 0, 1),
        (-1, 1, 1),
        (0, 1, 1),
        (1, 1, 1),
        (-1, 2, 1),
    ],
    divisor: 8,
};

/// Selects an error-diffusion weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiffusionKernel {
    /// Floyd-Steinberg (4 neighbours, /16).
    #[default]
    FloydSteinberg,
    /// Jarvis-Judice-Ninke (12 neighbours, /48).
    JarvisJudiceNinke,
    /// Stucki (12 neighbours, /42).
    Stucki,
    /// Two-row Sierra (7 neighbours, /16).
    Sierra,
    /// Three-row Sierra (10 neighbours, /32).
    Sierra3,
    /// Sierra Lite (3 neighbours, /4).
    SierraLite,
    /// Burkes (7 neighbours, /32).
    Burkes,
    /// Atkinson (6 neighbours, /8, 75% propagation).
    Atkinson,
}

impl DiffusionKernel {
    /// Every kernel, in menu order.
    pub const ALL: [Self; 8] = [
        Self::FloydSteinberg,
        Self::JarvisJudiceNinke,
        Self::Stucki,
        Self::Sierra,
        Self::Sierra3,
        Self::SierraLite,
        Self::Burkes,
        Self::Atkinson,
    ];

    /// The weight table for this kernel.
    #[must_use]
    pub const fn kernel(self) -> &'static Kernel {
        match self {
            Self::FloydSteinberg => &FLOYD_STEINBERG,
            Self::JarvisJudiceNinke => &JARVIS_JUDICE_NINKE,
            Self::Stucki => &STUCKI,
            Self::Sierra => &SIERRA,
            Self::Sierra3 => &SIERRA_3,
            Self::SierraLite => &SIERRA_LITE,
            Self::Burkes => &BURKES,
            Self::Atkinson => &ATKINSON,
        }
    }

    /// Configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FloydSteinberg => "floyd-steinberg",
            Self::JarvisJudiceNinke => "jarvis-judice-ninke",
            Self::Stucki => "stucki",
            Self::Sierra => "sierra",
            Self::Sierra3 => "sierra-3",
            Self::SierraLite => "sierra-lite",
            Self::Burkes => "burkes",
            Self::Atkinson => "atkinson",
        }
    }
}

impl Ditherer for DiffusionKernel {
    fn dither(&self, image: &mut RgbaImage, params: &DitherParams) {
        diffuse(image, self.kernel(), params.levels, params.diffusion.0);
    }
}

/// Snap `value` (0–255) to the nearest of `levels` evenly spaced steps.
///
/// `levels` below 2 is treated as 2.
#[must_use]
pub fn quantize(value: f32, levels: u16) -> f32 {
    let steps = f32::from(levels.max(2) - 1);
    (value / 255.0 * steps).round() / steps * 255.0
}

/// Error-diffuse `image` in place with `kernel`.
///
/// `strength` scales the error before it is distributed (1.0 passes on
/// the full error). Alpha is untouched.
pub fn diffuse(image: &mut RgbaImage, kernel: &Kernel, levels: u16, strength: f32) {
    let (w, h) = image.dimensions();
    let (wi, hi) = (i64::from(w), i64::from(h));
    let width = w as usize;
    let mut errors: [Vec<f32>; 3] = std::array::from_fn(|_| vec![0.0; width * h as usize]);
    let divisor = f32::from(kernel.divisor);

    for y in 0..h {
        for x in 0..w {
            let index = y as usize * width + x as usize;
            let pixel = image.get_pixel_mut(x, y);
            for (c, err) in errors.iter_mut().enumerate() {
                let value = (f32::from(pixel.0[c]) + err[index]).clamp(0.0, 255.0);
                let quantized = quantize(value, levels);
                pixel.0[c] = to_channel(quantized);

                let error = (value - quantized) * strength;
                for &(dx, dy, weight) in kernel.entries {
                    let (nx, ny) = (i64::from(x) + i64::from(dx), i64::from(y) + i64::from(dy));
                    if nx < 0 || nx >= wi || ny >= hi {
                        continue;
                    }
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let target = ny as usize * width + nx as usize;
                    err[target] += error * f32::from(weight) / divisor;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss, clippy::float_cmp)]
mod tests {
    use image::Rgba;

    use super::*;

    fn grey(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    fn mean_red(img: &RgbaImage) -> f32 {
        let total: u32 = img.pixels().map(|p| u32::from(p.0[0])).sum();
        total as f32 / (img.width() * img.height()) as f32
    }

    // --- Kernel tables ---

    #[test]
    fn full_kernels_propagate_all_error() {
        for kind in DiffusionKernel::ALL {
            let expected = if kind == DiffusionKernel::Atkinson { 0.75 } else { 1.0 };
            assert!(
                (kind.kernel().propagation() - expected).abs() < 1e-6,
                "{}",
                kind.name()
            );
        }
    }

    #[test]
    fn kernels_only_reach_unvisited_pixels() {
        for kind in DiffusionKernel::ALL {
            for &(dx, dy, _) in kind.kernel().entries {
                assert!(dy > 0 || (dy == 0 && dx > 0), "{}: ({dx}, {dy})", kind.name());
            }
        }
    }

    // --- Quantization ---

    #[test]
    fn quantize_snaps_to_nearest_level() {
        assert_eq!(quantize(0.0, 2), 0.0);
        assert_eq!(quantize(127.0, 2), 0.0);
        assert_eq!(quantize(128.0, 2), 255.0);
        assert_eq!(quantize(100.0, 3), 127.5);
        assert!((quantize(200.0, 256) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn quantize_treats_one_level_as_two() {
        assert_eq!(quantize(200.0, 1), quantize(200.0, 2));
    }

    // --- Driver ---

    #[test]
    fn floyd_steinberg_mid_grey_averages_to_input() {
        let mut img = grey(32, 32, 128);
        diffuse(&mut img, &FLOYD_STEINBERG, 2, 1.0);
        assert!(img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        let mean = mean_red(&img);
        assert!((mean - 128.0).abs() < 6.0, "mean {mean}");
    }

    #[test]
    fn floyd_steinberg_mid_grey_alternates() {
        let mut img = grey(8, 8, 128);
        diffuse(&mut img, &FLOYD_STEINBERG, 2, 1.0);
        // First row: 128 -> 255 (error -127), next pixel 128 - 55.6 -> 0, ...
        let row: Vec<u8> = (0..4).map(|x| img.get_pixel(x, 0).0[0]).collect();
        assert_eq!(row, vec![255, 0, 255, 0]);
    }

    #[test]
    fn zero_strength_is_plain_quantization() {
        let mut img = grey(4, 4, 100);
        diffuse(&mut img, &JARVIS_JUDICE_NINKE, 2, 0.0);
        assert!(img.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn exact_levels_produce_no_error() {
        let mut img = grey(5, 5, 255);
        let before = img.clone();
        diffuse(&mut img, &STUCKI, 4, 1.0);
        assert_eq!(img, before);
    }

    #[test]
    fn alpha_is_untouched() {
        let mut img = RgbaImage::from_pixel(6, 6, Rgba([90, 160, 30, 77]));
        diffuse(&mut img, &BURKES, 2, 1.0);
        assert!(img.pixels().all(|p| p.0[3] == 77));
    }

    #[test]
    fn channels_diffuse_independently() {
        let mut img = RgbaImage::from_pixel(6, 6, Rgba([0, 128, 255, 255]));
        diffuse(&mut img, &SIERRA, 2, 1.0);
        assert!(img.pixels().all(|p| p.0[0] == 0 && p.0[2] == 255));
        assert!(img.pixels().any(|p| p.0[1] == 0));
        assert!(img.pixels().any(|p| p.0[1] == 255));
    }

    #[test]
    fn single_pixel_image_does_not_reach_out_of_bounds() {
        for kind in DiffusionKernel::ALL {
            let mut img = grey(1, 1, 200);
            diffuse(&mut img, kind.kernel(), 2, 2.0);
            assert_eq!(img.get_pixel(0, 0).0[0], 255);
        }
    }

    #[test]
    fn every_kernel_keeps_mean_close_on_large_grey() {
        for kind in DiffusionKernel::ALL {
            if kind == DiffusionKernel::Atkinson {
                continue;
            }
            let mut img = grey(48, 48, 64);
            diffuse(&mut img, kind.kernel(), 2, 1.0);
            let mean = mean_red(&img);
            assert!((mean - 64.0).abs() < 8.0, "{}: mean {mean}", kind.name());
        }
    }

    #[test]
    fn ditherer_impl_uses_kernel_table() {
        let params = DitherParams {
            levels: 2,
            ..DitherParams::default()
        };
        let mut a = grey(10, 10, 90);
        let mut b = a.clone();
        DiffusionKernel::Atkinson.dither(&mut a, &params);
        diffuse(&mut b, &ATKINSON, 2, 1.0);
        assert_eq!(a, b);
    }
}
