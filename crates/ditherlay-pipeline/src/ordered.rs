//! Ordered (Bayer) dithering.
//!
//! Each pixel is offset by a tiled threshold matrix and snapped to a
//! fixed step. No pixel depends on any other, so the output for a
//! uniform input depends only on `(x % size, y % size)`.

use crate::dither::{DitherParams, Ditherer};
use crate::types::{RgbaImage, to_channel};

/// 2×2 Bayer index matrix.
pub const BAYER_2: [[u8; 2]; 2] = [[0, 2], [3, 1]];

/// 4×4 Bayer index matrix.
pub const BAYER_4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// 8×8 Bayer index matrix.
pub const BAYER_8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Side length of the tiled threshold matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BayerSize {
    /// 2×2.
    Two,
    /// 4×4.
    #[default]
    Four,
    /// 8×8.
    Eight,
}

impl BayerSize {
    /// Matrix side length.
    #[must_use]
    pub const fn side(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// Raw matrix entry at `(row, col)`, both taken modulo the side.
    #[must_use]
    pub const fn index(self, row: usize, col: usize) -> u8 {
        match self {
            Self::Two => BAYER_2[row % 2][col % 2],
            Self::Four => BAYER_4[row % 4][col % 4],
            Self::Eight => BAYER_8[row % 8][col % 8],
        }
    }

    /// Threshold matrix with entries scaled to `raw / side² * 255`,
    /// flattened row-major.
    #[must_use]
    pub fn normalized(self) -> Vec<f32> {
        let side = self.side();
        #[allow(clippy::cast_precision_loss)]
        let cells = (side * side) as f32;
        (0..side * side)
            .map(|i| f32::from(self.index(i / side, i % side)) / cells * 255.0)
            .collect()
    }

    /// Configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Two => "ordered-2x2",
            Self::Four => "ordered-4x4",
            Self::Eight => "ordered-8x8",
        }
    }
}

impl Ditherer for BayerSize {
    fn dither(&self, image: &mut RgbaImage, params: &DitherParams) {
        ordered(image, *self, params.levels, params.spread.0);
    }
}

/// Ordered-dither `image` in place.
///
/// Each R, G, B value becomes
/// `round((v + (threshold - 128) * spread) / step) * step`, clamped, where
/// `step = 256 / levels` and `threshold` is the normalized matrix entry
/// for `(y % side, x % side)`. Alpha is untouched.
pub fn ordered(image: &mut RgbaImage, size: BayerSize, levels: u16, spread: f32) {
    let side = size.side();
    let matrix = size.normalized();
    let step = 256.0 / f32::from(levels.max(1));

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let threshold = matrix[(y as usize % side) * side + x as usize % side];
        let offset = (threshold - 128.0) * spread;
        for c in &mut pixel.0[..3] {
            let shifted = f32::from(*c) + offset;
            *c = to_channel((shifted / step).round() * step);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn grey(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn matrices_are_permutations() {
        for size in [BayerSize::Two, BayerSize::Four, BayerSize::Eight] {
            let side = size.side();
            let mut seen = vec![false; side * side];
            for row in 0..side {
                for col in 0..side {
                    seen[usize::from(size.index(row, col))] = true;
                }
            }
            assert!(seen.iter().all(|&s| s), "{}", size.name());
        }
    }

    #[test]
    fn normalized_matrix_scales_to_byte_range() {
        let m = BayerSize::Two.normalized();
        assert_eq!(m.len(), 4);
        assert!((m[0] - 0.0).abs() < 1e-6);
        assert!((m[1] - 127.5).abs() < 1e-6);
        assert!((m[2] - 191.25).abs() < 1e-6);
        assert!((m[3] - 63.75).abs() < 1e-6);
    }

    #[test]
    fn uniform_input_tiles_with_matrix_period() {
        for size in [BayerSize::Two, BayerSize::Four, BayerSize::Eight] {
            let side = u32::try_from(size.side()).unwrap();
            let mut img = grey(side * 3, side * 3, 117);
            ordered(&mut img, size, 4, 1.0);
            for y in 0..side * 3 {
                for x in 0..side * 3 {
                    assert_eq!(
                        img.get_pixel(x, y),
                        img.get_pixel(x % side, y % side),
                        "{} at ({x}, {y})",
                        size.name()
                    );
                }
            }
        }
    }

    #[test]
    fn shifting_by_matrix_side_leaves_pattern_unchanged() {
        let size = BayerSize::Four;
        let mut a = grey(16, 16, 90);
        ordered(&mut a, size, 2, 1.0);
        let mut b = grey(20, 20, 90);
        ordered(&mut b, size, 2, 1.0);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(a.get_pixel(x, y), b.get_pixel(x + 4, y + 4));
            }
        }
    }

    #[test]
    fn zero_spread_snaps_to_step_grid() {
        let mut img = grey(4, 4, 100);
        ordered(&mut img, BayerSize::Eight, 4, 0.0);
        // step 64: 100 / 64 = 1.56 -> 2 -> 128
        assert!(img.pixels().all(|p| p.0[0] == 128));
    }

    #[test]
    fn output_is_clamped_to_step_grid() {
        let mut img = grey(2, 2, 250);
        ordered(&mut img, BayerSize::Two, 2, 2.0);
        // step 128; 256 clamps to 255, negative offsets clamp to 0
        let values: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 255, 255, 128]);
    }

    #[test]
    fn alpha_is_untouched() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 5]));
        ordered(&mut img, BayerSize::Four, 8, 1.0);
        assert!(img.pixels().all(|p| p.0[3] == 5));
    }
}
