//! The editing application the overlay is rendered for.
//!
//! The pipeline never reads or writes documents itself. A host supplies
//! the source region at a requested resolution and accepts the finished
//! overlay as a new layer; [`render_overlay`] wires the two ends to the
//! pipeline.

use serde::{Deserialize, Serialize};

use crate::dither::Algorithm;
use crate::pipeline::Pipeline;
use crate::types::{Dimensions, PipelineConfig, PipelineError, RgbaImage};

/// Resolution that `inputDpi` is measured against.
pub const BASE_DPI: f32 = 72.0;

/// Placement and size of the source region in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Width in host pixels.
    pub width: u32,
    /// Height in host pixels.
    pub height: u32,
}

/// Something that can hand out pixels and take an overlay back.
pub trait PixelHost {
    /// Host-side failure.
    type Error;

    /// Where the source region sits.
    ///
    /// # Errors
    ///
    /// Returns the host's error when no source is available.
    fn source_bounds(&self) -> Result<Bounds, Self::Error>;

    /// The source region resampled to `target`.
    ///
    /// # Errors
    ///
    /// Returns the host's error if the pixels cannot be read.
    fn fetch_pixels(&mut self, target: Dimensions) -> Result<RgbaImage, Self::Error>;

    /// Add `overlay` as a new layer named `name`, its top-left corner at
    /// `offset`.
    ///
    /// # Errors
    ///
    /// Returns the host's error if the layer cannot be created.
    fn commit_overlay(
        &mut self,
        name: &str,
        overlay: &RgbaImage,
        offset: (i32, i32),
    ) -> Result<(), Self::Error>;
}

/// Failure of [`render_overlay`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError<E> {
    /// The host failed.
    #[error("host error: {0}")]
    Host(E),
    /// The source region has no pixels.
    #[error("source region {}x{} is empty", .0.width, .0.height)]
    EmptySource(Bounds),
    /// The pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Working resolution for a source of `bounds` at `dpi`:
/// `ceil(width * dpi / 72) x ceil(height * dpi / 72)`.
///
/// A non-empty side never shrinks to 0; an empty side stays empty.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn target_dimensions(bounds: Bounds, dpi: f32) -> Dimensions {
    let scale = if dpi.is_finite() && dpi > 0.0 { dpi / BASE_DPI } else { 1.0 };
    let side = |v: u32| ((v as f32 * scale).ceil() as u32).max(v.min(1));
    Dimensions {
        width: side(bounds.width),
        height: side(bounds.height),
    }
}

/// Name given to the overlay layer for `algorithm`.
#[must_use]
pub fn layer_name(algorithm: Algorithm) -> String {
    format!("Dither ({})", algorithm.name())
}

/// Fetch the source from `host`, run the pipeline, and commit the result.
///
/// Returns the committed overlay.
///
/// # Errors
///
/// Returns [`RenderError::Host`] when the host fails,
/// [`RenderError::EmptySource`] when the source has no pixels, and
/// [`RenderError::Pipeline`] when processing fails.
pub fn render_overlay<H: PixelHost>(
    host: &mut H,
    config: &PipelineConfig,
) -> Result<RgbaImage, RenderError<H::Error>> {
    let config = config.clamped();
    let bounds = host.source_bounds().map_err(RenderError::Host)?;
    if bounds.width == 0 || bounds.height == 0 {
        return Err(RenderError::EmptySource(bounds));
    }
    let target = target_dimensions(bounds, config.input_dpi);
    let source = host.fetch_pixels(target).map_err(RenderError::Host)?;
    if Dimensions::of(&source) != target {
        return Err(PipelineError::InvalidDimensions {
            width: target.width,
            height: target.height,
            expected: target_len(target),
            actual: source.as_raw().len(),
        }
        .into());
    }

    tracing::info!(%target, algorithm = %config.algorithm, "rendering overlay");
    let name = layer_name(config.algorithm);
    let overlay = Pipeline::new(source, config)
        .adjust_tone()
        .dither()
        .map_colors()
        .composite()?
        .into_result()
        .output;

    host.commit_overlay(&name, &overlay, (bounds.left, bounds.top))
        .map_err(RenderError::Host)?;
    Ok(overlay)
}

fn target_len(target: Dimensions) -> usize {
    usize::try_from(target.pixel_count())
        .unwrap_or(usize::MAX)
        .saturating_mul(4)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    #[derive(Default)]
    struct MockHost {
        bounds: Option<Bounds>,
        fetched: Vec<Dimensions>,
        committed: Vec<(String, Dimensions, (i32, i32))>,
        short_fetch: bool,
    }

    impl PixelHost for MockHost {
        type Error = String;

        fn source_bounds(&self) -> Result<Bounds, String> {
            self.bounds.ok_or_else(|| "no layer selected".to_owned())
        }

        fn fetch_pixels(&mut self, target: Dimensions) -> Result<RgbaImage, String> {
            self.fetched.push(target);
            let width = if self.short_fetch { target.width - 1 } else { target.width };
            Ok(RgbaImage::from_fn(width, target.height, |x, _| {
                let v = u8::try_from(x % 256).unwrap();
                Rgba([v, v, v, 255])
            }))
        }

        fn commit_overlay(
            &mut self,
            name: &str,
            overlay: &RgbaImage,
            offset: (i32, i32),
        ) -> Result<(), String> {
            self.committed.push((name.to_owned(), Dimensions::of(overlay), offset));
            Ok(())
        }
    }

    fn bounds() -> Bounds {
        Bounds {
            left: 10,
            top: -4,
            width: 20,
            height: 7,
        }
    }

    #[test]
    fn target_dimensions_scale_with_dpi() {
        assert_eq!(target_dimensions(bounds(), 72.0), Dimensions { width: 20, height: 7 });
        assert_eq!(target_dimensions(bounds(), 144.0), Dimensions { width: 40, height: 14 });
        // 7 * 100 / 72 = 9.72 -> 10
        assert_eq!(target_dimensions(bounds(), 100.0), Dimensions { width: 28, height: 10 });
        assert_eq!(target_dimensions(bounds(), f32::NAN), Dimensions { width: 20, height: 7 });
    }

    #[test]
    fn target_dimensions_never_collapse() {
        let tiny = Bounds {
            width: 1,
            height: 1,
            ..bounds()
        };
        assert_eq!(target_dimensions(tiny, 1.0), Dimensions { width: 1, height: 1 });
    }

    #[test]
    fn target_dimensions_keep_empty_sides_empty() {
        let empty = Bounds {
            width: 0,
            height: 0,
            ..bounds()
        };
        assert_eq!(target_dimensions(empty, 144.0), Dimensions { width: 0, height: 0 });
        let strip = Bounds {
            height: 0,
            ..bounds()
        };
        assert_eq!(target_dimensions(strip, 72.0), Dimensions { width: 20, height: 0 });
    }

    #[test]
    fn empty_source_is_rejected_before_fetching() {
        let mut host = MockHost {
            bounds: Some(Bounds {
                width: 0,
                height: 0,
                ..bounds()
            }),
            ..MockHost::default()
        };
        let err = render_overlay(&mut host, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::EmptySource(Bounds { width: 0, height: 0, .. })));
        assert_eq!(err.to_string(), "source region 0x0 is empty");
        assert!(host.fetched.is_empty());
        assert!(host.committed.is_empty());
    }

    #[test]
    fn layer_name_uses_algorithm_name() {
        assert_eq!(layer_name(Algorithm::DEFAULT), "Dither (floyd-steinberg)");
        assert_eq!(layer_name(Algorithm::HalftoneCircles), "Dither (halftone-circles)");
    }

    #[test]
    fn render_overlay_commits_at_source_offset() {
        let mut host = MockHost {
            bounds: Some(bounds()),
            ..MockHost::default()
        };
        let config = PipelineConfig {
            input_dpi: 144.0,
            ..PipelineConfig::default()
        };
        let overlay = render_overlay(&mut host, &config).unwrap();
        assert_eq!(overlay.dimensions(), (40, 14));
        assert_eq!(host.fetched, [Dimensions { width: 40, height: 14 }]);
        assert_eq!(
            host.committed,
            [(
                "Dither (floyd-steinberg)".to_owned(),
                Dimensions { width: 40, height: 14 },
                (10, -4)
            )]
        );
    }

    #[test]
    fn host_errors_are_wrapped() {
        let mut host = MockHost::default();
        let err = render_overlay(&mut host, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::Host(ref msg) if msg == "no layer selected"));
        assert!(host.committed.is_empty());
    }

    #[test]
    fn wrong_sized_fetch_is_rejected() {
        let mut host = MockHost {
            bounds: Some(bounds()),
            short_fetch: true,
            ..MockHost::default()
        };
        let err = render_overlay(&mut host, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Pipeline(PipelineError::InvalidDimensions {
                expected: 560,
                actual: 532,
                ..
            })
        ));
        assert!(host.committed.is_empty());
    }
}
