//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! The pipeline itself never reads a clock. Callers pass a [`Clock`]
//! so native builds can use `std::time::Instant` and WASM builds a
//! `performance.now()`-backed source.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineConfig, PipelineError, RgbaImage, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: tone adjustment.
    pub tone: StageDiagnostics,
    /// Stage 2: dot-scale + dither, or the pattern renderer.
    pub dither: StageDiagnostics,
    /// Stage 3: colour mapping.
    pub color_map: StageDiagnostics,
    /// Stage 4: overlay compositing.
    pub overlay: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Whole-run summary.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics, if the stage reports any.
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Tone adjustment.
    Tone {
        /// Filters that ran (non-zero magnitude).
        filters_applied: usize,
        /// Brightness shift.
        brightness: f32,
        /// Contrast amount.
        contrast: f32,
        /// Noise magnitude.
        noise: f32,
        /// Noise seed, if deterministic.
        noise_seed: Option<u64>,
    },
    /// Quantizing dither engine.
    Dither {
        /// Algorithm name.
        algorithm: String,
        /// Quantization levels.
        levels: u16,
        /// Dot-scale working width.
        working_width: u32,
        /// Dot-scale working height.
        working_height: u32,
    },
    /// Halftone renderer.
    Halftone {
        /// Grid spacing in pixels.
        grid_spacing: f32,
        /// Dots drawn.
        dots: usize,
    },
    /// Wavy-line renderer.
    WavyLine {
        /// Ridge lines drawn.
        lines: usize,
        /// Mean Sobel magnitude of the source.
        mean_gradient: f32,
    },
    /// Colour mapping.
    ColorMap {
        /// Mapping mode name.
        mode: String,
        /// Whether a table was applied.
        applied: bool,
    },
    /// Overlay compositing.
    Overlay {
        /// Whether alpha was derived (false for pattern renderers).
        applied: bool,
        /// Mean output alpha (0–255).
        mean_alpha: f64,
        /// Output pixels with alpha 0.
        transparent_pixels: u64,
    },
}

/// Whole-run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Algorithm name.
    pub algorithm: String,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)  |  Algorithm: {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
            self.summary.algorithm,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Tone", &self.tone),
            ("Dither", &self.dither),
            ("Color Map", &self.color_map),
            ("Overlay", &self.overlay),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = diag.metrics.as_ref().map_or_else(String::new, format_metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Tone {
            filters_applied,
            brightness,
            contrast,
            noise,
            noise_seed,
        } => {
            let seed = noise_seed.map_or_else(|| "entropy".to_owned(), |s| s.to_string());
            format!(
                "filters={filters_applied} brightness={brightness:.0} contrast={contrast:.0} noise={noise:.0} seed={seed}"
            )
        }
        StageMetrics::Dither {
            algorithm,
            levels,
            working_width,
            working_height,
        } => format!("{algorithm} levels={levels} at {working_width}x{working_height}"),
        StageMetrics::Halftone { grid_spacing, dots } => {
            format!("spacing={grid_spacing:.1} dots={dots}")
        }
        StageMetrics::WavyLine {
            lines,
            mean_gradient,
        } => format!("lines={lines} mean_gradient={mean_gradient:.2}"),
        StageMetrics::ColorMap { mode, applied } => {
            if *applied {
                format!("mode={mode}")
            } else {
                "skipped".to_owned()
            }
        }
        StageMetrics::Overlay {
            applied,
            mean_alpha,
            transparent_pixels,
        } => {
            let how = if *applied { "derived" } else { "renderer" };
            format!("alpha {how}: mean={mean_alpha:.1} transparent={transparent_pixels}")
        }
    }
}

/// Run the full pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Propagates any [`PipelineError`] from the pipeline stages.
pub fn process_staged_with_diagnostics<C: Clock>(
    image: &RgbaImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let pending = Pipeline::new(image.clone(), config.clone());
    let algorithm = pending.config().algorithm.name().to_owned();

    let t = clock.now();
    let adjusted = pending.adjust_tone();
    let tone = timed(clock, &t, &adjusted);

    let t = clock.now();
    let dithered = adjusted.dither();
    let dither = timed(clock, &t, &dithered);

    let t = clock.now();
    let mapped = dithered.map_colors();
    let color_map = timed(clock, &t, &mapped);

    let t = clock.now();
    let composited = mapped.composite()?;
    let overlay = timed(clock, &t, &composited);

    let total_duration = clock.elapsed(&start);
    let result = composited.into_result();
    let dims = result.dimensions;

    let diagnostics = PipelineDiagnostics {
        tone,
        dither,
        color_map,
        overlay,
        total_duration,
        summary: PipelineSummary {
            image_width: dims.width,
            image_height: dims.height,
            pixel_count: dims.pixel_count(),
            algorithm,
        },
    };
    tracing::debug!(total_ms = duration_ms(total_duration), "pipeline finished");
    Ok((result, diagnostics))
}

fn timed<C: Clock, S: PipelineStage>(clock: &C, since: &C::Instant, stage: &S) -> StageDiagnostics {
    let duration = clock.elapsed(since);
    StageDiagnostics {
        duration,
        metrics: stage.metrics(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::Rgba;

    use super::*;
    use crate::dither::Algorithm;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(24, 12, |x, y| {
            let v = u8::try_from(x * 10).unwrap_or(255);
            Rgba([v, u8::try_from(y * 20).unwrap_or(255), 128, 255])
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        assert!((duration_ms(Duration::from_micros(1500)) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let clock = TickClock(Cell::new(0));
        let (result, diag) =
            process_staged_with_diagnostics(&gradient(), &PipelineConfig::default(), &clock).unwrap();
        assert_eq!(diag.summary.image_width, 24);
        assert_eq!(diag.summary.pixel_count, 24 * 12);
        assert_eq!(diag.summary.algorithm, "floyd-steinberg");
        assert!(diag.total_duration >= diag.tone.duration + diag.dither.duration);
        assert!(matches!(diag.dither.metrics, Some(StageMetrics::Dither { levels: 3, .. })));
        assert!(matches!(diag.overlay.metrics, Some(StageMetrics::Overlay { applied: true, .. })));
        assert_eq!(result.output.dimensions(), (24, 12));
    }

    #[test]
    fn halftone_metrics_count_dots() {
        let config = PipelineConfig {
            algorithm: Algorithm::HalftoneCircles,
            ..PipelineConfig::default()
        };
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(&gradient(), &config, &clock).unwrap();
        // centres at x = 4, 12, 20 and y = 4
        assert!(matches!(diag.dither.metrics, Some(StageMetrics::Halftone { dots: 3, .. })));
        assert!(matches!(diag.overlay.metrics, Some(StageMetrics::Overlay { applied: false, .. })));
    }

    #[test]
    fn report_produces_nonempty_string() {
        let clock = TickClock(Cell::new(0));
        let config = PipelineConfig {
            algorithm: Algorithm::WavyLine,
            ..PipelineConfig::default()
        };
        let (_, diag) = process_staged_with_diagnostics(&gradient(), &config, &clock).unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("wavy-line"));
        assert!(report.contains("lines="));
    }

    #[test]
    fn diagnostics_serde_round_trip() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&gradient(), &PipelineConfig::default(), &clock).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dither.metrics, diag.dither.metrics);
        assert_eq!(back.total_duration, diag.total_duration);
    }
}
