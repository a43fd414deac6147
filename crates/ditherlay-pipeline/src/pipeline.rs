//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate buffer before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use ditherlay_pipeline::{Pipeline, PipelineConfig, PipelineError, RgbaImage};
//! # fn run(image: RgbaImage) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(image, config)
//!     .adjust_tone()
//!     .dither()
//!     .map_colors()
//!     .composite()?;
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every previously computed buffer. Pattern renderers
//! (halftone, wavy-line) produce their final pixels in the dither stage;
//! the colour-map and overlay stages then pass them through unchanged.
//!
//! # Memory
//!
//! Every stage retains all earlier buffers, so a finished run holds five
//! full-resolution RGBA copies. Callers that only need the final pixels
//! should prefer [`crate::process`].

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::color_map::{self, Palette};
use crate::diagnostics::StageMetrics;
use crate::dither::{Algorithm, DitherParams, Ditherer};
use crate::halftone::{self, HalftoneParams};
use crate::overlay;
use crate::resample;
use crate::tone;
use crate::types::{Dimensions, PipelineConfig, PipelineError, RgbaImage, StagedResult};
use crate::wavy::{self, RidgeStats, WavyParams};

/// How the dither stage produced its buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rendering {
    /// Quantizer run at the dot-scale working resolution.
    Quantized {
        /// Working resolution.
        working: Dimensions,
    },
    /// Halftone screen.
    Halftone {
        /// Dots drawn.
        dots: usize,
    },
    /// Wavy-line ridges.
    Ridges(RidgeStats),
    /// Unknown or disabled algorithm; pixels untouched.
    PassThrough,
}

impl Rendering {
    /// Whether the buffer is already final (no colour map or overlay).
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::Halftone { .. } | Self::Ridges(_))
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`adjust_tone`](Self::adjust_tone) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .adjust_tone() to continue"]
pub struct Pending {
    config: PipelineConfig,
    original: RgbaImage,
}

impl Pending {
    /// The caller's pixels.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// The (clamped) configuration this run uses.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the tone chain and advance to [`ToneAdjusted`].
    ///
    /// Noise draws from a generator seeded with `config.noise_seed` when
    /// set, otherwise from OS entropy.
    pub fn adjust_tone(self) -> ToneAdjusted {
        let mut rng = self
            .config
            .noise_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let adjusted = tone::adjust(&self.original, &self.config, &mut rng);
        ToneAdjusted {
            config: self.config,
            original: self.original,
            adjusted,
        }
    }
}

// ─────────────────────── Stage 1: ToneAdjusted ───────────────────────

/// Pipeline state after brightness, contrast, blur, noise, denoise and
/// sharpen.
#[must_use = "pipeline stages are consumed by advancing — call .dither() to continue"]
pub struct ToneAdjusted {
    config: PipelineConfig,
    original: RgbaImage,
    adjusted: RgbaImage,
}

impl ToneAdjusted {
    /// The caller's pixels.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// The tone-adjusted image.
    #[must_use]
    pub const fn adjusted(&self) -> &RgbaImage {
        &self.adjusted
    }

    /// Dither (or render the pattern) and advance to [`Dithered`].
    ///
    /// Quantizers run on a nearest-neighbour downscale by `dot_size` and
    /// the result is scaled back up. Pattern renderers work on the
    /// full-resolution adjusted image.
    pub fn dither(self) -> Dithered {
        let full = Dimensions::of(&self.adjusted);
        let algorithm = self.config.algorithm;
        let (dithered, rendering) = match algorithm {
            Algorithm::HalftoneCircles => {
                let params = HalftoneParams::from_config(&self.config);
                let (out, dots) = halftone::render(&self.adjusted, &params);
                (out, Rendering::Halftone { dots })
            }
            Algorithm::WavyLine => {
                let params = WavyParams::from_config(&self.config);
                let (out, stats) = wavy::render(&self.adjusted, &params);
                (out, Rendering::Ridges(stats))
            }
            Algorithm::PassThrough => (self.adjusted.clone(), Rendering::PassThrough),
            Algorithm::ErrorDiffusion(_) | Algorithm::Ordered(_) | Algorithm::Threshold => {
                let params = DitherParams::from_config(&self.config);
                let mut working = resample::scale_down(&self.adjusted, self.config.dot_size);
                let working_dims = Dimensions::of(&working);
                algorithm.dither(&mut working, &params);
                let out = if working_dims == full {
                    working
                } else {
                    resample::scale_up(&working, full)
                };
                (
                    out,
                    Rendering::Quantized {
                        working: working_dims,
                    },
                )
            }
        };
        tracing::debug!(%algorithm, ?rendering, "dither stage done");
        Dithered {
            config: self.config,
            original: self.original,
            adjusted: self.adjusted,
            dithered,
            rendering,
        }
    }
}

// ──────────────────────── Stage 2: Dithered ─────────────────────────

/// Pipeline state after dithering or pattern rendering.
#[must_use = "pipeline stages are consumed by advancing — call .map_colors() to continue"]
pub struct Dithered {
    config: PipelineConfig,
    original: RgbaImage,
    adjusted: RgbaImage,
    dithered: RgbaImage,
    rendering: Rendering,
}

impl Dithered {
    /// The dithered (or pattern-rendered) image.
    #[must_use]
    pub const fn dithered(&self) -> &RgbaImage {
        &self.dithered
    }

    /// How the dithered image was produced.
    #[must_use]
    pub const fn rendering(&self) -> Rendering {
        self.rendering
    }

    /// Apply the tonal mapping and advance to [`Mapped`].
    ///
    /// Pattern renderer output passes through unchanged.
    pub fn map_colors(self) -> Mapped {
        let mut mapped = self.dithered.clone();
        let applied = !self.rendering.is_pattern()
            && color_map::map_colors(
                &mut mapped,
                self.config.tonal_mapping_type,
                &Palette::from_config(&self.config),
            );
        Mapped {
            config: self.config,
            original: self.original,
            adjusted: self.adjusted,
            dithered: self.dithered,
            rendering: self.rendering,
            mapped,
            applied,
        }
    }
}

// ───────────────────────── Stage 3: Mapped ──────────────────────────

/// Pipeline state after colour mapping.
#[must_use = "pipeline stages are consumed by advancing — call .composite() to continue"]
pub struct Mapped {
    config: PipelineConfig,
    original: RgbaImage,
    adjusted: RgbaImage,
    dithered: RgbaImage,
    rendering: Rendering,
    mapped: RgbaImage,
    applied: bool,
}

impl Mapped {
    /// The colour-mapped image.
    #[must_use]
    pub const fn mapped(&self) -> &RgbaImage {
        &self.mapped
    }

    /// Whether a colour table was applied.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Derive overlay alpha from the difference to the original and
    /// advance to [`Composited`].
    ///
    /// Pattern renderers already set their own alpha and pass through.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if the mapped buffer
    /// no longer matches the original's size.
    pub fn composite(self) -> Result<Composited, PipelineError> {
        let mut output = self.mapped.clone();
        if !self.rendering.is_pattern() {
            overlay::composite(&self.original, &mut output, self.config.overlay_opacity())?;
        }
        Ok(Composited {
            config: self.config,
            original: self.original,
            adjusted: self.adjusted,
            dithered: self.dithered,
            rendering: self.rendering,
            mapped: self.mapped,
            output,
        })
    }
}

// ──────────────────────── Stage 4: Composited ───────────────────────

/// Final pipeline state: the output buffer is ready.
#[must_use = "call .into_result() to take the buffers"]
pub struct Composited {
    config: PipelineConfig,
    original: RgbaImage,
    adjusted: RgbaImage,
    dithered: RgbaImage,
    rendering: Rendering,
    mapped: RgbaImage,
    output: RgbaImage,
}

impl Composited {
    /// The final overlay buffer.
    #[must_use]
    pub const fn overlay(&self) -> &RgbaImage {
        &self.output
    }

    /// The configuration this run used.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Consume the pipeline and return every buffer.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = Dimensions::of(&self.original);
        StagedResult {
            original: self.original,
            adjusted: self.adjusted,
            dithered: self.dithered,
            mapped: self.mapped,
            output: self.output,
            dimensions,
        }
    }
}

// ───────────────────────────── Entry ────────────────────────────────

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a run over `image`. The configuration is
    /// [`clamped`](PipelineConfig::clamped) before anything reads it.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: RgbaImage, config: PipelineConfig) -> Pending {
        Pending {
            config: config.clamped(),
            original: image,
        }
    }
}

// ──────────────────────── Type-erased stages ────────────────────────

/// Borrowed view of whatever the current stage produced.
#[must_use]
pub enum StageOutput<'a> {
    /// The caller's pixels.
    Source {
        /// Original image.
        original: &'a RgbaImage,
    },
    /// Tone-adjusted image.
    Adjusted {
        /// Adjusted image.
        adjusted: &'a RgbaImage,
    },
    /// Dithered or pattern-rendered image.
    Dithered {
        /// Dithered image.
        dithered: &'a RgbaImage,
    },
    /// Colour-mapped image.
    Mapped {
        /// Mapped image.
        mapped: &'a RgbaImage,
    },
    /// Final overlay.
    Composited {
        /// Output image.
        output: &'a RgbaImage,
    },
}

impl<'a> StageOutput<'a> {
    /// The image behind this output, whichever stage it came from.
    #[must_use]
    pub const fn image(&self) -> &'a RgbaImage {
        match self {
            Self::Source { original: image }
            | Self::Adjusted { adjusted: image }
            | Self::Dithered { dithered: image }
            | Self::Mapped { mapped: image }
            | Self::Composited { output: image } => *image,
        }
    }
}

/// Behaviour shared by every pipeline stage.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"tone"`).
    const NAME: &str;

    /// Zero-based index (`0` for Pending through `4` for Composited).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics, `None` before any work has been done.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(None)` if already at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages and return the [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.adjust_tone().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.adjust_tone().complete()
    }
}

impl PipelineStage for ToneAdjusted {
    const NAME: &str = "tone";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Adjusted {
            adjusted: &self.adjusted,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let c = &self.config;
        let filters_applied = [
            c.brightness.abs(),
            c.contrast.abs(),
            c.blur,
            c.noise,
            c.denoise,
            c.sharpen_strength,
        ]
        .iter()
        .filter(|v| **v > f32::EPSILON)
        .count();
        Some(StageMetrics::Tone {
            filters_applied,
            brightness: c.brightness,
            contrast: c.contrast,
            noise: c.noise,
            noise_seed: c.noise_seed,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.dither().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.dither().complete()
    }
}

impl PipelineStage for Dithered {
    const NAME: &str = "dither";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Dithered {
            dithered: &self.dithered,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let metrics = match self.rendering {
            Rendering::Halftone { dots } => StageMetrics::Halftone {
                grid_spacing: self.config.halftone_grid_spacing,
                dots,
            },
            Rendering::Ridges(stats) => StageMetrics::WavyLine {
                lines: stats.lines,
                mean_gradient: stats.mean_gradient,
            },
            Rendering::Quantized { working } => StageMetrics::Dither {
                algorithm: self.config.algorithm.name().to_owned(),
                levels: DitherParams::from_config(&self.config).levels,
                working_width: working.width,
                working_height: working.height,
            },
            Rendering::PassThrough => {
                let full = Dimensions::of(&self.dithered);
                StageMetrics::Dither {
                    algorithm: self.config.algorithm.name().to_owned(),
                    levels: 0,
                    working_width: full.width,
                    working_height: full.height,
                }
            }
        };
        Some(metrics)
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.map_colors().into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.map_colors().complete()
    }
}

impl PipelineStage for Mapped {
    const NAME: &str = "color_map";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Mapped {
            mapped: &self.mapped,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::ColorMap {
            mode: self.config.tonal_mapping_type.name().to_owned(),
            applied: self.applied,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(self.composite()?.into()))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.composite()?.complete()
    }
}

impl PipelineStage for Composited {
    const NAME: &str = "overlay";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Composited {
            output: &self.output,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let transparent = self.output.pixels().filter(|p| p.0[3] == 0).count();
        let transparent_pixels = u64::try_from(transparent).unwrap_or(u64::MAX);
        Some(StageMetrics::Overlay {
            applied: !self.rendering.is_pattern(),
            mean_alpha: overlay::mean_alpha(&self.output),
            transparent_pixels,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// A pipeline paused at any stage.
#[must_use]
pub enum Stage {
    /// Before tone adjustment.
    Pending(Pending),
    /// After tone adjustment.
    ToneAdjusted(ToneAdjusted),
    /// After dithering.
    Dithered(Dithered),
    /// After colour mapping.
    Mapped(Mapped),
    /// Finished.
    Composited(Composited),
}

/// Result of [`Stage::advance`].
#[must_use]
pub enum Advance {
    /// Moved to the next stage.
    Next(Stage),
    /// The pipeline was already at the final stage, returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::ToneAdjusted(s) => s.$method($($arg),*),
            Self::Dithered(s) => s.$method($($arg),*),
            Self::Mapped(s) => s.$method($($arg),*),
            Self::Composited(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Composited(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        match self.next()? {
            Some(next) => Ok(Advance::Next(next)),
            None => Err(PipelineError::InvalidConfig(
                "pipeline ended before its final stage".to_owned(),
            )),
        }
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// `PipelineStage` constants aren't reachable through `self`, so the
// macro goes through this helper.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<ToneAdjusted> for Stage {
    fn from(s: ToneAdjusted) -> Self {
        Self::ToneAdjusted(s)
    }
}

impl From<Dithered> for Stage {
    fn from(s: Dithered) -> Self {
        Self::Dithered(s)
    }
}

impl From<Mapped> for Stage {
    fn from(s: Mapped) -> Self {
        Self::Mapped(s)
    }
}

impl From<Composited> for Stage {
    fn from(s: Composited) -> Self {
        Self::Composited(s)
    }
}
