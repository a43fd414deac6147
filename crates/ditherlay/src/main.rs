//! ditherlay: dither an image file into a translucent overlay PNG.
//!
//! The CLI plays the host's part: it loads the image, hands the pipeline
//! the region it asks for, and writes the committed overlay to disk.
//! Useful for:
//!
//! - Previewing an effect without the editing application
//! - Comparing algorithms and tonal mappings on the same source
//! - Measuring per-stage durations with `--diagnostics`
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin ditherlay -- [OPTIONS] <INPUT> -o <OUTPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use ditherlay_pipeline::diagnostics::{
    Clock, PipelineDiagnostics, process_staged_with_diagnostics,
};
use ditherlay_pipeline::host::{self, Bounds, PixelHost};
use ditherlay_pipeline::{
    Algorithm, Dimensions, HalftoneColorMode, HexColor, PipelineConfig, RgbaImage, TonalMapping,
    WavyLineColorMode, overlay,
};
use image::imageops::{self, FilterType};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Dither an image into a translucent overlay.
///
/// Runs tone adjustment, dithering (or a halftone / wavy-line pattern),
/// colour mapping and overlay alpha over INPUT and writes the overlay as
/// a PNG.
#[derive(Parser)]
#[command(name = "ditherlay", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Where to write the overlay (PNG).
    #[arg(short, long)]
    output: PathBuf,

    /// Dither kernel or pattern renderer (floyd-steinberg, atkinson,
    /// ordered-4x4, threshold, halftone-circles, wavy-line, none, ...).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ALGORITHM)]
    algorithm: Algorithm,

    /// Quantization levels per channel.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_COLOR_DEPTH)]
    color_depth: u16,

    /// Effect intensity in percent (0-200).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DITHER_INTENSITY)]
    intensity: f32,

    /// Dither at 1/N resolution and enlarge, for a coarse dot look.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DOT_SIZE)]
    dot_size: u32,

    /// Brightness shift (-100..100).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    brightness: f32,

    /// Contrast (-100..100).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    contrast: f32,

    /// Uniform noise magnitude (0-100).
    #[arg(long, default_value_t = 0.0)]
    noise: f32,

    /// Seed the noise stage for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Denoise strength (0-100).
    #[arg(long, default_value_t = 0.0)]
    denoise: f32,

    /// Blur radius (0-100, capped at 3 internally).
    #[arg(long, default_value_t = 0.0)]
    blur: f32,

    /// Unsharp-mask strength (0-100).
    #[arg(long, default_value_t = 0.0)]
    sharpen: f32,

    /// Unsharp-mask radius.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SHARPEN_RADIUS)]
    sharpen_radius: u32,

    /// Cutoff for the threshold algorithm.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Tonal mapping (none, singleColor, 3color, 5color, custom).
    #[arg(long, default_value_t = TonalMapping::None)]
    tonal_mapping: TonalMapping,

    /// Shadow palette colour.
    #[arg(long, default_value_t = HexColor::BLACK)]
    shadow: HexColor,

    /// Midtone palette colour.
    #[arg(long, default_value_t = HexColor::GREY)]
    midtone: HexColor,

    /// Highlight palette colour.
    #[arg(long, default_value_t = HexColor::WHITE)]
    highlight: HexColor,

    /// Wavy-line ridge spacing in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RIDGE_SPACING)]
    ridge_spacing: f32,

    /// Wavy-line wave amplitude.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WAVE_AMPLITUDE)]
    wave_amplitude: f32,

    /// Wavy-line colours (purple-blue, bw).
    #[arg(long, default_value_t = WavyLineColorMode::default())]
    wavy_color: WavyLineColorMode,

    /// Halftone grid spacing in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HALFTONE_GRID_SPACING)]
    grid_spacing: f32,

    /// Halftone dot radius for white.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HALFTONE_MIN_DOT)]
    min_dot: f32,

    /// Halftone dot radius for black.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HALFTONE_MAX_DOT)]
    max_dot: f32,

    /// Halftone colours (black-white, inverted, original).
    #[arg(long, default_value_t = HalftoneColorMode::default())]
    halftone_color: HalftoneColorMode,

    /// Resolution to fetch the source at; 72 keeps the file's pixel size.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_INPUT_DPI)]
    dpi: f32,

    /// Full pipeline config as a JSON string (host field names).
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Blend the overlay onto the source instead of writing it translucent.
    #[arg(long)]
    flatten: bool,

    /// Print per-stage timing and metrics.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of the human-readable report.
    #[arg(long, requires = "diagnostics")]
    json: bool,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).context("parsing --config-json");
    }

    Ok(PipelineConfig {
        algorithm: cli.algorithm,
        color_depth: cli.color_depth,
        dither_intensity: cli.intensity,
        dot_size: cli.dot_size,
        brightness: cli.brightness,
        contrast: cli.contrast,
        noise: cli.noise,
        denoise: cli.denoise,
        blur: cli.blur,
        sharpen_strength: cli.sharpen,
        sharpen_radius: cli.sharpen_radius,
        threshold: cli.threshold,
        tonal_mapping_type: cli.tonal_mapping,
        shadow_color: cli.shadow,
        midtone_color: cli.midtone,
        highlight_color: cli.highlight,
        ridge_spacing: cli.ridge_spacing,
        wave_amplitude: cli.wave_amplitude,
        wavy_line_color_mode: cli.wavy_color,
        halftone_grid_spacing: cli.grid_spacing,
        halftone_min_dot: cli.min_dot,
        halftone_max_dot: cli.max_dot,
        halftone_color_mode: cli.halftone_color,
        input_dpi: cli.dpi,
        noise_seed: cli.seed,
    })
}

/// [`PixelHost`] over an image file on disk.
struct FileHost {
    source: RgbaImage,
    fetched: Option<RgbaImage>,
    output: PathBuf,
    flatten: bool,
}

impl FileHost {
    fn open(input: &Path, output: PathBuf, flatten: bool) -> anyhow::Result<Self> {
        let source = image::open(input)
            .with_context(|| format!("reading {}", input.display()))?
            .into_rgba8();
        tracing::info!(path = %input.display(), size = %Dimensions::of(&source), "loaded source");
        Ok(Self {
            source,
            fetched: None,
            output,
            flatten,
        })
    }
}

impl PixelHost for FileHost {
    type Error = anyhow::Error;

    fn source_bounds(&self) -> anyhow::Result<Bounds> {
        Ok(Bounds {
            left: 0,
            top: 0,
            width: self.source.width(),
            height: self.source.height(),
        })
    }

    fn fetch_pixels(&mut self, target: Dimensions) -> anyhow::Result<RgbaImage> {
        let fetched = if Dimensions::of(&self.source) == target {
            self.source.clone()
        } else {
            imageops::resize(&self.source, target.width, target.height, FilterType::Triangle)
        };
        self.fetched = Some(fetched.clone());
        Ok(fetched)
    }

    fn commit_overlay(
        &mut self,
        name: &str,
        layer: &RgbaImage,
        offset: (i32, i32),
    ) -> anyhow::Result<()> {
        let written = if self.flatten {
            let base = self
                .fetched
                .as_ref()
                .context("overlay committed before any pixels were fetched")?;
            overlay::flatten(base, layer)?
        } else {
            layer.clone()
        };
        written
            .save(&self.output)
            .with_context(|| format!("writing {}", self.output.display()))?;
        tracing::info!(layer = name, ?offset, path = %self.output.display(), "overlay committed");
        Ok(())
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Same flow as [`host::render_overlay`], timing each stage.
fn render_with_diagnostics(
    host: &mut FileHost,
    config: &PipelineConfig,
) -> anyhow::Result<PipelineDiagnostics> {
    let bounds = host.source_bounds()?;
    let target = host::target_dimensions(bounds, config.clamped().input_dpi);
    let source = host.fetch_pixels(target)?;
    let (staged, diagnostics) = process_staged_with_diagnostics(&source, config, &StdClock)?;
    host.commit_overlay(
        &host::layer_name(config.algorithm),
        &staged.output,
        (bounds.left, bounds.top),
    )?;
    Ok(diagnostics)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config_from_cli(cli)?;
    tracing::debug!(?config, "configuration");
    let mut host = FileHost::open(&cli.input, cli.output.clone(), cli.flatten)?;

    if !cli.diagnostics {
        host::render_overlay(&mut host, &config).context("rendering overlay")?;
        return Ok(());
    }

    let diagnostics = render_with_diagnostics(&mut host, &config)?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&diagnostics).context("serializing diagnostics")?
        );
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_become_config() {
        let cli = Cli::parse_from([
            "ditherlay",
            "in.png",
            "-o",
            "out.png",
            "--algorithm",
            "ordered-8x8",
            "--brightness",
            "-20",
            "--highlight",
            "#ff0000",
            "--tonal-mapping",
            "singleColor",
            "--seed",
            "9",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.algorithm.name(), "ordered-8x8");
        assert!((config.brightness + 20.0).abs() < f32::EPSILON);
        assert_eq!(config.highlight_color, HexColor([255, 0, 0]));
        assert_eq!(config.tonal_mapping_type, TonalMapping::SingleColor);
        assert_eq!(config.noise_seed, Some(9));
    }

    #[test]
    fn defaults_match_library() {
        let cli = Cli::parse_from(["ditherlay", "in.png", "-o", "out.png"]);
        let config = config_from_cli(&cli).unwrap();
        let library = PipelineConfig::default();
        assert_eq!(config.algorithm, library.algorithm);
        assert_eq!(config.color_depth, library.color_depth);
        assert_eq!(config.dot_size, library.dot_size);
        assert_eq!(config.midtone_color, library.midtone_color);
        assert_eq!(config.halftone_color_mode, library.halftone_color_mode);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::parse_from([
            "ditherlay",
            "in.png",
            "-o",
            "out.png",
            "--color-depth",
            "9",
            "--config-json",
            r#"{"algorithm":"halftone-circles"}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.algorithm, Algorithm::HalftoneCircles);
        assert_eq!(config.color_depth, PipelineConfig::DEFAULT_COLOR_DEPTH);
    }

    #[test]
    fn bad_config_json_is_an_error() {
        let cli = Cli::parse_from(["ditherlay", "in.png", "-o", "out.png", "--config-json", "{"]);
        assert!(config_from_cli(&cli).is_err());
    }
}
