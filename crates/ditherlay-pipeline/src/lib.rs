//! ditherlay-pipeline: Pure pixel-processing pipeline (sans-IO).
//!
//! Turns an RGBA buffer into a stylised overlay through:
//! tone adjustment -> dot-scale + dither (or a pattern renderer) ->
//! colour mapping -> overlay alpha.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers. Files live in the `ditherlay` CLI and the browser in
//! `ditherlay-worker`; both reach the pipeline through the
//! [`host::PixelHost`] seam or the functions below.

pub mod color_map;
pub mod diagnostics;
pub mod diffusion;
pub mod dither;
pub mod halftone;
pub mod host;
pub mod ordered;
pub mod overlay;
pub mod pipeline;
pub mod resample;
pub mod tone;
pub mod types;
pub mod wavy;

pub use color_map::TonalMapping;
pub use diffusion::DiffusionKernel;
pub use dither::{Algorithm, Ditherer};
pub use halftone::HalftoneColorMode;
pub use host::{Bounds, PixelHost, RenderError, render_overlay};
pub use ordered::BayerSize;
pub use pipeline::Pipeline;
pub use types::{Dimensions, HexColor, PipelineConfig, PipelineError, RgbaImage, StagedResult};
pub use wavy::WavyLineColorMode;

/// Run the full pipeline over a raw RGBA buffer.
///
/// `pixels` must hold exactly `width * height * 4` bytes. The returned
/// buffer has the same size and layout.
///
/// # Pipeline steps
///
/// 1. Brightness, contrast, blur, noise, denoise, sharpen
/// 2. Dot-scale down, dither, scale up (or a pattern renderer)
/// 3. Luminance colour mapping
/// 4. Overlay alpha from the difference to the input
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if the buffer length does
/// not match the dimensions.
pub fn process(
    pixels: &[u8],
    width: u32,
    height: u32,
    config: &PipelineConfig,
) -> Result<Vec<u8>, PipelineError> {
    let image = types::image_from_raw(pixels.to_vec(), width, height)?;
    Ok(process_image(image, config)?.into_raw())
}

/// Run the pipeline and write the result back into `pixels`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidDimensions`] if the buffer length does
/// not match the dimensions; `pixels` is left untouched in that case.
pub fn process_in_place(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    config: &PipelineConfig,
) -> Result<(), PipelineError> {
    let output = process(pixels, width, height, config)?;
    pixels.copy_from_slice(&output);
    Ok(())
}

/// Run the pipeline over an owned image and return only the output.
///
/// # Errors
///
/// Returns [`PipelineError`] if a stage fails.
pub fn process_image(
    image: RgbaImage,
    config: &PipelineConfig,
) -> Result<RgbaImage, PipelineError> {
    Ok(process_staged(image, config)?.output)
}

/// Run the pipeline, keeping every intermediate buffer.
///
/// # Errors
///
/// Returns [`PipelineError`] if a stage fails.
pub fn process_staged(
    image: RgbaImage,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image, config.clone())
        .adjust_tone()
        .dither()
        .map_colors()
        .composite()?
        .into_result())
}
