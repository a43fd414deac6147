//! Web worker entry point for ditherlay pixel processing.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. It receives an RGBA buffer and a `PipelineConfig` via
//! `postMessage`, runs the pipeline, and posts the overlay back.
//!
//! Pixels cross the boundary as raw `Uint8Array` buffers, never as JSON
//! number arrays. Only the configuration, errors and the optional
//! diagnostics travel as JSON strings.
//!
//! Running the pipeline in a worker keeps the host's main thread free
//! while a large selection is being dithered.

use std::time::Duration;

use ditherlay_pipeline::diagnostics::{Clock, process_staged_with_diagnostics};
use ditherlay_pipeline::types::image_from_raw;
use ditherlay_pipeline::{PipelineConfig, PipelineError, RgbaImage};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_time::Instant;

/// [`Clock`] backed by `performance.now()` through `web-time`.
struct WebClock;

impl Clock for WebClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// A decoded request.
struct Request {
    generation: f64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    config_json: String,
    diagnostics: bool,
}

/// Message protocol: the main thread sends a JS object with:
/// - `pixels`: `Uint8Array` of `width * height * 4` RGBA bytes
/// - `width`, `height`: `f64` image dimensions
/// - `configJson`: `String` containing a JSON `PipelineConfig`
/// - `generation`: `f64` generation counter (passed through to response)
/// - `diagnostics`: optional `bool`, include per-stage diagnostics
///
/// On success the worker responds with a JS object containing:
/// - `generation`: `f64` matching the request generation
/// - `ok`: `true`
/// - `width`, `height`: `f64`
/// - `pixels`: `Uint8Array`, the processed RGBA overlay
/// - `diagnosticsJson`: `String`, only when requested
///
/// On error the worker responds with:
/// - `generation`: `f64`
/// - `ok`: `false`
/// - `errorJson`: `String`, a JSON-serialized `PipelineError`
///
/// # Worker entry point
///
/// Called automatically when the WASM module is instantiated in the
/// worker context.
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .expect_throw("not running in a DedicatedWorkerGlobalScope");

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // lives for the worker lifetime
}

/// Read one field off the message object.
fn field(data: &JsValue, name: &str) -> Result<JsValue, String> {
    js_sys::Reflect::get(data, &JsValue::from_str(name))
        .map_err(|_| format!("missing {name} field"))
}

/// Read a non-negative integer field.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dimension(data: &JsValue, name: &str) -> Result<u32, String> {
    let value = field(data, name)?
        .as_f64()
        .ok_or_else(|| format!("{name} is not a number"))?;
    if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) && value.fract() == 0.0 {
        Ok(value as u32)
    } else {
        Err(format!("{name} is not a valid dimension: {value}"))
    }
}

fn read_request(data: &JsValue) -> Result<Request, String> {
    let generation = field(data, "generation")?
        .as_f64()
        .ok_or("generation is not a number")?;
    let pixels: js_sys::Uint8Array = field(data, "pixels")?
        .dyn_into()
        .map_err(|_| "pixels is not a Uint8Array")?;
    let config_json = field(data, "configJson")?
        .as_string()
        .ok_or("configJson is not a string")?;
    let diagnostics = field(data, "diagnostics")?.as_bool().unwrap_or(false);
    Ok(Request {
        generation,
        width: dimension(data, "width")?,
        height: dimension(data, "height")?,
        pixels: pixels.to_vec(),
        config_json,
        diagnostics,
    })
}

/// Handle an incoming message from the main thread.
fn handle_message(event: &web_sys::MessageEvent) {
    let data = event.data();
    let generation = js_sys::Reflect::get(&data, &JsValue::from_str("generation"))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(f64::NAN);

    let request = match read_request(&data) {
        Ok(request) => request,
        Err(msg) => {
            post_error(generation, &PipelineError::InvalidConfig(msg));
            return;
        }
    };

    match run(request) {
        Ok((generation, image, diagnostics_json)) => {
            post_success(generation, &image, diagnostics_json.as_deref());
        }
        Err(e) => post_error(generation, &e),
    }
}

/// Run the pipeline (synchronous, blocks this worker thread only).
fn run(request: Request) -> Result<(f64, RgbaImage, Option<String>), PipelineError> {
    let config: PipelineConfig = serde_json::from_str(&request.config_json)
        .map_err(|e| PipelineError::InvalidConfig(format!("failed to parse config: {e}")))?;
    let image = image_from_raw(request.pixels, request.width, request.height)?;

    if !request.diagnostics {
        return Ok((request.generation, ditherlay_pipeline::process_image(image, &config)?, None));
    }

    let (staged, diagnostics) = process_staged_with_diagnostics(&image, &config, &WebClock)?;
    let json = serde_json::to_string(&diagnostics).map_err(|e| {
        PipelineError::InvalidConfig(format!("failed to serialize diagnostics: {e}"))
    })?;
    Ok((request.generation, staged.output, Some(json)))
}

/// Post the processed overlay back to the main thread.
fn post_success(generation: f64, image: &RgbaImage, diagnostics_json: Option<&str>) {
    let response = js_sys::Object::new();
    let set = |key: &str, val: &JsValue| {
        js_sys::Reflect::set(&response, &JsValue::from_str(key), val)
            .expect_throw("failed to set response field");
    };

    set("generation", &JsValue::from_f64(generation));
    set("ok", &JsValue::from_bool(true));
    set("width", &JsValue::from_f64(f64::from(image.width())));
    set("height", &JsValue::from_f64(f64::from(image.height())));
    set("pixels", &js_sys::Uint8Array::from(image.as_raw().as_slice()));
    if let Some(json) = diagnostics_json {
        set("diagnosticsJson", &JsValue::from_str(json));
    }

    post(&response);
}

/// Post an error response back to the main thread.
fn post_error(generation: f64, error: &PipelineError) {
    let error_json = serde_json::to_string(error)
        .unwrap_or_else(|ser_err| format!("\"serialization error: {ser_err}\""));

    let response = js_sys::Object::new();
    let set = |key: &str, val: &JsValue| {
        let _ = js_sys::Reflect::set(&response, &JsValue::from_str(key), val);
    };
    set("generation", &JsValue::from_f64(generation));
    set("ok", &JsValue::from_bool(false));
    set("errorJson", &JsValue::from_str(&error_json));

    post(&response);
}

fn post(response: &js_sys::Object) {
    if let Ok(global) = js_sys::global().dyn_into::<web_sys::DedicatedWorkerGlobalScope>() {
        let _ = global.post_message(response);
    }
}
