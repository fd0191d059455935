pub mod automation;
pub mod curve;
pub mod envelope;
pub mod error;
pub mod render;
pub mod settings;
pub mod timeline;

pub use curve::{CurveKind, CurvePolicy, Stage};
pub use envelope::{Envelope, EnvelopeState, GainStages};
pub use error::{EnvelopeError, InvalidState};
pub use settings::{EnvelopeConfig, Settings, resolve};
pub use timeline::{EnvelopeEvent, EventKind, ReleaseSchedule};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the envelope-generator-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a JSON settings object and resolve it into a complete config.
pub fn resolve_json(json: &str) -> Result<EnvelopeConfig, EnvelopeError> {
    Ok(resolve(&Settings::from_json(json)?))
}

fn settings_from_js(settings: JsValue) -> Result<Settings, JsValue> {
    serde_wasm_bindgen::from_value(settings).map_err(|e| JsValue::from_str(&format!("{e}")))
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: resolve a settings object into the config actually used.
#[wasm_bindgen]
pub fn resolve_settings(settings: JsValue) -> Result<JsValue, JsValue> {
    to_js(&resolve(&settings_from_js(settings)?))
}

/// WASM-exposed: automation events for delay through sustain, starting at `when`.
#[wasm_bindgen]
pub fn attack_decay_schedule(settings: JsValue, when: f64) -> Result<JsValue, JsValue> {
    let config = resolve(&settings_from_js(settings)?);
    to_js(&timeline::build_attack_decay(&config, when))
}

/// WASM-exposed: release events and effective release time, starting at `when`.
#[wasm_bindgen]
pub fn release_schedule(settings: JsValue, when: f64) -> Result<JsValue, JsValue> {
    let config = resolve(&settings_from_js(settings)?);
    to_js(&timeline::build_release(&config, when))
}

/// WASM-exposed: render the envelope's output to a mono WAV byte array.
/// A negative `release` means the envelope is never released.
#[wasm_bindgen]
pub fn render_envelope_wav(
    settings: JsValue,
    start: f64,
    release: f64,
    sample_rate: u32,
    duration: f64,
) -> Result<Vec<u8>, JsValue> {
    let settings = settings_from_js(settings)?;
    let release = (release >= 0.0).then_some(release);
    render::render_envelope_wav(&settings, start, release, sample_rate, duration)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render the envelope's output level as f32 samples for
/// previews. A negative `release` means the envelope is never released.
#[wasm_bindgen]
pub fn render_envelope_samples(
    settings: JsValue,
    start: f64,
    release: f64,
    sample_rate: u32,
    duration: f64,
) -> Result<Vec<f32>, JsValue> {
    let settings = settings_from_js(settings)?;
    let release = (release >= 0.0).then_some(release);
    let levels = render::render_levels(&settings, start, release, sample_rate as f64, duration)
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(levels.iter().map(|&l| l as f32).collect())
}
