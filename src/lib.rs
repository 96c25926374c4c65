pub mod config;
pub mod dsp;
pub mod error;
pub mod melody;
pub mod tuning;

use crate::config::SynthConfig;
use crate::dsp::buffer::SampleBuffer;
use crate::dsp::renderer::MelodyRenderer;
use crate::error::SynthError;
use crate::melody::Melody;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the overtone-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Render a melody with a fresh renderer built from `config`.
pub fn render_melody(config: &SynthConfig, melody: &Melody) -> Result<SampleBuffer, SynthError> {
    MelodyRenderer::from_config(config)?.render(melody)
}

/// WASM-exposed: render a melody (an array of `{name, octave, duration,
/// denominator}` notes) to mono f32 samples in [-1, 1].
/// `config_json` may be `"{}"` for the defaults.
#[wasm_bindgen]
pub fn render_melody_samples(config_json: &str, melody: JsValue) -> Result<Vec<f32>, JsValue> {
    let config =
        SynthConfig::from_json(config_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let melody: Melody =
        serde_wasm_bindgen::from_value(melody).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let song = render_melody(&config, &melody).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(song.to_f32())
}

/// WASM-exposed: the default configuration as pretty JSON, for hosts to
/// edit and pass back to `render_melody_samples`.
#[wasm_bindgen]
pub fn default_config_json() -> Result<String, JsValue> {
    SynthConfig::default()
        .to_json()
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}
