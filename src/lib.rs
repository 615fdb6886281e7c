pub mod config;
pub mod dsp;
pub mod error;
pub mod events;
pub mod layers;
pub mod noise;
pub mod random;
pub mod scheduler;
pub mod soundscape;
pub mod voice;

pub use config::{ParamRange, SoundscapeConfig};
pub use error::SoundscapeError;
pub use events::{BurstEvent, CallEvent, EventKind, TransientEvent};
pub use random::{ParamSource, ScriptedParams, SeededParams};
pub use soundscape::{FiredEvent, PlaybackState, Soundscape};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WASM-exposed: return the soundscape_core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed soundscape handle. The page owns one and calls `toggle`
/// from its play/stop control, and `render` from its audio callback.
#[wasm_bindgen]
pub struct WasmSoundscape {
    inner: Soundscape,
}

#[wasm_bindgen]
impl WasmSoundscape {
    /// Reference patch at the host's sample rate.
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, seed: u32) -> Result<WasmSoundscape, JsValue> {
        let config = SoundscapeConfig::with_sample_rate(sample_rate);
        let inner = Soundscape::with_seed(config, seed as u64).map_err(js_err)?;
        Ok(WasmSoundscape { inner })
    }

    /// Build from a (possibly partial) config object.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: JsValue, seed: u32) -> Result<WasmSoundscape, JsValue> {
        let config: SoundscapeConfig = serde_wasm_bindgen::from_value(config).map_err(js_err)?;
        let inner = Soundscape::with_seed(config, seed as u64).map_err(js_err)?;
        Ok(WasmSoundscape { inner })
    }

    pub fn init(&mut self) -> Result<(), JsValue> {
        self.inner.init().map_err(js_err)
    }

    /// Returns whether the soundscape is now playing.
    pub fn toggle(&mut self) -> bool {
        self.inner.toggle()
    }

    #[wasm_bindgen(js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.inner.is_playing()
    }

    /// Fill a mono block.
    pub fn render(&mut self, out: &mut [f32]) {
        self.inner.render(out);
    }

    /// Fill an interleaved stereo block.
    #[wasm_bindgen(js_name = renderStereo)]
    pub fn render_stereo(&mut self, out: &mut [f32]) {
        self.inner.render_stereo_interleaved(out);
    }
}

/// WASM-exposed: render the reference patch to a WAV byte array.
#[wasm_bindgen]
pub fn render_soundscape_wav(seconds: f64, sample_rate: f64, seed: u32) -> Result<Vec<u8>, JsValue> {
    let config = SoundscapeConfig::with_sample_rate(sample_rate);
    dsp::renderer::render_wav(config, seed as u64, seconds).map_err(js_err)
}
