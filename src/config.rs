//! Patch configuration.
//!
//! The soundscape is one fixed patch; this module names its constants and
//! random ranges so hosts can load a variation from JSON. `Default` is the
//! reference patch. Field names serialize in camelCase to match the
//! browser-side host.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoundscapeError};

/// Longest noise texture loop, in seconds.
pub const MAX_TEXTURE_SECONDS: f64 = 60.0;
/// Most channels a noise buffer may have.
pub const MAX_CHANNELS: usize = 32;
/// Longest burst, in seconds.
pub const MAX_BURST_SECONDS: f64 = 10.0;
/// Longest call echo delay, in seconds.
pub const MAX_ECHO_DELAY: f64 = 10.0;

/// Half-open interval `[min, max)` that a random parameter is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub const fn new(min: f64, max: f64) -> Self {
        ParamRange { min, max }
    }

    /// A degenerate range that always yields `value`.
    pub const fn fixed(value: f64) -> Self {
        ParamRange { min: value, max: value }
    }

    pub fn contains(&self, value: f64) -> bool {
        if self.min == self.max {
            value == self.min
        } else {
            value >= self.min && value < self.max
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(invalid(format!("{name}: bad range [{}, {})", self.min, self.max)));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> SoundscapeError {
    SoundscapeError::InvalidConfig(msg)
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and > 0, got {value}")))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite and >= 0, got {value}")))
    }
}

fn check_at_most(name: &str, value: f64, max: f64) -> Result<()> {
    if value <= max {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be at most {max}, got {value}")))
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must lie in [0, 1], got {value}")))
    }
}

/// Master bus level and fade shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MasterConfig {
    /// Gain the bus approaches while playing.
    pub play_level: f64,
    /// Time constant (s) of the fade toward `play_level`.
    pub fade_in: f64,
    /// Time constant (s) of the fade toward silence.
    pub fade_out: f64,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            play_level: 0.7,
            fade_in: 0.8,
            fade_out: 0.5,
        }
    }
}

/// The detuned sine cluster plus the sub-bass hum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DroneConfig {
    /// Level of the shared drone bus.
    pub bus_gain: f64,
    /// Base frequencies (Hz) of the cluster voices.
    pub frequencies: Vec<f64>,
    /// Per-voice amplitudes, parallel to `frequencies`.
    pub amplitudes: Vec<f64>,
    /// Detune is drawn uniformly from `±detune_spread` cents.
    pub detune_spread: f64,
    /// Per-voice amplitude LFO rate (Hz).
    pub lfo_rate: ParamRange,
    /// Amplitude LFO depth as a fraction of the voice amplitude.
    pub lfo_depth_ratio: f64,
    pub sub_bass: SubBassConfig,
}

impl Default for DroneConfig {
    fn default() -> Self {
        DroneConfig {
            bus_gain: 0.15,
            frequencies: vec![48.0, 55.0, 72.0, 82.5, 110.0, 147.0],
            amplitudes: vec![0.15, 0.12, 0.06, 0.08, 0.04, 0.02],
            detune_spread: 4.0,
            lfo_rate: ParamRange::new(0.03, 0.08),
            lfo_depth_ratio: 0.3,
            sub_bass: SubBassConfig::default(),
        }
    }
}

/// Sub-bass voice with slow pitch wobble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubBassConfig {
    pub frequency: f64,
    pub amplitude: f64,
    pub lfo_rate: f64,
    /// Peak pitch swing in Hz.
    pub lfo_depth: f64,
}

impl Default for SubBassConfig {
    fn default() -> Self {
        SubBassConfig {
            frequency: 30.0,
            amplitude: 0.08,
            lfo_rate: 0.02,
            lfo_depth: 5.0,
        }
    }
}

/// Looping band-passed noise bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextureConfig {
    /// Length of the looped noise buffer in seconds.
    pub buffer_seconds: f64,
    pub channels: usize,
    pub center: f64,
    pub q: f64,
    pub level: f64,
    pub lfo_rate: f64,
    /// Peak sweep of the bandpass center in Hz.
    pub lfo_depth: f64,
}

impl Default for TextureConfig {
    fn default() -> Self {
        TextureConfig {
            buffer_seconds: 4.0,
            channels: 2,
            center: 400.0,
            q: 0.8,
            level: 0.012,
            lfo_rate: 0.07,
            lfo_depth: 200.0,
        }
    }
}

/// Slow pitch-swept tonal calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallConfig {
    /// Event length in seconds.
    pub duration: ParamRange,
    pub start_freq: ParamRange,
    /// End frequency is `start ± glide` Hz.
    pub glide: f64,
    /// Fraction of the duration spent sweeping toward the end frequency.
    pub sweep_fraction: f64,
    /// Final pitch as a ratio of the start frequency.
    pub fall_ratio: f64,
    /// Floor for exponential ramp targets.
    pub min_freq: f64,
    pub peak: f64,
    pub attack_fraction: f64,
    /// The envelope holds the peak until this fraction, then fades out.
    pub hold_fraction: f64,
    /// Seconds the oscillator keeps running after the envelope closes.
    pub stop_margin: f64,
    pub echo_delay: f64,
    pub echo_gain: f64,
    pub lowpass: f64,
    /// Milliseconds between calls.
    pub interval_ms: ParamRange,
    /// Milliseconds before the first call after play starts.
    pub first_delay_ms: ParamRange,
}

impl Default for CallConfig {
    fn default() -> Self {
        CallConfig {
            duration: ParamRange::new(3.0, 7.0),
            start_freq: ParamRange::new(120.0, 200.0),
            glide: 30.0,
            sweep_fraction: 0.6,
            fall_ratio: 0.8,
            min_freq: 1.0,
            peak: 0.015,
            attack_fraction: 0.15,
            hold_fraction: 0.5,
            stop_margin: 0.5,
            echo_delay: 0.3,
            echo_gain: 0.3,
            lowpass: 300.0,
            interval_ms: ParamRange::new(8000.0, 23000.0),
            first_delay_ms: ParamRange::new(3000.0, 8000.0),
        }
    }
}

/// Short band-passed noise pops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BurstConfig {
    pub duration: ParamRange,
    pub center: ParamRange,
    pub q: ParamRange,
    pub peak: ParamRange,
    /// Seconds to reach the peak.
    pub attack: f64,
    pub interval_ms: ParamRange,
    pub first_delay_ms: ParamRange,
}

impl Default for BurstConfig {
    fn default() -> Self {
        BurstConfig {
            duration: ParamRange::new(0.05, 0.2),
            center: ParamRange::new(1500.0, 4500.0),
            q: ParamRange::new(5.0, 15.0),
            peak: ParamRange::new(0.008, 0.018),
            attack: 0.01,
            interval_ms: ParamRange::new(200.0, 2200.0),
            first_delay_ms: ParamRange::fixed(500.0),
        }
    }
}

/// Complete patch description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SoundscapeConfig {
    pub sample_rate: f64,
    pub master: MasterConfig,
    pub drone: DroneConfig,
    pub texture: TextureConfig,
    pub call: CallConfig,
    pub burst: BurstConfig,
}

impl Default for SoundscapeConfig {
    fn default() -> Self {
        SoundscapeConfig {
            sample_rate: 44100.0,
            master: MasterConfig::default(),
            drone: DroneConfig::default(),
            texture: TextureConfig::default(),
            call: CallConfig::default(),
            burst: BurstConfig::default(),
        }
    }
}

impl SoundscapeConfig {
    /// Reference patch at a given sample rate.
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        SoundscapeConfig {
            sample_rate,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON patch; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SoundscapeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every field except the sample rate, which is a device
    /// property and is checked when the audio context comes up.
    pub fn validate(&self) -> Result<()> {
        let m = &self.master;
        check_non_negative("master.playLevel", m.play_level)?;
        check_positive("master.fadeIn", m.fade_in)?;
        check_positive("master.fadeOut", m.fade_out)?;

        let d = &self.drone;
        if d.frequencies.is_empty() {
            return Err(invalid("drone.frequencies must not be empty".into()));
        }
        if d.frequencies.len() != d.amplitudes.len() {
            return Err(invalid(format!(
                "drone has {} frequencies but {} amplitudes",
                d.frequencies.len(),
                d.amplitudes.len()
            )));
        }
        for &f in &d.frequencies {
            check_positive("drone.frequencies", f)?;
        }
        for &a in &d.amplitudes {
            check_non_negative("drone.amplitudes", a)?;
        }
        check_non_negative("drone.busGain", d.bus_gain)?;
        check_non_negative("drone.detuneSpread", d.detune_spread)?;
        d.lfo_rate.check("drone.lfoRate")?;
        check_positive("drone.lfoRate.min", d.lfo_rate.min)?;
        check_non_negative("drone.lfoDepthRatio", d.lfo_depth_ratio)?;
        check_positive("drone.subBass.frequency", d.sub_bass.frequency)?;
        check_non_negative("drone.subBass.amplitude", d.sub_bass.amplitude)?;
        check_positive("drone.subBass.lfoRate", d.sub_bass.lfo_rate)?;
        check_non_negative("drone.subBass.lfoDepth", d.sub_bass.lfo_depth)?;

        let t = &self.texture;
        check_positive("texture.bufferSeconds", t.buffer_seconds)?;
        check_at_most("texture.bufferSeconds", t.buffer_seconds, MAX_TEXTURE_SECONDS)?;
        if !(1..=MAX_CHANNELS).contains(&t.channels) {
            return Err(invalid(format!(
                "texture.channels must lie in [1, {MAX_CHANNELS}], got {}",
                t.channels
            )));
        }
        check_positive("texture.center", t.center)?;
        check_positive("texture.q", t.q)?;
        check_non_negative("texture.level", t.level)?;
        check_positive("texture.lfoRate", t.lfo_rate)?;
        check_non_negative("texture.lfoDepth", t.lfo_depth)?;

        let c = &self.call;
        c.duration.check("call.duration")?;
        check_positive("call.duration.min", c.duration.min)?;
        c.start_freq.check("call.startFreq")?;
        check_positive("call.startFreq.min", c.start_freq.min)?;
        check_non_negative("call.glide", c.glide)?;
        check_fraction("call.sweepFraction", c.sweep_fraction)?;
        check_positive("call.fallRatio", c.fall_ratio)?;
        check_positive("call.minFreq", c.min_freq)?;
        check_non_negative("call.peak", c.peak)?;
        check_fraction("call.attackFraction", c.attack_fraction)?;
        check_fraction("call.holdFraction", c.hold_fraction)?;
        if c.hold_fraction < c.attack_fraction {
            return Err(invalid("call.holdFraction must not precede call.attackFraction".into()));
        }
        check_non_negative("call.stopMargin", c.stop_margin)?;
        check_non_negative("call.echoDelay", c.echo_delay)?;
        check_at_most("call.echoDelay", c.echo_delay, MAX_ECHO_DELAY)?;
        check_non_negative("call.echoGain", c.echo_gain)?;
        check_positive("call.lowpass", c.lowpass)?;
        c.interval_ms.check("call.intervalMs")?;
        check_positive("call.intervalMs.min", c.interval_ms.min)?;
        c.first_delay_ms.check("call.firstDelayMs")?;
        check_non_negative("call.firstDelayMs.min", c.first_delay_ms.min)?;

        let b = &self.burst;
        b.duration.check("burst.duration")?;
        check_at_most("burst.duration.max", b.duration.max, MAX_BURST_SECONDS)?;
        check_non_negative("burst.attack", b.attack)?;
        if b.duration.min <= b.attack {
            return Err(invalid(format!(
                "burst.duration.min ({}) must exceed burst.attack ({})",
                b.duration.min, b.attack
            )));
        }
        b.center.check("burst.center")?;
        check_positive("burst.center.min", b.center.min)?;
        b.q.check("burst.q")?;
        check_positive("burst.q.min", b.q.min)?;
        b.peak.check("burst.peak")?;
        check_non_negative("burst.peak.min", b.peak.min)?;
        b.interval_ms.check("burst.intervalMs")?;
        check_positive("burst.intervalMs.min", b.interval_ms.min)?;
        b.first_delay_ms.check("burst.firstDelayMs")?;
        check_non_negative("burst.firstDelayMs.min", b.first_delay_ms.min)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patch_is_valid() {
        let cfg = SoundscapeConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.drone.frequencies.len(), 6);
        assert_eq!(cfg.call.interval_ms, ParamRange::new(8000.0, 23000.0));
        assert_eq!(cfg.burst.first_delay_ms, ParamRange::fixed(500.0));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = SoundscapeConfig::from_json(r#"{ "sampleRate": 48000, "master": { "playLevel": 0.5 } }"#).unwrap();
        assert_eq!(cfg.sample_rate, 48000.0);
        assert_eq!(cfg.master.play_level, 0.5);
        assert_eq!(cfg.master.fade_in, 0.8);
        assert_eq!(cfg.texture, TextureConfig::default());
    }

    #[test]
    fn json_round_trip_preserves_patch() {
        let cfg = SoundscapeConfig::with_sample_rate(22050.0);
        let json = cfg.to_json().unwrap();
        assert!(json.contains("\"firstDelayMs\""));
        let back = SoundscapeConfig::from_json(&json).unwrap();
        assert_eq!(back.sample_rate, 22050.0);
        assert_eq!(back.drone.frequencies, cfg.drone.frequencies);
        assert_eq!(back.call.interval_ms, cfg.call.interval_ms);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SoundscapeConfig::from_json("{ sampleRate: ").unwrap_err();
        assert!(matches!(err, SoundscapeError::ConfigParse(_)));
    }

    #[test]
    fn rejects_mismatched_drone_table() {
        let mut cfg = SoundscapeConfig::default();
        cfg.drone.amplitudes.pop();
        assert!(matches!(cfg.validate(), Err(SoundscapeError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_inverted_range() {
        let mut cfg = SoundscapeConfig::default();
        cfg.call.duration = ParamRange::new(7.0, 3.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_burst_shorter_than_attack() {
        let mut cfg = SoundscapeConfig::default();
        cfg.burst.duration = ParamRange::new(0.005, 0.2);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_oversized_allocations() {
        let cfg = SoundscapeConfig::from_json(r#"{ "texture": { "bufferSeconds": 1e9 } }"#);
        assert!(matches!(cfg, Err(SoundscapeError::InvalidConfig(_))));

        let mut cfg = SoundscapeConfig::default();
        cfg.call.echo_delay = 1e9;
        assert!(cfg.validate().is_err());

        let mut cfg = SoundscapeConfig::default();
        cfg.burst.duration = ParamRange::new(0.05, 1e9);
        assert!(cfg.validate().is_err());

        let mut cfg = SoundscapeConfig::default();
        cfg.texture.channels = 1_000_000;
        assert!(cfg.validate().is_err());

        let mut cfg = SoundscapeConfig::default();
        cfg.texture.buffer_seconds = MAX_TEXTURE_SECONDS;
        cfg.call.echo_delay = 0.0;
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_zero_fade() {
        let mut cfg = SoundscapeConfig::default();
        cfg.master.fade_out = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fixed_range_contains_only_its_value() {
        let r = ParamRange::fixed(500.0);
        assert!(r.contains(500.0));
        assert!(!r.contains(500.1));
        let open = ParamRange::new(1.0, 2.0);
        assert!(open.contains(1.0));
        assert!(!open.contains(2.0));
    }
}
