//! Sine oscillator driven by per-sample frequency and detune.

use std::f64::consts::TAU;

/// Phase-accumulating sine oscillator.
///
/// Frequency and detune are supplied on every sample so automation and LFO
/// modulation reach the oscillator without a separate parameter update step.
#[derive(Debug, Clone)]
pub struct SineOscillator {
    phase: f64,
    sample_rate: f64,
}

impl SineOscillator {
    pub fn new(sample_rate: f64) -> Self {
        SineOscillator {
            phase: 0.0,
            sample_rate,
        }
    }

    /// Effective frequency accounting for detune (in cents).
    pub fn effective_freq(frequency: f64, detune_cents: f64) -> f64 {
        frequency * (2.0_f64).powf(detune_cents / 1200.0)
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self, frequency: f64, detune_cents: f64) -> f64 {
        let sample = (TAU * self.phase).sin();

        let inc = Self::effective_freq(frequency, detune_cents) / self.sample_rate;
        // Negative or runaway frequencies still wrap into [0, 1).
        self.phase = (self.phase + inc).rem_euclid(1.0);

        sample
    }
}
