//! Random parameter provider.
//!
//! Every randomized quantity in the soundscape (detune, LFO rates, event
//! durations, sweep targets, filter centers, scheduling delays, noise
//! samples) is drawn through [`ParamSource`], so a session is reproducible
//! from its seed and tests can script exact sequences.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::config::ParamRange;

/// Source of uniform random numbers.
pub trait ParamSource {
    /// Uniform sample in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform sample in the half-open interval `[min, max)`.
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        let v = min + (max - min) * self.unit();
        // Rounding can land exactly on `max` for u just below 1.
        if v >= max && max > min {
            (max - (max - min) * f64::EPSILON).max(min)
        } else {
            v
        }
    }

    /// Draw from `range`. A degenerate range returns its value without
    /// consuming a draw.
    fn sample(&mut self, range: &ParamRange) -> f64 {
        if range.min == range.max {
            range.min
        } else {
            self.uniform(range.min, range.max)
        }
    }

    /// Uniform sample in `[-spread, spread)`.
    fn bipolar(&mut self, spread: f64) -> f64 {
        self.uniform(-spread, spread)
    }
}

/// PCG-backed provider with an explicit seed.
#[derive(Debug, Clone)]
pub struct SeededParams {
    rng: Pcg64Mcg,
}

impl SeededParams {
    pub fn new(seed: u64) -> Self {
        SeededParams {
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }
}

impl ParamSource for SeededParams {
    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed list of unit values, cycling when exhausted.
///
/// Values are clamped into `[0, 1)`.
#[derive(Debug, Clone)]
pub struct ScriptedParams {
    values: Vec<f64>,
    next: usize,
}

impl ScriptedParams {
    pub fn new(values: Vec<f64>) -> Self {
        ScriptedParams { values, next: 0 }
    }

    /// Every draw returns the same value.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.next
    }
}

impl ParamSource for ScriptedParams {
    fn unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let v = self.values[self.next % self.values.len()];
        self.next += 1;
        v.clamp(0.0, 1.0 - f64::EPSILON)
    }
}
