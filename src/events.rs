//! Transient events: pitch-swept calls and filtered noise bursts.
//!
//! Each `fire_*` call samples fresh parameters, builds a self-contained
//! subgraph feeding `output`, schedules all of its automation relative to
//! `now`, and hands the nodes back to the graph with a disposal time. The
//! caller keeps nothing but the returned description of what was played.

use std::sync::Arc;

use tracing::debug;

use crate::config::{BurstConfig, CallConfig};
use crate::dsp::filter::FilterType;
use crate::dsp::graph::{AudioGraph, NodeId};
use crate::dsp::param::ParamKind;
use crate::error::Result;
use crate::noise::{frames_for, make_buffer};
use crate::random::ParamSource;

/// WebAudio's default lowpass resonance (1 dB) as a linear Q.
const ECHO_LOWPASS_Q: f64 = 1.122_018_454_301_963_3;

/// The two kinds of transient event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Call,
    Burst,
}

/// Parameters a fired call was played with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallEvent {
    pub start_time: f64,
    pub duration: f64,
    pub start_freq: f64,
    /// Unclamped `start_freq ± glide`.
    pub end_freq: f64,
    /// Frequency targets of the two exponential ramps (clamped above zero).
    pub sweep_target: f64,
    pub fall_target: f64,
    pub stop_time: f64,
    /// When the graph tears the call's nodes down.
    pub release_time: f64,
}

impl CallEvent {
    /// Every frequency the oscillator is driven to.
    pub fn frequency_targets(&self) -> [f64; 3] {
        [self.start_freq, self.sweep_target, self.fall_target]
    }
}

/// Parameters a fired burst was played with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstEvent {
    pub start_time: f64,
    pub duration: f64,
    pub frames: usize,
    pub center: f64,
    pub q: f64,
    pub peak: f64,
    pub release_time: f64,
}

/// Either kind of fired event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransientEvent {
    Call(CallEvent),
    Burst(BurstEvent),
}

impl TransientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransientEvent::Call(_) => EventKind::Call,
            TransientEvent::Burst(_) => EventKind::Burst,
        }
    }

    pub fn start_time(&self) -> f64 {
        match self {
            TransientEvent::Call(c) => c.start_time,
            TransientEvent::Burst(b) => b.start_time,
        }
    }
}

/// Play one call: a sine gliding toward a nearby pitch and then falling,
/// under a slow swell, with a single echo, all through a dark lowpass.
pub fn fire_call(
    graph: &mut AudioGraph,
    config: &CallConfig,
    rng: &mut dyn ParamSource,
    output: NodeId,
    now: f64,
) -> Result<CallEvent> {
    let duration = rng.sample(&config.duration);
    let start_freq = rng.sample(&config.start_freq);
    let end_freq = start_freq + rng.bipolar(config.glide);
    let sweep_target = end_freq.max(config.min_freq);
    let fall_target = (start_freq * config.fall_ratio).max(config.min_freq);
    let end = now + duration;

    let osc = graph.create_oscillator(start_freq);
    let freq = graph.param_mut(osc, ParamKind::Frequency)?;
    freq.set_value_at_time(start_freq, now)?;
    freq.exponential_ramp_to_value_at_time(sweep_target, now + duration * config.sweep_fraction)?;
    freq.exponential_ramp_to_value_at_time(fall_target, end)?;

    let envelope = graph.create_gain(0.0);
    let gain = graph.param_mut(envelope, ParamKind::Gain)?;
    gain.set_value_at_time(0.0, now)?;
    gain.linear_ramp_to_value_at_time(config.peak, now + duration * config.attack_fraction)?;
    gain.set_value_at_time(config.peak, now + duration * config.hold_fraction)?;
    gain.linear_ramp_to_value_at_time(0.0, end)?;

    let delay = graph.create_delay(config.echo_delay);
    let echo = graph.create_gain(config.echo_gain);
    let lowpass = graph.create_biquad(FilterType::Lowpass, config.lowpass, ECHO_LOWPASS_Q);

    graph.connect(osc, envelope)?;
    graph.connect(envelope, lowpass)?;
    graph.connect(envelope, delay)?;
    graph.connect(delay, echo)?;
    graph.connect(echo, lowpass)?;
    graph.connect(lowpass, output)?;

    let stop_time = end + config.stop_margin;
    graph.start(osc, now)?;
    graph.stop(osc, stop_time)?;

    let release_time = stop_time + config.echo_delay;
    graph.dispose_at(vec![osc, envelope, delay, echo, lowpass], release_time);

    debug!(duration, start_freq, end_freq, now, "call fired");
    Ok(CallEvent {
        start_time: now,
        duration,
        start_freq,
        end_freq,
        sweep_target,
        fall_target,
        stop_time,
        release_time,
    })
}

/// Play one burst: a fresh slice of white noise through a resonant bandpass
/// with a fast attack and linear decay.
pub fn fire_burst(
    graph: &mut AudioGraph,
    config: &BurstConfig,
    rng: &mut dyn ParamSource,
    output: NodeId,
    now: f64,
) -> Result<BurstEvent> {
    let sample_rate = graph.sample_rate();
    let duration = rng.sample(&config.duration);
    let frames = frames_for(duration, sample_rate);
    let buffer = Arc::new(make_buffer(rng, 1, frames, sample_rate));
    let center = rng.sample(&config.center);
    let q = rng.sample(&config.q);
    let peak = rng.sample(&config.peak);
    let end = now + duration;

    let source = graph.create_buffer_source(buffer, false);
    let bandpass = graph.create_biquad(FilterType::Bandpass, center, q);
    let envelope = graph.create_gain(0.0);

    let gain = graph.param_mut(envelope, ParamKind::Gain)?;
    gain.set_value_at_time(0.0, now)?;
    gain.linear_ramp_to_value_at_time(peak, now + config.attack)?;
    gain.linear_ramp_to_value_at_time(0.0, end)?;

    graph.connect(source, bandpass)?;
    graph.connect(bandpass, envelope)?;
    graph.connect(envelope, output)?;
    graph.start(source, now)?;

    graph.dispose_at(vec![source, bandpass, envelope], end);

    debug!(duration, center, q, now, "burst fired");
    Ok(BurstEvent {
        start_time: now,
        duration,
        frames,
        center,
        q,
        peak,
        release_time: end,
    })
}
