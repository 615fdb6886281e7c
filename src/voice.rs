//! Voice: one continuous sine tone, optionally LFO-modulated.

use crate::dsp::graph::{AudioGraph, NodeId};
use crate::dsp::param::ParamKind;
use crate::error::Result;

/// Which parameter of the voice an LFO moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModTarget {
    /// The voice gain (tremolo / swell).
    Amplitude,
    /// The oscillator frequency (pitch wobble), in Hz.
    Frequency,
}

/// Low-frequency modulation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoSpec {
    pub rate: f64,
    /// Peak deviation added to the target parameter.
    pub depth: f64,
    pub target: ModTarget,
}

/// Parameters of one continuous voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSpec {
    pub frequency: f64,
    pub amplitude: f64,
    pub detune: f64,
    pub lfo: Option<LfoSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfoHandle {
    pub oscillator: NodeId,
    pub depth: NodeId,
}

/// Nodes making up a built voice. There is no stop: a voice
/// lives as long as the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceHandle {
    pub oscillator: NodeId,
    pub gain: NodeId,
    pub lfo: Option<LfoHandle>,
}

/// Build `osc → gain → destination`, plus `lfo → depth → target param` when
/// requested, and start every oscillator at the current time.
pub fn build_voice(graph: &mut AudioGraph, spec: &VoiceSpec, destination: NodeId) -> Result<VoiceHandle> {
    let now = graph.current_time();

    let oscillator = graph.create_oscillator(spec.frequency);
    graph.param_mut(oscillator, ParamKind::Detune)?.set_value(spec.detune);
    let gain = graph.create_gain(spec.amplitude);
    graph.connect(oscillator, gain)?;
    graph.connect(gain, destination)?;

    let lfo = match spec.lfo {
        Some(lfo) => {
            let lfo_osc = graph.create_oscillator(lfo.rate);
            let depth = graph.create_gain(lfo.depth);
            graph.connect(lfo_osc, depth)?;
            let (node, param) = match lfo.target {
                ModTarget::Amplitude => (gain, ParamKind::Gain),
                ModTarget::Frequency => (oscillator, ParamKind::Frequency),
            };
            graph.connect_param(depth, node, param)?;
            graph.start(lfo_osc, now)?;
            Some(LfoHandle {
                oscillator: lfo_osc,
                depth,
            })
        }
        None => None,
    };

    graph.start(oscillator, now)?;

    Ok(VoiceHandle { oscillator, gain, lfo })
}
