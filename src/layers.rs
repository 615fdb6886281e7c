//! Continuous layers: the drone bed and the noise texture.
//!
//! Both are built once when the engine comes up and then run for the life
//! of the graph. Their random choices (detune, LFO rates, the noise itself)
//! are drawn at build time, so a session keeps one fixed patch across any
//! number of play/stop cycles.

use std::sync::Arc;

use tracing::debug;

use crate::config::{DroneConfig, TextureConfig};
use crate::dsp::filter::FilterType;
use crate::dsp::graph::{AudioGraph, NodeId};
use crate::dsp::param::ParamKind;
use crate::error::Result;
use crate::noise::{frames_for, make_buffer};
use crate::random::ParamSource;
use crate::voice::{LfoSpec, ModTarget, VoiceHandle, VoiceSpec, build_voice};

/// The detuned sine cluster and sub-bass, summed on a shared bus.
#[derive(Debug, Clone)]
pub struct DroneLayer {
    pub bus: NodeId,
    /// Cluster voices in table order, followed by the sub-bass voice.
    pub voices: Vec<VoiceHandle>,
    /// The randomized settings each voice was built with.
    pub specs: Vec<VoiceSpec>,
}

impl DroneLayer {
    pub fn build(graph: &mut AudioGraph, config: &DroneConfig, rng: &mut dyn ParamSource, output: NodeId) -> Result<Self> {
        let bus = graph.create_gain(config.bus_gain);
        graph.connect(bus, output)?;

        let mut specs: Vec<VoiceSpec> = config
            .frequencies
            .iter()
            .zip(&config.amplitudes)
            .map(|(&frequency, &amplitude)| VoiceSpec {
                frequency,
                amplitude,
                detune: rng.bipolar(config.detune_spread),
                lfo: Some(LfoSpec {
                    rate: rng.sample(&config.lfo_rate),
                    depth: amplitude * config.lfo_depth_ratio,
                    target: ModTarget::Amplitude,
                }),
            })
            .collect();

        let sub = &config.sub_bass;
        specs.push(VoiceSpec {
            frequency: sub.frequency,
            amplitude: sub.amplitude,
            detune: 0.0,
            lfo: Some(LfoSpec {
                rate: sub.lfo_rate,
                depth: sub.lfo_depth,
                target: ModTarget::Frequency,
            }),
        });

        let voices = specs
            .iter()
            .map(|spec| build_voice(graph, spec, bus))
            .collect::<Result<Vec<_>>>()?;

        debug!(voices = voices.len(), "drone layer built");
        Ok(DroneLayer { bus, voices, specs })
    }

    /// The sub-bass voice (always last).
    pub fn sub_bass(&self) -> Option<&VoiceHandle> {
        self.voices.last()
    }
}

/// Looping noise through a slowly swept bandpass.
#[derive(Debug, Clone)]
pub struct TextureLayer {
    pub source: NodeId,
    pub filter: NodeId,
    pub level: NodeId,
    pub lfo: NodeId,
    pub lfo_depth: NodeId,
}

impl TextureLayer {
    pub fn build(graph: &mut AudioGraph, config: &TextureConfig, rng: &mut dyn ParamSource, output: NodeId) -> Result<Self> {
        let now = graph.current_time();
        let sample_rate = graph.sample_rate();
        let frames = frames_for(config.buffer_seconds, sample_rate);
        let buffer = Arc::new(make_buffer(rng, config.channels, frames, sample_rate));

        let source = graph.create_buffer_source(buffer, true);
        let filter = graph.create_biquad(FilterType::Bandpass, config.center, config.q);
        let level = graph.create_gain(config.level);
        graph.connect(source, filter)?;
        graph.connect(filter, level)?;
        graph.connect(level, output)?;

        let lfo = graph.create_oscillator(config.lfo_rate);
        let lfo_depth = graph.create_gain(config.lfo_depth);
        graph.connect(lfo, lfo_depth)?;
        graph.connect_param(lfo_depth, filter, ParamKind::Frequency)?;

        graph.start(lfo, now)?;
        graph.start(source, now)?;

        debug!(frames, channels = config.channels, "texture layer built");
        Ok(TextureLayer {
            source,
            filter,
            level,
            lfo,
            lfo_depth,
        })
    }
}
