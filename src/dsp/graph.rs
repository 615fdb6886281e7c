//! Audio node graph: the rendering subsystem the soundscape schedules against.
//!
//! Nodes live in a slot arena addressed by [`NodeId`]. Every node produces
//! one mono sample per frame; audio edges sum into a node's input and
//! modulation edges sum into one of its [`AudioParam`]s on top of the
//! automated value. Frames are computed in topological order, recomputed
//! whenever the wiring changes.
//!
//! The control side never renders: it creates nodes, wires them, schedules
//! automation with explicit timestamps and registers a disposal time. Once
//! the rendered clock passes that time the nodes and all edges touching them
//! are removed and their slots are reused, so a long session of transient
//! events keeps the arena bounded.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, SoundscapeError};

use super::buffer::AudioBuffer;
use super::delay::DelayLine;
use super::filter::{BiquadFilter, FilterType};
use super::oscillator::SineOscillator;
use super::param::{AudioParam, ParamKind};

/// Highest sample rate a context will open at.
pub const MAX_SAMPLE_RATE: f64 = 768_000.0;

/// Handle to a node. Stale handles (to a disposed node whose slot was
/// reused) are detected through the generation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Whether the context is producing audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Clock frozen, output silent. Initial state.
    Suspended,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Oscillator,
    BufferSource,
    Gain,
    Biquad,
    Delay,
    Destination,
}

/// Scheduled playback window of a source node.
#[derive(Debug, Clone, Copy, Default)]
struct SourceTiming {
    start: Option<f64>,
    stop: Option<f64>,
}

impl SourceTiming {
    fn is_active(&self, time: f64) -> bool {
        match self.start {
            Some(start) => time >= start && self.stop.is_none_or(|stop| time < stop),
            None => false,
        }
    }
}

#[derive(Debug)]
enum Processor {
    Oscillator {
        osc: SineOscillator,
        frequency: AudioParam,
        detune: AudioParam,
        timing: SourceTiming,
    },
    BufferSource {
        buffer: Arc<AudioBuffer>,
        looping: bool,
        position: usize,
        finished: bool,
        timing: SourceTiming,
    },
    Gain {
        gain: AudioParam,
    },
    Biquad {
        filter: BiquadFilter,
        frequency: AudioParam,
        q: AudioParam,
    },
    Delay {
        line: DelayLine,
    },
    Destination,
}

impl Processor {
    fn kind(&self) -> NodeKind {
        match self {
            Processor::Oscillator { .. } => NodeKind::Oscillator,
            Processor::BufferSource { .. } => NodeKind::BufferSource,
            Processor::Gain { .. } => NodeKind::Gain,
            Processor::Biquad { .. } => NodeKind::Biquad,
            Processor::Delay { .. } => NodeKind::Delay,
            Processor::Destination => NodeKind::Destination,
        }
    }

    fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
        match (self, kind) {
            (Processor::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (Processor::Oscillator { detune, .. }, ParamKind::Detune) => Some(detune),
            (Processor::Gain { gain }, ParamKind::Gain) => Some(gain),
            (Processor::Biquad { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (Processor::Biquad { q, .. }, ParamKind::Q) => Some(q),
            _ => None,
        }
    }

    fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
        match (self, kind) {
            (Processor::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (Processor::Oscillator { detune, .. }, ParamKind::Detune) => Some(detune),
            (Processor::Gain { gain }, ParamKind::Gain) => Some(gain),
            (Processor::Biquad { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (Processor::Biquad { q, .. }, ParamKind::Q) => Some(q),
            _ => None,
        }
    }

    fn params(&self) -> Vec<&AudioParam> {
        match self {
            Processor::Oscillator {
                frequency, detune, ..
            } => vec![frequency, detune],
            Processor::Gain { gain } => vec![gain],
            Processor::Biquad { frequency, q, .. } => vec![frequency, q],
            _ => Vec::new(),
        }
    }

    fn params_mut(&mut self) -> Vec<&mut AudioParam> {
        match self {
            Processor::Oscillator {
                frequency, detune, ..
            } => vec![frequency, detune],
            Processor::Gain { gain } => vec![gain],
            Processor::Biquad { frequency, q, .. } => vec![frequency, q],
            _ => Vec::new(),
        }
    }

    fn accepts_input(&self) -> bool {
        !matches!(self, Processor::Oscillator { .. } | Processor::BufferSource { .. })
    }

    fn timing_mut(&mut self) -> Option<&mut SourceTiming> {
        match self {
            Processor::Oscillator { timing, .. } | Processor::BufferSource { timing, .. } => Some(timing),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct NodeData {
    processor: Processor,
    /// Nodes whose output sums into this node's input.
    inputs: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug)]
struct Disposal {
    time: f64,
    nodes: Vec<NodeId>,
}

/// Sum of the current outputs of `sources`.
#[inline]
fn sum_outputs(sources: &[NodeId], outputs: &[f64]) -> f64 {
    sources.iter().map(|id| outputs[id.index()]).sum()
}

/// Advance a parameter to `time` and add its modulation inputs.
#[inline]
fn param_value(param: &mut AudioParam, time: f64, outputs: &[f64]) -> f64 {
    param.advance(time) + sum_outputs(&param.modulators, outputs)
}

/// The node graph plus its clock.
#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: f64,
    state: ContextState,
    frame: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    outputs: Vec<f64>,
    order: Vec<usize>,
    dirty: bool,
    disposals: Vec<Disposal>,
    destination: NodeId,
    started: u64,
}

impl AudioGraph {
    /// Create a suspended context with a destination node.
    pub fn new(sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && (1.0..=MAX_SAMPLE_RATE).contains(&sample_rate)) {
            return Err(SoundscapeError::Activation {
                reason: format!("unsupported sample rate {sample_rate}"),
            });
        }
        let mut graph = AudioGraph {
            sample_rate,
            state: ContextState::Suspended,
            frame: 0,
            slots: Vec::new(),
            free: Vec::new(),
            outputs: Vec::new(),
            order: Vec::new(),
            dirty: true,
            disposals: Vec::new(),
            destination: NodeId {
                index: 0,
                generation: 0,
            },
            started: 0,
        };
        graph.destination = graph.insert(Processor::Destination);
        Ok(graph)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds of audio rendered while running.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn resume(&mut self) {
        if self.state == ContextState::Suspended {
            debug!(time = self.current_time(), "audio context resumed");
            self.state = ContextState::Running;
        }
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    // ── Node creation ───────────────────────────────────────

    fn insert(&mut self, processor: Processor) -> NodeId {
        let node = NodeData {
            processor,
            inputs: Vec::new(),
        };
        self.dirty = true;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        self.outputs.push(0.0);
        NodeId { index, generation: 0 }
    }

    /// A sine oscillator. It is silent until [`start`](Self::start) is called.
    pub fn create_oscillator(&mut self, frequency: f64) -> NodeId {
        let osc = SineOscillator::new(self.sample_rate);
        self.insert(Processor::Oscillator {
            osc,
            frequency: AudioParam::new(frequency),
            detune: AudioParam::new(0.0),
            timing: SourceTiming::default(),
        })
    }

    /// A source playing a shared buffer, optionally looping.
    pub fn create_buffer_source(&mut self, buffer: Arc<AudioBuffer>, looping: bool) -> NodeId {
        self.insert(Processor::BufferSource {
            buffer,
            looping,
            position: 0,
            finished: false,
            timing: SourceTiming::default(),
        })
    }

    pub fn create_gain(&mut self, gain: f64) -> NodeId {
        self.insert(Processor::Gain {
            gain: AudioParam::new(gain),
        })
    }

    pub fn create_biquad(&mut self, filter_type: FilterType, frequency: f64, q: f64) -> NodeId {
        let filter = BiquadFilter::new(filter_type, frequency, q, self.sample_rate);
        self.insert(Processor::Biquad {
            filter,
            frequency: AudioParam::new(frequency),
            q: AudioParam::new(q),
        })
    }

    pub fn create_delay(&mut self, delay_time: f64) -> NodeId {
        let line = DelayLine::new(self.sample_rate, delay_time);
        self.insert(Processor::Delay { line })
    }

    // ── Lookup ──────────────────────────────────────────────

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SoundscapeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SoundscapeError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).ok().map(|n| n.processor.kind())
    }

    pub fn param(&self, id: NodeId, kind: ParamKind) -> Result<&AudioParam> {
        self.node(id)?
            .processor
            .param(kind)
            .ok_or(SoundscapeError::MissingParam { node: id, param: kind })
    }

    /// Mutable access for scheduling automation.
    pub fn param_mut(&mut self, id: NodeId, kind: ParamKind) -> Result<&mut AudioParam> {
        self.node_mut(id)?
            .processor
            .param_mut(kind)
            .ok_or(SoundscapeError::MissingParam { node: id, param: kind })
    }

    /// Nodes feeding `id`'s audio input.
    pub fn inputs(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.inputs)
    }

    /// Nodes modulating one of `id`'s parameters.
    pub fn modulators(&self, id: NodeId, kind: ParamKind) -> Result<&[NodeId]> {
        Ok(&self.param(id, kind)?.modulators)
    }

    /// Number of live nodes, destination included.
    pub fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.node.as_ref())
            .filter(|n| n.processor.kind() == kind)
            .count()
    }

    /// Total slots ever allocated. Bounded when disposal keeps up.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// How many `start` calls have succeeded over the graph's lifetime.
    pub fn started_count(&self) -> u64 {
        self.started
    }

    pub fn is_started(&self, id: NodeId) -> bool {
        self.node(id)
            .ok()
            .and_then(|n| match &n.processor {
                Processor::Oscillator { timing, .. } | Processor::BufferSource { timing, .. } => timing.start,
                _ => None,
            })
            .is_some()
    }

    pub fn pending_disposals(&self) -> usize {
        self.disposals.iter().map(|d| d.nodes.len()).sum()
    }

    // ── Wiring ──────────────────────────────────────────────

    /// Route `from`'s output into `to`'s input.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.node(from)?;
        if !self.node(to)?.processor.accepts_input() {
            return Err(SoundscapeError::NoInput(to));
        }
        self.check_acyclic(from, to)?;
        let target = self.node_mut(to)?;
        if !target.inputs.contains(&from) {
            target.inputs.push(from);
        }
        self.dirty = true;
        Ok(())
    }

    /// Route `from`'s output additively into a parameter of `to`.
    pub fn connect_param(&mut self, from: NodeId, to: NodeId, kind: ParamKind) -> Result<()> {
        self.node(from)?;
        self.param(to, kind)?;
        self.check_acyclic(from, to)?;
        let param = self.param_mut(to, kind)?;
        if !param.modulators.contains(&from) {
            param.modulators.push(from);
        }
        self.dirty = true;
        Ok(())
    }

    /// Reject an edge `from → to` when `to` already feeds `from`.
    fn check_acyclic(&self, from: NodeId, to: NodeId) -> Result<()> {
        let mut stack = vec![from];
        let mut seen = vec![false; self.slots.len()];
        while let Some(id) = stack.pop() {
            if id == to {
                return Err(SoundscapeError::Cycle { from, to });
            }
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            if let Ok(node) = self.node(id) {
                stack.extend(node.inputs.iter().copied());
                for param in node.processor.params() {
                    stack.extend(param.modulators.iter().copied());
                }
            }
        }
        Ok(())
    }

    // ── Source control ──────────────────────────────────────

    /// Schedule a source to begin at `time`. A source starts at most once.
    pub fn start(&mut self, id: NodeId, time: f64) -> Result<()> {
        let timing = self
            .node_mut(id)?
            .processor
            .timing_mut()
            .ok_or(SoundscapeError::NotASource(id))?;
        if timing.start.is_some() {
            return Err(SoundscapeError::AlreadyStarted(id));
        }
        timing.start = Some(time);
        self.started += 1;
        Ok(())
    }

    /// Schedule a source to go silent at `time`.
    pub fn stop(&mut self, id: NodeId, time: f64) -> Result<()> {
        let timing = self
            .node_mut(id)?
            .processor
            .timing_mut()
            .ok_or(SoundscapeError::NotASource(id))?;
        timing.stop = Some(time);
        Ok(())
    }

    /// Hand ownership of a finished subgraph back to the graph: once the
    /// clock reaches `time` the nodes are removed.
    pub fn dispose_at(&mut self, nodes: Vec<NodeId>, time: f64) {
        self.disposals.push(Disposal { time, nodes });
    }

    fn remove(&mut self, id: NodeId) {
        if id == self.destination || self.node(id).is_err() {
            return;
        }
        let slot = &mut self.slots[id.index()];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.outputs[id.index()] = 0.0;
        self.free.push(id.index);

        for node in self.slots.iter_mut().filter_map(|s| s.node.as_mut()) {
            node.inputs.retain(|&src| src != id);
            for param in node.processor.params_mut() {
                param.modulators.retain(|&src| src != id);
            }
        }
        self.dirty = true;
    }

    fn collect_disposals(&mut self) {
        let now = self.current_time();
        if !self.disposals.iter().any(|d| d.time <= now) {
            return;
        }
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.disposals)
            .into_iter()
            .partition(|d| d.time <= now);
        self.disposals = pending;

        let mut removed = 0;
        for id in due.into_iter().flat_map(|d| d.nodes) {
            if self.contains(id) {
                self.remove(id);
                removed += 1;
            }
        }
        debug!(removed, live = self.live_nodes(), "disposed finished nodes");
    }

    // ── Rendering ───────────────────────────────────────────

    /// Kahn's topological sort over audio and modulation edges.
    fn sort(&mut self) {
        let n = self.slots.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(node) = &slot.node else { continue };
            let sources = node
                .inputs
                .iter()
                .chain(node.processor.params().into_iter().flat_map(|p| p.modulators.iter()));
            for src in sources {
                indegree[idx] += 1;
                dependents[src.index()].push(idx);
            }
        }

        let mut ready: Vec<usize> = (0..n)
            .filter(|&i| self.slots[i].node.is_some() && indegree[i] == 0)
            .collect();
        self.order.clear();
        while let Some(idx) = ready.pop() {
            self.order.push(idx);
            for &dep in &dependents[idx] {
                indegree[dep] -= 1;
                if indegree[dep] == 0 {
                    ready.push(dep);
                }
            }
        }

        let live = self.live_nodes();
        if self.order.len() != live {
            // connect() rejects cycles, so this only trips on a logic error.
            warn!(sorted = self.order.len(), live, "graph sort left nodes unscheduled");
        }
        self.dirty = false;
    }

    fn process_frame(&mut self, time: f64) -> f64 {
        let outputs = &mut self.outputs;
        for &idx in &self.order {
            let Some(node) = self.slots[idx].node.as_mut() else {
                continue;
            };
            let input = sum_outputs(&node.inputs, outputs);
            let out = match &mut node.processor {
                Processor::Oscillator {
                    osc,
                    frequency,
                    detune,
                    timing,
                } => {
                    let f = param_value(frequency, time, outputs);
                    let d = param_value(detune, time, outputs);
                    if timing.is_active(time) { osc.next_sample(f, d) } else { 0.0 }
                }
                Processor::BufferSource {
                    buffer,
                    looping,
                    position,
                    finished,
                    timing,
                } => {
                    if *finished || !timing.is_active(time) || buffer.is_empty() {
                        0.0
                    } else {
                        let s = buffer.frame_mono(*position);
                        *position += 1;
                        if *position >= buffer.len() {
                            if *looping {
                                *position = 0;
                            } else {
                                *finished = true;
                            }
                        }
                        s
                    }
                }
                Processor::Gain { gain } => input * param_value(gain, time, outputs),
                Processor::Biquad { filter, frequency, q } => {
                    let f = param_value(frequency, time, outputs);
                    let q = param_value(q, time, outputs);
                    filter.set_params(f, q);
                    filter.process(input)
                }
                Processor::Delay { line } => line.process(input),
                Processor::Destination => input,
            };
            outputs[idx] = out;
        }
        outputs[self.destination.index()]
    }

    /// Render mono frames. A suspended context outputs silence and its clock
    /// stands still.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state == ContextState::Suspended {
            out.fill(0.0);
            return;
        }
        if self.dirty {
            self.sort();
        }
        for frame in out.iter_mut() {
            let time = self.current_time();
            *frame = self.process_frame(time) as f32;
            self.frame += 1;
        }
        self.collect_disposals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(sample_rate: f64) -> AudioGraph {
        let mut g = AudioGraph::new(sample_rate).unwrap();
        g.resume();
        g
    }

    #[test]
    fn rejects_bad_sample_rate() {
        assert!(matches!(AudioGraph::new(0.0), Err(SoundscapeError::Activation { .. })));
        assert!(AudioGraph::new(f64::NAN).is_err());
        assert!(AudioGraph::new(MAX_SAMPLE_RATE * 2.0).is_err());
        assert!(AudioGraph::new(MAX_SAMPLE_RATE).is_ok());
    }

    #[test]
    fn suspended_context_is_silent_and_frozen() {
        let mut g = AudioGraph::new(1000.0).unwrap();
        let osc = g.create_oscillator(100.0);
        let dest = g.destination();
        g.connect(osc, dest).unwrap();
        g.start(osc, 0.0).unwrap();

        let mut out = vec![1.0f32; 64];
        g.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(g.current_time(), 0.0);
    }

    #[test]
    fn gain_chain_scales_oscillator() {
        let mut g = running(1000.0);
        let osc = g.create_oscillator(250.0);
        let gain = g.create_gain(0.5);
        let dest = g.destination();
        g.connect(osc, gain).unwrap();
        g.connect(gain, dest).unwrap();
        g.start(osc, 0.0).unwrap();

        let mut out = vec![0.0f32; 8];
        g.render(&mut out);
        // 250 Hz at 1 kHz: 0, 1, 0, -1, ... scaled by 0.5.
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn modulation_adds_to_param() {
        let mut g = running(1000.0);
        let src = g.create_buffer_source(Arc::new(AudioBuffer::from_channels(vec![vec![1.0; 4]], 1000.0)), true);
        let depth = g.create_gain(0.25);
        let target = g.create_gain(0.5);
        let carrier = g.create_buffer_source(Arc::new(AudioBuffer::from_channels(vec![vec![1.0; 4]], 1000.0)), true);
        let dest = g.destination();
        g.connect(src, depth).unwrap();
        g.connect_param(depth, target, ParamKind::Gain).unwrap();
        g.connect(carrier, target).unwrap();
        g.connect(target, dest).unwrap();
        g.start(src, 0.0).unwrap();
        g.start(carrier, 0.0).unwrap();

        let mut out = vec![0.0f32; 4];
        g.render(&mut out);
        assert!((out[0] - 0.75).abs() < 1e-6, "0.5 intrinsic + 0.25 modulation, got {}", out[0]);
    }

    #[test]
    fn cycles_rejected() {
        let mut g = running(1000.0);
        let a = g.create_gain(1.0);
        let b = g.create_gain(1.0);
        g.connect(a, b).unwrap();
        assert!(matches!(g.connect(b, a), Err(SoundscapeError::Cycle { .. })));
        assert!(matches!(g.connect_param(b, a, ParamKind::Gain), Err(SoundscapeError::Cycle { .. })));
    }

    #[test]
    fn sources_start_once() {
        let mut g = running(1000.0);
        let osc = g.create_oscillator(10.0);
        g.start(osc, 0.0).unwrap();
        assert!(matches!(g.start(osc, 1.0), Err(SoundscapeError::AlreadyStarted(_))));
        assert_eq!(g.started_count(), 1);

        let gain = g.create_gain(1.0);
        assert!(matches!(g.start(gain, 0.0), Err(SoundscapeError::NotASource(_))));
        assert!(matches!(g.connect(gain, osc), Err(SoundscapeError::NoInput(_))));
    }

    #[test]
    fn oscillator_stops_at_stop_time() {
        let mut g = running(1000.0);
        let osc = g.create_oscillator(250.0);
        let dest = g.destination();
        g.connect(osc, dest).unwrap();
        g.start(osc, 0.0).unwrap();
        g.stop(osc, 0.004).unwrap();

        let mut out = vec![0.0f32; 12];
        g.render(&mut out);
        assert!(out[1].abs() > 0.5);
        assert!(out[4..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn one_shot_buffer_ends() {
        let mut g = running(1000.0);
        let buf = Arc::new(AudioBuffer::from_channels(vec![vec![0.5; 3]], 1000.0));
        let src = g.create_buffer_source(buf, false);
        let dest = g.destination();
        g.connect(src, dest).unwrap();
        g.start(src, 0.0).unwrap();

        let mut out = vec![0.0f32; 6];
        g.render(&mut out);
        assert_eq!(&out[..], &[0.5, 0.5, 0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn disposal_removes_nodes_and_edges() {
        let mut g = running(1000.0);
        let master = g.create_gain(1.0);
        let dest = g.destination();
        g.connect(master, dest).unwrap();

        let osc = g.create_oscillator(100.0);
        let env = g.create_gain(0.1);
        g.connect(osc, env).unwrap();
        g.connect(env, master).unwrap();
        g.start(osc, 0.0).unwrap();
        g.dispose_at(vec![osc, env], 0.01);

        let mut out = vec![0.0f32; 5];
        g.render(&mut out);
        assert!(g.contains(osc), "not yet due");

        let mut out = vec![0.0f32; 10];
        g.render(&mut out);
        assert!(!g.contains(osc));
        assert!(!g.contains(env));
        assert!(g.inputs(master).unwrap().is_empty());
        assert_eq!(g.pending_disposals(), 0);
        assert_eq!(g.live_nodes(), 2);
    }

    #[test]
    fn disposed_slots_are_reused() {
        let mut g = running(1000.0);
        let dest = g.destination();
        let mut out = vec![0.0f32; 10];
        for _ in 0..50 {
            let t = g.current_time();
            let osc = g.create_oscillator(100.0);
            g.connect(osc, dest).unwrap();
            g.start(osc, t).unwrap();
            g.dispose_at(vec![osc], t + 0.005);
            g.render(&mut out);
        }
        assert!(g.capacity() <= 3, "arena grew to {}", g.capacity());
    }

    #[test]
    fn stale_handle_detected() {
        let mut g = running(1000.0);
        let osc = g.create_oscillator(100.0);
        g.dispose_at(vec![osc], 0.0);
        let mut out = vec![0.0f32; 1];
        g.render(&mut out);
        let reused = g.create_gain(1.0);
        assert_eq!(reused.index(), osc.index());
        assert!(matches!(g.param(osc, ParamKind::Frequency), Err(SoundscapeError::UnknownNode(_))));
        assert_eq!(g.kind(reused), Some(NodeKind::Gain));
    }
}
