//! Playback controller.
//!
//! [`Soundscape`] owns the audio graph, the master bus, both continuous
//! layers and the two transient event chains. The host drives it with
//! [`Soundscape::toggle`] and pulls audio with [`Soundscape::render`]. Once
//! the audio context is running, `render` moves the control-plane clock in
//! lockstep with the rendered audio; before that both clocks stand still.
//! [`Soundscape::advance`] moves the control plane alone.

use tracing::{debug, info, trace, warn};

use crate::config::{ParamRange, SoundscapeConfig};
use crate::dsp::graph::{AudioGraph, ContextState, NodeId};
use crate::dsp::param::ParamKind;
use crate::error::Result;
use crate::events::{EventKind, TransientEvent, fire_burst, fire_call};
use crate::layers::{DroneLayer, TextureLayer};
use crate::random::{ParamSource, SeededParams};
use crate::scheduler::{ChainTask, Scheduler};

/// Frames rendered between control-plane steps.
pub const RENDER_QUANTUM: usize = 128;

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Uninitialized,
    Stopped,
    /// Playing under the given session id. Chains started in an earlier
    /// session never fire again.
    Playing { session: u64 },
}

/// A transient event together with the control-plane time it fired at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredEvent {
    pub at_ms: f64,
    pub event: TransientEvent,
}

/// Everything that exists once the audio context is up.
#[derive(Debug)]
pub struct Engine {
    graph: AudioGraph,
    master: NodeId,
    drone: DroneLayer,
    texture: TextureLayer,
}

impl Engine {
    fn build(config: &SoundscapeConfig, rng: &mut dyn ParamSource) -> Result<Self> {
        let mut graph = AudioGraph::new(config.sample_rate)?;
        let master = graph.create_gain(0.0);
        graph.connect(master, graph.destination())?;

        let drone = DroneLayer::build(&mut graph, &config.drone, rng, master)?;
        let texture = TextureLayer::build(&mut graph, &config.texture, rng, master)?;

        Ok(Engine {
            graph,
            master,
            drone,
            texture,
        })
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    /// The master bus every layer and event feeds.
    pub fn master(&self) -> NodeId {
        self.master
    }

    pub fn drone(&self) -> &DroneLayer {
        &self.drone
    }

    pub fn texture(&self) -> &TextureLayer {
        &self.texture
    }

    /// Last rendered master bus gain.
    pub fn master_gain(&self) -> f64 {
        self.graph.param(self.master, ParamKind::Gain).map_or(0.0, |p| p.value())
    }

    fn fade_master(&mut self, target: f64, time_constant: f64) -> Result<()> {
        let now = self.graph.current_time();
        self.graph
            .param_mut(self.master, ParamKind::Gain)?
            .set_target_at_time(target, now, time_constant)
    }
}

/// The ambient soundscape: one fixed patch, toggled on and off.
pub struct Soundscape {
    config: SoundscapeConfig,
    rng: Box<dyn ParamSource>,
    state: PlaybackState,
    engine: Option<Engine>,
    scheduler: Scheduler,
    next_session: u64,
    calls_fired: u64,
    bursts_fired: u64,
    scratch: Vec<f32>,
}

impl Soundscape {
    /// Create an uninitialized controller. The config is validated here;
    /// the sample rate is checked when [`Self::init`] brings up the context.
    pub fn new(config: SoundscapeConfig, rng: Box<dyn ParamSource>) -> Result<Self> {
        config.validate()?;
        Ok(Soundscape {
            config,
            rng,
            state: PlaybackState::Uninitialized,
            engine: None,
            scheduler: Scheduler::new(),
            next_session: 1,
            calls_fired: 0,
            bursts_fired: 0,
            scratch: Vec::new(),
        })
    }

    pub fn with_seed(config: SoundscapeConfig, seed: u64) -> Result<Self> {
        Self::new(config, Box::new(SeededParams::new(seed)))
    }

    /// Bring up the audio context and build the continuous layers with the
    /// master bus silent. Calling it again is a no-op.
    ///
    /// On failure the controller stays uninitialized.
    pub fn init(&mut self) -> Result<()> {
        if self.state != PlaybackState::Uninitialized {
            return Ok(());
        }
        let engine = Engine::build(&self.config, self.rng.as_mut())?;
        info!(
            sample_rate = self.config.sample_rate,
            nodes = engine.graph.live_nodes(),
            "soundscape initialized"
        );
        self.engine = Some(engine);
        self.state = PlaybackState::Stopped;
        Ok(())
    }

    /// Flip between playing and stopped, initializing first if needed.
    /// Returns whether the soundscape is now playing.
    ///
    /// If initialization fails the failure is logged, nothing changes and
    /// `false` is returned.
    pub fn toggle(&mut self) -> bool {
        if self.state == PlaybackState::Uninitialized {
            if let Err(e) = self.init() {
                warn!(error = %e, "audio initialization failed");
                return false;
            }
        }
        match self.state {
            PlaybackState::Stopped => self.start_playing(),
            PlaybackState::Playing { .. } => self.stop_playing(),
            PlaybackState::Uninitialized => {}
        }
        self.is_playing()
    }

    fn start_playing(&mut self) {
        let session = self.next_session;
        self.next_session += 1;
        self.state = PlaybackState::Playing { session };

        if let Some(engine) = self.engine.as_mut() {
            engine.graph.resume();
            let master = &self.config.master;
            if let Err(e) = engine.fade_master(master.play_level, master.fade_in) {
                warn!(error = %e, "master fade-in failed");
            }
        }

        self.scheduler.retain_session(Some(session));
        let call_delay = self.rng.sample(&self.config.call.first_delay_ms);
        self.scheduler.schedule(
            call_delay,
            ChainTask {
                kind: EventKind::Call,
                session,
            },
        );
        let burst_delay = self.rng.sample(&self.config.burst.first_delay_ms);
        self.scheduler.schedule(
            burst_delay,
            ChainTask {
                kind: EventKind::Burst,
                session,
            },
        );
        info!(session, call_delay, burst_delay, "playback started");
    }

    fn stop_playing(&mut self) {
        self.state = PlaybackState::Stopped;
        self.scheduler.retain_session(None);
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.fade_master(0.0, self.config.master.fade_out) {
                warn!(error = %e, "master fade-out failed");
            }
        }
        info!("playback stopped");
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing { .. })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn config(&self) -> &SoundscapeConfig {
        &self.config
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    /// Last rendered master gain, or 0 before initialization.
    pub fn master_gain(&self) -> f64 {
        self.engine.as_ref().map_or(0.0, Engine::master_gain)
    }

    /// Control-plane clock in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.scheduler.now_ms()
    }

    /// Outstanding chain timers of `kind` in the live session.
    pub fn pending(&self, kind: EventKind) -> usize {
        match self.state {
            PlaybackState::Playing { session } => self.scheduler.pending(kind, session),
            _ => 0,
        }
    }

    /// Total events of `kind` fired since construction.
    pub fn fired_count(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Call => self.calls_fired,
            EventKind::Burst => self.bursts_fired,
        }
    }

    /// Advance the control-plane clock by `elapsed_ms`, running every chain
    /// step that comes due. Returns the events fired along the way.
    pub fn advance(&mut self, elapsed_ms: f64) -> Vec<FiredEvent> {
        let until = self.scheduler.now_ms() + elapsed_ms.max(0.0);
        let mut fired = Vec::new();
        while let Some(task) = self.scheduler.pop_due(until) {
            if let Some(event) = self.run_chain(task) {
                fired.push(FiredEvent {
                    at_ms: self.scheduler.now_ms(),
                    event,
                });
            }
        }
        self.scheduler.set_now(until);
        fired
    }

    /// One chain step: fire the event and schedule the next step, unless the
    /// chain's session has ended.
    fn run_chain(&mut self, task: ChainTask) -> Option<TransientEvent> {
        if self.state != (PlaybackState::Playing { session: task.session }) {
            trace!(kind = ?task.kind, session = task.session, "stale chain ended");
            return None;
        }
        let engine = self.engine.as_mut()?;
        let now = engine.graph.current_time();
        let rng = self.rng.as_mut();

        let (result, interval) = match task.kind {
            EventKind::Call => (
                fire_call(&mut engine.graph, &self.config.call, rng, engine.master, now).map(TransientEvent::Call),
                self.config.call.interval_ms,
            ),
            EventKind::Burst => (
                fire_burst(&mut engine.graph, &self.config.burst, rng, engine.master, now).map(TransientEvent::Burst),
                self.config.burst.interval_ms,
            ),
        };

        let delay = self.next_delay(&interval);
        self.scheduler.schedule(delay, task);

        match result {
            Ok(event) => {
                match task.kind {
                    EventKind::Call => self.calls_fired += 1,
                    EventKind::Burst => self.bursts_fired += 1,
                }
                Some(event)
            }
            Err(e) => {
                warn!(kind = ?task.kind, error = %e, "event failed to fire");
                None
            }
        }
    }

    fn next_delay(&mut self, interval: &ParamRange) -> f64 {
        let delay = self.rng.sample(interval);
        debug!(delay, "next chain step scheduled");
        delay
    }

    /// Render mono audio, stepping the control plane every
    /// [`RENDER_QUANTUM`] frames. Until the first play the output is silent
    /// and the control-plane clock does not move.
    pub fn render(&mut self, out: &mut [f32]) {
        let ms_per_frame = 1000.0 / self.config.sample_rate;
        for block in out.chunks_mut(RENDER_QUANTUM) {
            let running = match self.engine.as_mut() {
                Some(engine) => {
                    engine.graph.render(block);
                    engine.graph.state() == ContextState::Running
                }
                None => {
                    block.fill(0.0);
                    false
                }
            };
            if running {
                self.advance(block.len() as f64 * ms_per_frame);
            }
        }
    }

    /// Render into an interleaved stereo buffer with the mono mix on both
    /// channels. A trailing odd sample is left silent.
    pub fn render_stereo_interleaved(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(frames, 0.0);
        self.render(&mut scratch);
        for (pair, &s) in out.chunks_exact_mut(2).zip(&scratch) {
            pair[0] = s;
            pair[1] = s;
        }
        if out.len() % 2 == 1 {
            out[out.len() - 1] = 0.0;
        }
        self.scratch = scratch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoundscapeError;
    use crate::random::ScriptedParams;

    fn config() -> SoundscapeConfig {
        SoundscapeConfig::with_sample_rate(2000.0)
    }

    fn playing() -> Soundscape {
        let mut s = Soundscape::with_seed(config(), 9).unwrap();
        assert!(s.toggle());
        s
    }

    #[test]
    fn starts_uninitialized_and_silent() {
        let mut s = Soundscape::with_seed(config(), 1).unwrap();
        assert_eq!(s.state(), PlaybackState::Uninitialized);
        assert!(!s.is_playing());
        assert!(s.engine().is_none());

        let mut out = vec![1.0f32; 300];
        s.render(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn init_is_idempotent() {
        let mut s = Soundscape::with_seed(config(), 1).unwrap();
        s.init().unwrap();
        let nodes = s.engine().unwrap().graph().live_nodes();
        s.init().unwrap();
        assert_eq!(s.engine().unwrap().graph().live_nodes(), nodes);
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert_eq!(s.master_gain(), 0.0);
    }

    #[test]
    fn init_failure_leaves_controller_uninitialized() {
        let cfg = SoundscapeConfig::with_sample_rate(0.0);
        let mut s = Soundscape::with_seed(cfg, 1).unwrap();
        assert!(matches!(s.init(), Err(SoundscapeError::Activation { .. })));
        assert_eq!(s.state(), PlaybackState::Uninitialized);
        assert!(!s.toggle());
        assert_eq!(s.state(), PlaybackState::Uninitialized);
    }

    #[test]
    fn very_low_sample_rate_initializes_without_panic() {
        let mut s = Soundscape::with_seed(SoundscapeConfig::with_sample_rate(1.5), 1).unwrap();
        s.init().unwrap();
        assert!(s.toggle());
        let mut out = vec![0.0f32; 16];
        s.render(&mut out);
        assert!(out.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn invalid_config_rejected_up_front() {
        let mut cfg = config();
        cfg.master.fade_in = 0.0;
        assert!(matches!(
            Soundscape::with_seed(cfg, 1),
            Err(SoundscapeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn toggle_initializes_and_plays() {
        let s = playing();
        assert!(matches!(s.state(), PlaybackState::Playing { .. }));
        assert_eq!(s.pending(EventKind::Call), 1);
        assert_eq!(s.pending(EventKind::Burst), 1);
    }

    #[test]
    fn toggle_alternates() {
        let mut s = Soundscape::with_seed(config(), 3).unwrap();
        assert!(s.toggle());
        assert!(!s.toggle());
        assert!(s.toggle());
        assert!(!s.toggle());
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn first_burst_fires_at_500ms() {
        let mut s = playing();
        assert!(s.advance(499.0).is_empty());
        let fired = s.advance(1.0);
        let burst = fired.iter().find(|f| f.event.kind() == EventKind::Burst).unwrap();
        assert_eq!(burst.at_ms, 500.0);
        assert_eq!(s.pending(EventKind::Burst), 1);
    }

    #[test]
    fn first_call_uses_scripted_delay() {
        let mut s = Soundscape::new(config(), Box::new(ScriptedParams::constant(0.5))).unwrap();
        assert!(s.toggle());
        let fired = s.advance(6000.0);
        let call = fired.iter().find(|f| f.event.kind() == EventKind::Call).unwrap();
        assert_eq!(call.at_ms, 5500.0);
    }

    #[test]
    fn stop_cancels_future_chain_steps() {
        let mut s = playing();
        s.advance(600.0);
        assert!(!s.toggle());
        assert_eq!(s.pending(EventKind::Call), 0);
        assert_eq!(s.pending(EventKind::Burst), 0);

        let calls = s.fired_count(EventKind::Call);
        let bursts = s.fired_count(EventKind::Burst);
        assert!(s.advance(30_000.0).is_empty());
        assert_eq!(s.fired_count(EventKind::Call), calls);
        assert_eq!(s.fired_count(EventKind::Burst), bursts);
    }

    #[test]
    fn quick_restart_does_not_double_chains() {
        let mut s = playing();
        s.advance(100.0);
        assert!(!s.toggle());
        assert!(s.toggle());
        assert_eq!(s.pending(EventKind::Call), 1);
        assert_eq!(s.pending(EventKind::Burst), 1);

        s.advance(20_000.0);
        assert_eq!(s.pending(EventKind::Call), 1);
        assert_eq!(s.pending(EventKind::Burst), 1);
    }

    #[test]
    fn master_fades_in_and_out() {
        let mut s = playing();
        let mut out = vec![0.0f32; 4000];
        s.render(&mut out);
        let level = s.master_gain();
        assert!(level > 0.5 && level < 0.7, "{level}");

        s.toggle();
        s.render(&mut out);
        let faded = s.master_gain();
        assert!(faded < level * 0.2, "{faded}");
    }

    #[test]
    fn playing_output_is_audible() {
        let mut s = playing();
        let mut out = vec![0.0f32; 4000];
        s.render(&mut out);
        let peak = out.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak > 0.001, "{peak}");
        assert!(peak < 1.0);
    }

    #[test]
    fn render_keeps_clocks_in_lockstep() {
        let mut s = playing();
        let mut out = vec![0.0f32; 1000];
        s.render(&mut out);
        let audio_ms = s.engine().unwrap().graph().current_time() * 1000.0;
        assert!((s.now_ms() - audio_ms).abs() < 1e-6);
        assert!(s.fired_count(EventKind::Burst) >= 1);
    }

    #[test]
    fn clocks_stand_still_until_first_play() {
        let mut s = Soundscape::with_seed(config(), 4).unwrap();
        let mut out = vec![0.0f32; 1000];
        s.render(&mut out);
        assert_eq!(s.now_ms(), 0.0);

        s.init().unwrap();
        s.render(&mut out);
        assert_eq!(s.now_ms(), 0.0);
        assert_eq!(s.engine().unwrap().graph().current_time(), 0.0);

        s.toggle();
        s.render(&mut out);
        let audio_ms = s.engine().unwrap().graph().current_time() * 1000.0;
        assert_eq!(audio_ms, 500.0);
        assert!((s.now_ms() - audio_ms).abs() < 1e-6);
    }

    #[test]
    fn stereo_duplicates_mono() {
        let mut s = playing();
        let mut out = vec![0.0f32; 801];
        s.render_stereo_interleaved(&mut out);
        for pair in out[..800].chunks_exact(2) {
            assert_eq!(pair[0], pair[1]);
        }
        assert_eq!(out[800], 0.0);
    }
}
