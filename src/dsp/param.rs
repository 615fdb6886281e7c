//! Audio parameter automation with WebAudio timing semantics.
//!
//! A parameter holds a queue of time-stamped automation events. Rendering
//! walks forward in time, folding every event that has started into a
//! running anchor curve, so the queue only ever holds events that are still
//! in the future. Long sessions that keep re-targeting a parameter (the
//! master fade) therefore do not accumulate history.

use std::collections::VecDeque;

use crate::error::{Result, SoundscapeError};

use super::graph::NodeId;

/// Which parameter of a node an automation call or modulation edge targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Frequency,
    Detune,
    Gain,
    Q,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue(f64),
    LinearRamp(f64),
    ExponentialRamp(f64),
    SetTarget { target: f64, time_constant: f64 },
}

#[derive(Debug, Clone, Copy)]
struct ParamEvent {
    time: f64,
    automation: Automation,
}

/// The curve in effect after the most recent event that has started.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    Constant(f64),
    Approach {
        start: f64,
        from: f64,
        target: f64,
        time_constant: f64,
    },
}

impl Anchor {
    fn value_at(&self, time: f64) -> f64 {
        match *self {
            Anchor::Constant(v) => v,
            Anchor::Approach {
                start,
                from,
                target,
                time_constant,
            } => {
                let elapsed = (time - start).max(0.0);
                target + (from - target) * (-elapsed / time_constant).exp()
            }
        }
    }
}

/// An automatable parameter (gain, frequency, detune, Q).
///
/// The rendered value is the automated intrinsic value plus the summed
/// output of every node connected to it as a modulator.
#[derive(Debug, Clone)]
pub struct AudioParam {
    anchor: Anchor,
    anchor_time: f64,
    events: VecDeque<ParamEvent>,
    last_time: f64,
    current: f64,
    pub(crate) modulators: Vec<NodeId>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        AudioParam {
            anchor: Anchor::Constant(value),
            anchor_time: 0.0,
            events: VecDeque::new(),
            last_time: 0.0,
            current: value,
            modulators: Vec::new(),
        }
    }

    /// Set the intrinsic value immediately, discarding pending automation.
    pub fn set_value(&mut self, value: f64) {
        self.anchor = Anchor::Constant(value);
        self.events.clear();
        self.current = value;
    }

    /// Most recently rendered intrinsic value (without modulation).
    pub fn value(&self) -> f64 {
        self.current
    }

    /// Number of automation events that have not started yet.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> Result<()> {
        self.schedule(time, Automation::SetValue(value))
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) -> Result<()> {
        self.schedule(end_time, Automation::LinearRamp(value))
    }

    /// Exponential ramps cannot reach or cross zero, so the target must be
    /// strictly positive.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f64, end_time: f64) -> Result<()> {
        if !(value.is_finite() && value > 0.0) {
            return Err(SoundscapeError::NonPositiveRampTarget { value });
        }
        self.schedule(end_time, Automation::ExponentialRamp(value))
    }

    /// Approach `target` exponentially from `start_time` with the given time
    /// constant. The curve never overshoots, so it is monotonic.
    pub fn set_target_at_time(&mut self, target: f64, start_time: f64, time_constant: f64) -> Result<()> {
        if !(time_constant.is_finite() && time_constant > 0.0) {
            return Err(SoundscapeError::InvalidTimeConstant {
                value: time_constant,
            });
        }
        self.schedule(
            start_time,
            Automation::SetTarget {
                target,
                time_constant,
            },
        )
    }

    fn schedule(&mut self, time: f64, automation: Automation) -> Result<()> {
        if !time.is_finite() || time < self.last_time {
            return Err(SoundscapeError::AutomationOutOfOrder {
                time,
                last: self.last_time,
            });
        }
        self.events.push_back(ParamEvent { time, automation });
        self.last_time = time;
        Ok(())
    }

    /// Move the parameter to `time` and return its intrinsic value there.
    ///
    /// `time` must not decrease between calls.
    pub fn advance(&mut self, time: f64) -> f64 {
        while let Some(event) = self.events.front().copied() {
            if event.time > time {
                break;
            }
            let from = self.anchor.value_at(event.time);
            self.anchor = match event.automation {
                Automation::SetValue(v) | Automation::LinearRamp(v) | Automation::ExponentialRamp(v) => {
                    Anchor::Constant(v)
                }
                Automation::SetTarget {
                    target,
                    time_constant,
                } => Anchor::Approach {
                    start: event.time,
                    from,
                    target,
                    time_constant,
                },
            };
            self.anchor_time = event.time;
            self.events.pop_front();
        }

        self.current = self.ramp_value(time);
        self.current
    }

    /// Value of an in-progress ramp toward the next event, or the anchor.
    fn ramp_value(&self, time: f64) -> f64 {
        let Some(next) = self.events.front() else {
            return self.anchor.value_at(time);
        };
        let from = self.anchor.value_at(self.anchor_time);
        let span = next.time - self.anchor_time;
        let frac = if span > 0.0 {
            ((time - self.anchor_time) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        match next.automation {
            Automation::LinearRamp(to) => from + (to - from) * frac,
            Automation::ExponentialRamp(to) => {
                // A ramp can't leave zero or change sign; hold until it ends.
                if from <= 0.0 {
                    from
                } else {
                    from * (to / from).powf(frac)
                }
            }
            Automation::SetValue(_) | Automation::SetTarget { .. } => self.anchor.value_at(time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_ramp_interpolates() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0).unwrap();
        p.linear_ramp_to_value_at_time(1.0, 2.0).unwrap();

        assert!((p.advance(1.0) - 0.5).abs() < 1e-12);
        assert!((p.advance(2.0) - 1.0).abs() < 1e-12);
        assert!((p.advance(5.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AudioParam::new(100.0);
        p.set_value_at_time(100.0, 0.0).unwrap();
        p.exponential_ramp_to_value_at_time(400.0, 2.0).unwrap();

        let mid = p.advance(1.0);
        assert!((mid - 200.0).abs() < 1e-9, "midpoint should be 200, got {mid}");
    }

    #[test]
    fn exponential_ramp_rejects_non_positive_target() {
        let mut p = AudioParam::new(100.0);
        assert!(matches!(
            p.exponential_ramp_to_value_at_time(0.0, 1.0),
            Err(SoundscapeError::NonPositiveRampTarget { .. })
        ));
        assert!(p.exponential_ramp_to_value_at_time(-5.0, 1.0).is_err());
        assert_eq!(p.pending_events(), 0);
    }

    #[test]
    fn out_of_order_events_rejected() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 2.0).unwrap();
        let err = p.linear_ramp_to_value_at_time(0.0, 1.0).unwrap_err();
        assert!(matches!(err, SoundscapeError::AutomationOutOfOrder { .. }));

        // Equal timestamps are allowed.
        p.set_value_at_time(0.5, 2.0).unwrap();
    }

    #[test]
    fn set_target_approaches_monotonically() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(0.7, 0.0, 0.8).unwrap();

        let mut prev = p.advance(0.0);
        assert!(prev.abs() < 1e-12);
        for i in 1..=800 {
            let v = p.advance(i as f64 * 0.01);
            assert!(v >= prev, "fade-in must not decrease: {prev} -> {v}");
            assert!(v <= 0.7);
            prev = v;
        }
        // After one time constant the curve covers ~63% of the distance.
        let mut q = AudioParam::new(0.0);
        q.set_target_at_time(1.0, 0.0, 0.5).unwrap();
        let v = q.advance(0.5);
        assert!((v - (1.0 - (-1.0f64).exp())).abs() < 1e-9);
    }

    #[test]
    fn set_target_retarget_starts_from_current_value() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(0.7, 0.0, 0.8).unwrap();
        let before = p.advance(1.0);
        p.set_target_at_time(0.0, 1.0, 0.5).unwrap();

        let at_switch = p.advance(1.0);
        assert!((at_switch - before).abs() < 1e-12, "no jump at retarget");
        let later = p.advance(3.0);
        assert!(later < at_switch);
        assert!(later > 0.0);
    }

    #[test]
    fn started_events_are_folded() {
        let mut p = AudioParam::new(0.0);
        for i in 0..100 {
            p.set_target_at_time((i % 2) as f64, i as f64, 0.3).unwrap();
        }
        assert_eq!(p.pending_events(), 100);
        p.advance(99.5);
        assert_eq!(p.pending_events(), 0);
    }
}
