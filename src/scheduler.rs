//! Control-plane timer queue for the self-rescheduling event chains.
//!
//! This is the single-threaded deferred-callback queue the soundscape runs
//! its Call and Burst chains on. A chain is a sequence of one-shot timers:
//! each fire schedules the next. Every timer carries the play session that
//! started its chain, and the owner only honours timers whose session is
//! still the live one, so stopping playback ends both chains at their next
//! fire without any explicit cancellation of in-flight audio.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::events::EventKind;

/// One pending step of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTask {
    pub kind: EventKind,
    /// Play session the chain belongs to.
    pub session: u64,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    due_ms: f64,
    seq: u64,
    task: ChainTask,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    /// Earliest first; equal due times fire in submission order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_ms.total_cmp(&other.due_ms).then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of chain timers on a millisecond clock.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Timer>>,
    now_ms: f64,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current control-plane time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Run `task` after `delay_ms`.
    pub fn schedule(&mut self, delay_ms: f64, task: ChainTask) {
        let timer = Timer {
            due_ms: self.now_ms + delay_ms.max(0.0),
            seq: self.seq,
            task,
        };
        self.seq += 1;
        self.queue.push(Reverse(timer));
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the clock
    /// to its due time. Call repeatedly until `None`, then [`Self::set_now`].
    pub fn pop_due(&mut self, until_ms: f64) -> Option<ChainTask> {
        let Reverse(next) = self.queue.peek()?;
        if next.due_ms > until_ms {
            return None;
        }
        let Reverse(timer) = self.queue.pop()?;
        self.now_ms = self.now_ms.max(timer.due_ms);
        Some(timer.task)
    }

    /// Move the clock forward to `ms` (never backward).
    pub fn set_now(&mut self, ms: f64) {
        self.now_ms = self.now_ms.max(ms);
    }

    /// Drop every timer not belonging to `session`.
    pub fn retain_session(&mut self, session: Option<u64>) {
        self.queue.retain(|Reverse(t)| Some(t.task.session) == session);
    }

    /// Outstanding timers of one kind for one session.
    pub fn pending(&self, kind: EventKind, session: u64) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(t)| t.task.kind == kind && t.task.session == session)
            .count()
    }

    /// Total outstanding timers.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Due time of the next timer, if any.
    pub fn next_due_ms(&self) -> Option<f64> {
        self.queue.peek().map(|Reverse(t)| t.due_ms)
    }
}
