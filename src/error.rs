use thiserror::Error;

use crate::dsp::graph::NodeId;
use crate::dsp::param::ParamKind;

#[derive(Debug, Error)]
pub enum SoundscapeError {
    /// The audio context could not be brought up. The controller stays
    /// uninitialized and `init()` may be retried.
    #[error("audio activation failed: {reason}")]
    Activation { reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Automation events must arrive in non-decreasing time order.
    #[error("automation event at {time}s precedes last event at {last}s")]
    AutomationOutOfOrder { time: f64, last: f64 },

    #[error("exponential ramp target must be finite and > 0, got {value}")]
    NonPositiveRampTarget { value: f64 },

    #[error("time constant must be finite and > 0, got {value}")]
    InvalidTimeConstant { value: f64 },

    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("node {node:?} has no {param:?} parameter")]
    MissingParam { node: NodeId, param: ParamKind },

    #[error("node {0:?} is a source and takes no audio input")]
    NoInput(NodeId),

    #[error("node {0:?} is not a source")]
    NotASource(NodeId),

    #[error("source {0:?} was already started")]
    AlreadyStarted(NodeId),

    #[error("connecting {from:?} -> {to:?} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, SoundscapeError>;
