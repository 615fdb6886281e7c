//! DSP engine: a small WebAudio-style node graph rendered in pure Rust.
//!
//! The same code renders live through the WASM bindings and offline to WAV,
//! so the output is deterministic for a given seed.

pub mod buffer;
pub mod delay;
pub mod filter;
pub mod graph;
pub mod oscillator;
pub mod param;
pub mod renderer;
