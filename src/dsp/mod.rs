//! DSP — Pure Rust tone synthesis.
//!
//! Buffers, harmonic profiles, envelopes, filters, memoized tone factories,
//! mixers, and the melody renderer that ties them together.

pub mod buffer;
pub mod cache;
pub mod envelope;
pub mod filter;
pub mod harmonics;
pub mod mixer;
pub mod renderer;
pub mod tone;
