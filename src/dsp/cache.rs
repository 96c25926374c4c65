//! Render memoization.
//!
//! Keys are built from the render arguments by value, except envelopes,
//! which are keyed by their identity token so large curves are never
//! hashed or compared sample by sample.

use std::collections::HashMap;
use std::sync::Arc;

use super::buffer::SampleBuffer;
use super::filter::FilterChain;
use super::tone::Amplitude;
use crate::error::Result;

/// `-0.0` and `0.0` render the same, so they share a key.
fn float_key(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AmplitudeKey {
    Constant(u64),
    Envelope(u64),
}

impl From<&Amplitude> for AmplitudeKey {
    fn from(amplitude: &Amplitude) -> Self {
        match amplitude {
            Amplitude::Constant(value) => AmplitudeKey::Constant(float_key(*value)),
            Amplitude::Envelope(envelope) => AmplitudeKey::Envelope(envelope.id()),
        }
    }
}

/// Normalized render arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    frequency: u64,
    amplitude: AmplitudeKey,
    beats: u64,
    filters: Vec<String>,
}

impl RenderKey {
    pub fn new(frequency: f64, amplitude: &Amplitude, beats: f64, filters: &FilterChain) -> Self {
        RenderKey {
            frequency: float_key(frequency),
            amplitude: amplitude.into(),
            beats: float_key(beats),
            filters: filters.names(),
        }
    }
}

/// Per-factory memo of finished renders. Entries live as long as the
/// owning factory; there is no eviction.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: HashMap<RenderKey, Arc<SampleBuffer>>,
    computed: u64,
    hits: u64,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached buffer for `key`, or run `render` and store its
    /// result. A failed render stores nothing.
    pub fn get_or_try_insert_with<F>(
        &mut self,
        key: RenderKey,
        render: F,
    ) -> Result<Arc<SampleBuffer>>
    where
        F: FnOnce() -> Result<SampleBuffer>,
    {
        if let Some(buffer) = self.entries.get(&key) {
            self.hits += 1;
            log::trace!("render cache hit: {key:?}");
            return Ok(Arc::clone(buffer));
        }
        log::trace!("render cache miss: {key:?}");
        let buffer = Arc::new(render()?);
        self.computed += 1;
        self.entries.insert(key, Arc::clone(&buffer));
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders actually computed (cache misses that succeeded).
    pub fn computed(&self) -> u64 {
        self.computed
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}
