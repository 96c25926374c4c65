//! Decay envelopes — amplitude curves spanning one note.
//!
//! Unlike a gated ADSR, a decay envelope is computed up front for the whole
//! note: silence at sample 0, a short attack to the peak, an optional
//! sustain point for long notes, and a decay floor at the last sample, with
//! straight lines in between.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ComputationError, ConfigError, Result};

static NEXT_ENVELOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Number of samples covering `beats` beats, rounded up.
pub fn samples_for_beats(beats: f64, seconds_per_beat: f64, frame_rate: u32) -> Result<usize> {
    if !(beats.is_finite() && beats > 0.0) {
        return Err(ComputationError::EmptyDuration(beats).into());
    }
    let exact = seconds_per_beat * frame_rate as f64 * beats;
    // Absorb float noise so 0.1 * 3 beats doesn't gain a sample.
    let nearest = exact.round();
    let len = if (exact - nearest).abs() < 1e-6 {
        nearest
    } else {
        exact.ceil()
    };
    Ok(len as usize)
}

/// An amplitude curve with an identity token.
///
/// Clones share both the samples and the token; two envelopes built
/// separately never share a token even when their samples match. Render
/// caches key envelopes by this token.
#[derive(Debug, Clone)]
pub struct Envelope {
    id: u64,
    samples: Arc<[f64]>,
}

impl Envelope {
    pub fn new(samples: Vec<f64>) -> Self {
        Envelope {
            id: NEXT_ENVELOPE_ID.fetch_add(1, Ordering::Relaxed),
            samples: samples.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Anchor placement for [`EnvelopeGenerator::linear_decay`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecayShape {
    /// Sample index of the attack peak. Short enough to be inaudible as a
    /// fade-in, long enough to avoid a click.
    pub attack_samples: usize,
    /// Notes longer than this (in beats) get a sustain anchor.
    pub sustain_threshold: f64,
    /// Position of the sustain anchor, in beats from the note start.
    pub sustain_beats: f64,
    /// Raise a long note's final level to `beats / sustain_threshold`.
    /// This attenuates very long notes hard; turn it off for a flat floor.
    pub long_note_falloff: bool,
}

impl Default for DecayShape {
    fn default() -> Self {
        DecayShape {
            attack_samples: 200,
            sustain_threshold: 0.4,
            sustain_beats: 2.0,
            long_note_falloff: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeGenerator {
    pub seconds_per_beat: f64,
    pub frame_rate: u32,
    pub shape: DecayShape,
}

impl DecayShape {
    /// The attack must leave sample 0 silent, and the long-note threshold
    /// divides the falloff exponent.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.attack_samples == 0 {
            return Err(ConfigError::InvalidDecayShape {
                field: "attackSamples",
                value: 0.0,
            });
        }
        if !(self.sustain_threshold.is_finite() && self.sustain_threshold > 0.0) {
            return Err(ConfigError::InvalidDecayShape {
                field: "sustainThreshold",
                value: self.sustain_threshold,
            });
        }
        if !(self.sustain_beats.is_finite() && self.sustain_beats >= 0.0) {
            return Err(ConfigError::InvalidDecayShape {
                field: "sustainBeats",
                value: self.sustain_beats,
            });
        }
        Ok(())
    }
}

impl EnvelopeGenerator {
    pub fn new(seconds_per_beat: f64, frame_rate: u32) -> Self {
        EnvelopeGenerator {
            seconds_per_beat,
            frame_rate,
            shape: DecayShape::default(),
        }
    }

    pub fn with_shape(mut self, shape: DecayShape) -> Result<Self> {
        shape.validate()?;
        self.shape = shape;
        Ok(self)
    }

    /// Attack-then-decay curve for a note of `beats` beats.
    ///
    /// `strength` sets how far the note decays: the floor is
    /// `peak * (1 - strength)`. A strength above 1 also cuts the note short,
    /// sounding only `1 / strength` of it and padding the rest with silence.
    pub fn linear_decay(&self, beats: f64, peak: f64, strength: f64) -> Result<Envelope> {
        let total = samples_for_beats(beats, self.seconds_per_beat, self.frame_rate)?;
        let (active, strength) = if strength > 1.0 {
            ((total as f64 / strength) as usize, 1.0)
        } else {
            (total, strength)
        };

        let mut curve = vec![0.0; total];
        if active < 2 {
            return Ok(Envelope::new(curve));
        }

        let shape = &self.shape;
        let last = active - 1;
        let floor = peak * (1.0 - strength);
        let long = beats > shape.sustain_threshold;

        let mut anchors = BTreeMap::new();
        anchors.insert(0, 0.0);
        // A note too short to finish its attack ends on the peak.
        let attack = shape.attack_samples.clamp(1, last);
        anchors.insert(attack, peak);
        let final_level = if long {
            let sustain =
                (self.seconds_per_beat * self.frame_rate as f64 * shape.sustain_beats) as usize;
            if sustain > attack && sustain < last {
                anchors.insert(sustain, floor);
            }
            if shape.long_note_falloff {
                floor.powf(beats / shape.sustain_threshold)
            } else {
                floor
            }
        } else {
            floor
        };
        if attack < last {
            anchors.insert(last, final_level);
        }

        let points: Vec<(usize, f64)> = anchors.into_iter().collect();
        for pair in points.windows(2) {
            let (start, from) = pair[0];
            let (end, to) = pair[1];
            let span = (end - start) as f64;
            for (i, value) in curve[start..=end].iter_mut().enumerate() {
                *value = from + (to - from) * i as f64 / span;
            }
        }
        Ok(Envelope::new(curve))
    }
}
