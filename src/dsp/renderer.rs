//! Melody renderer — drives the whole pipeline for a symbolic melody.
//!
//! For every note: tuning gives the frequency, the performer turns its
//! length into an envelope, and the tone factory renders it. Notes are laid
//! end to end; several melodies can be mixed as concurrent voices.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;
use super::envelope::{DecayShape, Envelope, EnvelopeGenerator};
use super::filter::FilterChain;
use super::mixer::{Mix, MixMode};
use super::tone::{Amplitude, HarmonicToneFactory, Render};
use crate::config::SynthConfig;
use crate::error::Result;
use crate::melody::{Melody, Note};
use crate::tuning::Tuning;

/// How notes are phrased: their length unit and how loud and how far they
/// decay. Longer notes start slightly louder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Performer {
    /// Beats lasted by a note of unit length.
    pub beat_unit: f64,
    pub base_amplitude: f64,
    pub amplitude_per_beat: f64,
    pub strength: f64,
}

impl Default for Performer {
    fn default() -> Self {
        Performer {
            beat_unit: 0.25,
            base_amplitude: 0.3,
            amplitude_per_beat: 0.08,
            strength: 0.8,
        }
    }
}

impl Performer {
    /// Envelope peak for a note of `beats` beats.
    pub fn peak(&self, beats: f64) -> f64 {
        self.base_amplitude + self.amplitude_per_beat * beats
    }
}

pub struct MelodyRenderer<R: Render = HarmonicToneFactory> {
    tuning: Tuning,
    factory: R,
    generator: EnvelopeGenerator,
    performer: Performer,
    filters: FilterChain,
    mix: MixMode,
    /// Envelopes reused by (beats, peak, strength) so repeated notes hit
    /// the factory's identity-keyed cache.
    envelopes: HashMap<[u64; 3], Envelope>,
}

impl MelodyRenderer<HarmonicToneFactory> {
    pub fn from_config(config: &SynthConfig) -> Result<Self> {
        let tuning = config.build_tuning()?;
        let factory = HarmonicToneFactory::new(config.render, &config.harmonic_profile()?)?;
        Ok(MelodyRenderer::new(tuning, factory, config.performer.clone())
            .with_shape(config.envelope.clone())?
            .with_filters(config.filter_chain()?)
            .with_mix(config.mix))
    }
}

impl<R: Render> MelodyRenderer<R> {
    pub fn new(tuning: Tuning, factory: R, performer: Performer) -> Self {
        let generator = factory.envelope_generator();
        MelodyRenderer {
            tuning,
            factory,
            generator,
            performer,
            filters: FilterChain::new(),
            mix: MixMode::default(),
            envelopes: HashMap::new(),
        }
    }

    pub fn with_shape(mut self, shape: DecayShape) -> Result<Self> {
        self.generator = self.generator.with_shape(shape)?;
        self.envelopes.clear();
        Ok(self)
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_mix(mut self, mix: MixMode) -> Self {
        self.mix = mix;
        self
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn factory(&self) -> &R {
        &self.factory
    }

    pub fn performer(&self) -> &Performer {
        &self.performer
    }

    fn envelope(&mut self, beats: f64) -> Result<Envelope> {
        let peak = self.performer.peak(beats);
        let strength = self.performer.strength;
        let key = [beats.to_bits(), peak.to_bits(), strength.to_bits()];
        if let Some(envelope) = self.envelopes.get(&key) {
            return Ok(envelope.clone());
        }
        let envelope = self.generator.linear_decay(beats, peak, strength)?;
        self.envelopes.insert(key, envelope.clone());
        Ok(envelope)
    }

    /// Render one note.
    pub fn render_note(&mut self, note: &Note) -> Result<Arc<SampleBuffer>> {
        let beats = note.beats(self.performer.beat_unit)?;
        let frequency = self.tuning.frequency(note)?;
        let envelope = self.envelope(beats)?;
        self.factory
            .render(frequency, &Amplitude::Envelope(envelope), beats, &self.filters)
    }

    /// Render a melody's notes back to back.
    pub fn render(&mut self, melody: &Melody) -> Result<SampleBuffer> {
        let notes = melody
            .notes
            .iter()
            .map(|note| self.render_note(note))
            .collect::<Result<Vec<_>>>()?;
        let settings = self.factory.settings();
        let song = SampleBuffer::concat(
            notes.iter().map(|n| n.as_ref()),
            settings.frame_rate,
            self.factory.width(),
        );
        log::debug!(
            "rendered {} note(s) into {} samples ({} computed renders so far)",
            melody.len(),
            song.len(),
            self.factory.renders_computed()
        );
        Ok(song)
    }

    /// Render melodies as simultaneous voices and mix them. The longest
    /// voice sets the output length.
    pub fn render_voices(&mut self, voices: &[Melody]) -> Result<SampleBuffer> {
        let mut rendered = voices
            .iter()
            .map(|melody| self.render(melody))
            .collect::<Result<Vec<_>>>()?;
        let Some(longest) = (0..rendered.len()).max_by_key(|&i| rendered[i].len()) else {
            let settings = self.factory.settings();
            return Ok(SampleBuffer::silence(0, settings.frame_rate, self.factory.width()));
        };
        let primary = rendered.swap_remove(longest);
        let secondaries: Vec<&SampleBuffer> = rendered.iter().collect();
        Ok(self.mix.combine(&primary, &secondaries))
    }
}
