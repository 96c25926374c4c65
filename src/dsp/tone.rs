//! Tone factories — render sine tones and additive harmonic stacks into
//! sample buffers, memoizing every finished render.

use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::buffer::{SampleBuffer, SampleWidth};
use super::cache::{RenderCache, RenderKey};
use super::envelope::{Envelope, EnvelopeGenerator, samples_for_beats};
use super::filter::FilterChain;
use super::harmonics::HarmonicProfile;
use crate::error::{ComputationError, ConfigError, Result};

/// Gain applied across a rendered note: a fixed level or a per-sample curve.
#[derive(Debug, Clone)]
pub enum Amplitude {
    Constant(f64),
    Envelope(Envelope),
}

impl From<f64> for Amplitude {
    fn from(value: f64) -> Self {
        Amplitude::Constant(value)
    }
}

impl From<Envelope> for Amplitude {
    fn from(envelope: Envelope) -> Self {
        Amplitude::Envelope(envelope)
    }
}

impl Amplitude {
    /// An envelope must cover exactly the note it shapes.
    fn check_len(&self, expected: usize) -> Result<()> {
        match self {
            Amplitude::Envelope(env) if env.len() != expected => {
                Err(ComputationError::EnvelopeLength {
                    expected,
                    found: env.len(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    #[inline]
    fn at(&self, index: usize) -> f64 {
        match self {
            Amplitude::Constant(value) => *value,
            Amplitude::Envelope(env) => env.samples()[index],
        }
    }
}

/// Output format and tempo shared by every render of a factory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderSettings {
    /// Sample width in bytes: 1 (unsigned), 2, 4 or 8.
    pub width: u8,
    pub frame_rate: u32,
    pub seconds_per_beat: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            width: 2,
            frame_rate: 22050,
            seconds_per_beat: 1.0,
        }
    }
}

impl RenderSettings {
    fn validate(&self) -> std::result::Result<SampleWidth, ConfigError> {
        let width = SampleWidth::from_bytes(self.width)?;
        if self.frame_rate == 0 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if !(self.seconds_per_beat.is_finite() && self.seconds_per_beat > 0.0) {
            return Err(ConfigError::InvalidTempo(self.seconds_per_beat));
        }
        Ok(width)
    }
}

/// Something that turns `(frequency, amplitude, beats, filters)` into a
/// buffer. Identical arguments return the same shared buffer.
pub trait Render {
    /// Render one tone of exactly `beats` beats.
    ///
    /// Samples are centred on zero for every width, unsigned 8-bit
    /// included; the +127 offset is only applied by
    /// [`SampleBuffer::to_pcm`]. Filters may not change the length.
    fn render(
        &mut self,
        frequency: f64,
        amplitude: &Amplitude,
        beats: f64,
        filters: &FilterChain,
    ) -> Result<Arc<SampleBuffer>>;

    fn settings(&self) -> &RenderSettings;

    /// Number of renders actually computed by this factory.
    fn renders_computed(&self) -> u64;

    fn width(&self) -> SampleWidth;

    /// Samples spanned by a note of `beats` beats.
    fn samples_for(&self, beats: f64) -> Result<usize> {
        let settings = self.settings();
        samples_for_beats(beats, settings.seconds_per_beat, settings.frame_rate)
    }

    /// Envelope generator matching this factory's tempo and frame rate,
    /// so its curves line up with rendered notes.
    fn envelope_generator(&self) -> EnvelopeGenerator {
        let settings = self.settings();
        EnvelopeGenerator::new(settings.seconds_per_beat, settings.frame_rate)
    }
}

fn check_frequency(frequency: f64) -> Result<()> {
    if frequency.is_finite() && frequency >= 0.0 {
        Ok(())
    } else {
        Err(ComputationError::InvalidFrequency(frequency).into())
    }
}

/// Renders single sine partials.
#[derive(Debug)]
pub struct ToneFactory {
    settings: RenderSettings,
    width: SampleWidth,
    cache: RenderCache,
}

impl ToneFactory {
    pub fn new(settings: RenderSettings) -> Result<Self> {
        let width = settings.validate()?;
        log::debug!(
            "tone factory: {:?} @ {} Hz, {} s/beat",
            width,
            settings.frame_rate,
            settings.seconds_per_beat
        );
        Ok(ToneFactory {
            settings,
            width,
            cache: RenderCache::new(),
        })
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    fn synthesize(
        settings: &RenderSettings,
        width: SampleWidth,
        frequency: f64,
        amplitude: &Amplitude,
        beats: f64,
        filters: &FilterChain,
    ) -> Result<SampleBuffer> {
        check_frequency(frequency)?;
        let len = samples_for_beats(beats, settings.seconds_per_beat, settings.frame_rate)?;
        amplitude.check_len(len)?;

        let scale = width.full_scale();
        let step = 2.0 * PI * frequency / settings.frame_rate as f64;
        let tone: Vec<f64> = (0..len)
            .map(|i| scale * amplitude.at(i) * (step * i as f64).sin())
            .collect();
        let tone = filters.apply(tone, frequency, amplitude, beats)?;
        Ok(SampleBuffer::new(tone, settings.frame_rate, width))
    }
}

impl Render for ToneFactory {
    /// Sine at `frequency` scaled to full scale, shaped by `amplitude` and
    /// passed through `filters`. For width 1 the buffer still holds signed
    /// samples in [-127, 127]; pack it with [`SampleBuffer::to_pcm`] to get
    /// the non-negative unsigned bytes.
    fn render(
        &mut self,
        frequency: f64,
        amplitude: &Amplitude,
        beats: f64,
        filters: &FilterChain,
    ) -> Result<Arc<SampleBuffer>> {
        let key = RenderKey::new(frequency, amplitude, beats, filters);
        let (settings, width) = (&self.settings, self.width);
        self.cache.get_or_try_insert_with(key, || {
            Self::synthesize(settings, width, frequency, amplitude, beats, filters)
        })
    }

    fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn renders_computed(&self) -> u64 {
        self.cache.computed()
    }

    fn width(&self) -> SampleWidth {
        self.width
    }
}

/// Additive synthesis: one sine per partial of a harmonic profile, each
/// rendered (and cached) by an inner [`ToneFactory`], summed and then shaped
/// by the caller's amplitude.
#[derive(Debug)]
pub struct HarmonicToneFactory {
    base: ToneFactory,
    harmonics: HarmonicProfile,
    cache: RenderCache,
}

impl HarmonicToneFactory {
    pub fn new(settings: RenderSettings, harmonics: &HarmonicProfile) -> Result<Self> {
        let base = ToneFactory::new(settings)?;
        let harmonics = harmonics.normalize()?;
        log::debug!("harmonic tone factory with {} partial(s)", harmonics.len());
        Ok(HarmonicToneFactory {
            base,
            harmonics,
            cache: RenderCache::new(),
        })
    }

    /// The normalized profile.
    pub fn harmonics(&self) -> &HarmonicProfile {
        &self.harmonics
    }

    pub fn base(&self) -> &ToneFactory {
        &self.base
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }
}

impl Render for HarmonicToneFactory {
    fn render(
        &mut self,
        frequency: f64,
        amplitude: &Amplitude,
        beats: f64,
        filters: &FilterChain,
    ) -> Result<Arc<SampleBuffer>> {
        let key = RenderKey::new(frequency, amplitude, beats, filters);
        let (base, harmonics) = (&mut self.base, &self.harmonics);
        self.cache.get_or_try_insert_with(key, || {
            check_frequency(frequency)?;
            let len = base.samples_for(beats)?;
            amplitude.check_len(len)?;

            let mut sum = vec![0.0; len];
            for partial in harmonics.partials() {
                let tone = base.render(
                    partial.multiplier * frequency,
                    &Amplitude::Constant(partial.weight),
                    beats,
                    filters,
                )?;
                for (acc, s) in sum.iter_mut().zip(tone.samples()) {
                    *acc += s;
                }
            }
            for (i, s) in sum.iter_mut().enumerate() {
                *s *= amplitude.at(i);
            }
            Ok(SampleBuffer::new(sum, base.settings.frame_rate, base.width))
        })
    }

    fn settings(&self) -> &RenderSettings {
        &self.base.settings
    }

    fn renders_computed(&self) -> u64 {
        self.cache.computed()
    }

    fn width(&self) -> SampleWidth {
        self.base.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::Pcm;
    use crate::dsp::filter::{FnFilter, Harsher};
    use crate::error::SynthError;
    use approx::assert_relative_eq;

    fn settings(width: u8) -> RenderSettings {
        RenderSettings {
            width,
            frame_rate: 22050,
            seconds_per_beat: 1.0,
        }
    }

    fn sine(frequency: f64, i: usize) -> f64 {
        (2.0 * PI * frequency * i as f64 / 22050.0).sin()
    }

    #[test]
    fn one_beat_fills_one_second() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let buf = f.render(440.0, &Amplitude::Constant(1.0), 1.0, &FilterChain::new()).unwrap();
        assert_eq!(buf.len(), 22050);
        assert_eq!(buf.frame_rate(), 22050);
    }

    #[test]
    fn samples_follow_scaled_sine() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let buf = f.render(440.0, &Amplitude::Constant(0.5), 0.1, &FilterChain::new()).unwrap();
        assert_eq!(buf.samples()[0], 0.0);
        for i in [1, 17, 100, 2000] {
            assert_relative_eq!(buf.samples()[i], 32767.0 * 0.5 * sine(440.0, i), epsilon = 1e-9);
        }
    }

    #[test]
    fn identical_renders_are_cached() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let none = FilterChain::new();
        let a = f.render(440.0, &Amplitude::Constant(1.0), 0.5, &none).unwrap();
        let b = f.render(440.0, &Amplitude::Constant(1.0), 0.5, &none).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(f.renders_computed(), 1);

        f.render(440.0, &Amplitude::Constant(1.0), 0.25, &none).unwrap();
        assert_eq!(f.renders_computed(), 2);
    }

    #[test]
    fn envelopes_are_cached_by_identity() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let none = FilterChain::new();
        let envelopes = f.envelope_generator();
        let env = envelopes.linear_decay(0.5, 1.0, 0.8).unwrap();
        let same_values = envelopes.linear_decay(0.5, 1.0, 0.8).unwrap();

        let a = f.render(440.0, &env.clone().into(), 0.5, &none).unwrap();
        let b = f.render(440.0, &env.into(), 0.5, &none).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = f.render(440.0, &same_values.into(), 0.5, &none).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.samples(), c.samples());
        assert_eq!(f.renders_computed(), 2);
    }

    #[test]
    fn envelope_shapes_the_tone() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let env = f.envelope_generator().linear_decay(0.25, 1.0, 0.8).unwrap();
        let buf = f.render(440.0, &env.clone().into(), 0.25, &FilterChain::new()).unwrap();
        assert_eq!(buf.len(), env.len());
        for i in [50, 200, 3000] {
            assert_relative_eq!(
                buf.samples()[i],
                32767.0 * env.samples()[i] * sine(440.0, i),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn filters_run_and_key_the_cache() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let plain = f.render(440.0, &Amplitude::Constant(1.0), 0.1, &FilterChain::new()).unwrap();
        let harsh = f
            .render(440.0, &Amplitude::Constant(1.0), 0.1, &FilterChain::new().with(Harsher))
            .unwrap();
        assert_eq!(f.renders_computed(), 2);
        assert_ne!(plain.samples(), harsh.samples());
    }

    #[test]
    fn unsupported_width_fails_at_construction() {
        let err = ToneFactory::new(settings(3)).unwrap_err();
        assert!(matches!(err, SynthError::Config(ConfigError::UnsupportedWidth(3))));
        assert!(HarmonicToneFactory::new(settings(0), &HarmonicProfile::new()).is_err());
    }

    #[test]
    fn bad_tempo_fails_at_construction() {
        let mut s = settings(2);
        s.seconds_per_beat = 0.0;
        assert!(matches!(
            ToneFactory::new(s),
            Err(SynthError::Config(ConfigError::InvalidTempo(_)))
        ));
    }

    #[test]
    fn mismatched_envelope_is_rejected_and_not_cached() {
        let mut f = ToneFactory::new(settings(2)).unwrap();
        let env = f.envelope_generator().linear_decay(0.5, 1.0, 0.8).unwrap();
        let err = f.render(440.0, &env.into(), 0.25, &FilterChain::new()).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Computation(ComputationError::EnvelopeLength { .. })
        ));
        assert!(f.cache().is_empty());
        assert_eq!(f.renders_computed(), 0);
    }

    #[test]
    fn unsigned_width_packs_non_negative() {
        let mut f = ToneFactory::new(settings(1)).unwrap();
        let buf = f.render(440.0, &Amplitude::Constant(1.0), 0.1, &FilterChain::new()).unwrap();
        assert!(buf.samples().iter().all(|s| s.abs() <= 127.0));
        match buf.to_pcm() {
            Pcm::U8(pcm) => {
                assert_eq!(pcm[0], 127);
                assert!(pcm.iter().any(|&s| s > 200));
                assert!(pcm.iter().any(|&s| s < 50));
            }
            other => panic!("expected u8 pcm, got {other:?}"),
        }
    }

    #[test]
    fn harmonic_render_sums_weighted_partials() {
        let profile: HarmonicProfile = [(1.0, 1.0), (2.0, 0.5)].into_iter().collect();
        let mut f = HarmonicToneFactory::new(settings(2), &profile).unwrap();
        let buf = f.render(220.0, &Amplitude::Constant(1.0), 0.1, &FilterChain::new()).unwrap();
        for i in [3, 40, 999] {
            let expected = 32767.0 * (2.0 / 3.0 * sine(220.0, i) + 1.0 / 3.0 * sine(440.0, i));
            assert_relative_eq!(buf.samples()[i], expected, epsilon = 1e-6);
        }
        assert_eq!(f.base().renders_computed(), 2);
    }

    #[test]
    fn fundamental_only_matches_base_factory() {
        let mut h = HarmonicToneFactory::new(settings(2), &HarmonicProfile::new()).unwrap();
        let mut t = ToneFactory::new(settings(2)).unwrap();
        let env = t.envelope_generator().linear_decay(0.5, 0.7, 0.8).unwrap();
        let a = h.render(330.0, &env.clone().into(), 0.5, &FilterChain::new()).unwrap();
        let b = t.render(330.0, &env.into(), 0.5, &FilterChain::new()).unwrap();
        for (x, y) in a.samples().iter().zip(b.samples()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn harmonic_partials_are_reused_across_envelopes() {
        let mut f = HarmonicToneFactory::new(settings(2), &HarmonicProfile::decayed()).unwrap();
        let envelopes = f.envelope_generator();
        let none = FilterChain::new();
        let first = envelopes.linear_decay(0.5, 0.5, 0.8).unwrap();
        let second = envelopes.linear_decay(0.5, 0.3, 0.8).unwrap();

        let a = f.render(440.0, &first.clone().into(), 0.5, &none).unwrap();
        assert_eq!(f.base().renders_computed(), 10);
        f.render(440.0, &second.into(), 0.5, &none).unwrap();
        // New envelope: new composite, but every partial comes from cache.
        assert_eq!(f.renders_computed(), 2);
        assert_eq!(f.base().renders_computed(), 10);

        let again = f.render(440.0, &first.into(), 0.5, &none).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(f.renders_computed(), 2);
    }

    #[test]
    fn both_factories_reject_length_changing_filters() {
        let trim = FilterChain::new().with(FnFilter::new(
            "trim",
            |t: Vec<f64>, _: f64, _: &Amplitude, _: f64| t.into_iter().take(10).collect(),
        ));
        let mut t = ToneFactory::new(settings(2)).unwrap();
        let err = t.render(440.0, &Amplitude::Constant(1.0), 0.1, &trim).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Computation(ComputationError::FilteredLength { found: 10, .. })
        ));
        assert!(t.cache().is_empty());

        let mut h = HarmonicToneFactory::new(settings(2), &HarmonicProfile::decayed()).unwrap();
        assert!(matches!(
            h.render(440.0, &Amplitude::Constant(1.0), 0.1, &trim),
            Err(SynthError::Computation(ComputationError::FilteredLength { .. }))
        ));
        assert!(h.cache().is_empty());
    }

    #[test]
    fn harmonic_render_rejects_bad_input() {
        let mut f = HarmonicToneFactory::new(settings(2), &HarmonicProfile::simple()).unwrap();
        assert!(f.render(f64::NAN, &Amplitude::Constant(1.0), 1.0, &FilterChain::new()).is_err());
        assert!(f.render(440.0, &Amplitude::Constant(1.0), 0.0, &FilterChain::new()).is_err());
        assert!(f.cache().is_empty());
    }
}
