//! Mixers — combine concurrent voices into one buffer.
//!
//! Every secondary is first aligned to the primary: resampled to the
//! primary's frame rate, then cut or zero-filled to its length. Mixing runs
//! on normalized [-1, 1] values and the result takes the primary's width.

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;

pub trait Mix {
    fn combine(&self, primary: &SampleBuffer, secondaries: &[&SampleBuffer]) -> SampleBuffer;
}

/// Flat sum with a hard clip at full scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Combiner;

impl Mix for Combiner {
    fn combine(&self, primary: &SampleBuffer, secondaries: &[&SampleBuffer]) -> SampleBuffer {
        let rate = primary.frame_rate();
        let mut mixed = primary.normalized();
        for secondary in secondaries {
            let aligned = secondary.aligned_to(rate, mixed.len());
            for (m, s) in mixed.iter_mut().zip(aligned) {
                *m += s;
            }
        }
        let mut clipped = 0usize;
        for m in mixed.iter_mut() {
            if m.abs() > 1.0 {
                clipped += 1;
                *m = m.clamp(-1.0, 1.0);
            }
        }
        if clipped > 0 {
            log::warn!("combiner clipped {clipped} of {} samples", mixed.len());
        }
        SampleBuffer::from_normalized(mixed, rate, primary.width())
    }
}

/// Sign-aware blend. Where primary and secondary share a sign the result
/// saturates as `sign * (1 - (1 - |p|)(1 - |s|))` rather than adding, so
/// layered voices in phase approach full scale without overshooting;
/// opposite signs simply sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecayedCombiner;

fn blend(primary: f64, secondary: f64) -> f64 {
    let sign = primary.signum();
    if primary != 0.0 && secondary != 0.0 && secondary.signum() == sign {
        sign * (1.0 - (1.0 - primary.abs()) * (1.0 - secondary.abs()))
    } else {
        primary + secondary
    }
}

impl Mix for DecayedCombiner {
    fn combine(&self, primary: &SampleBuffer, secondaries: &[&SampleBuffer]) -> SampleBuffer {
        let secondary = match secondaries {
            [] => return primary.clone(),
            [only] => (*only).clone(),
            [first, rest @ ..] => self.combine(first, rest),
        };
        let rate = primary.frame_rate();
        let values = primary.normalized();
        let aligned = secondary.aligned_to(rate, values.len());
        let mixed = values
            .iter()
            .zip(aligned)
            .map(|(&p, s)| blend(p, s))
            .collect();
        SampleBuffer::from_normalized(mixed, rate, primary.width())
    }
}

/// Mixer selection for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixMode {
    #[default]
    Clip,
    Decayed,
}

impl Mix for MixMode {
    fn combine(&self, primary: &SampleBuffer, secondaries: &[&SampleBuffer]) -> SampleBuffer {
        match self {
            MixMode::Clip => Combiner.combine(primary, secondaries),
            MixMode::Decayed => DecayedCombiner.combine(primary, secondaries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::SampleWidth;
    use approx::assert_relative_eq;

    fn float(values: &[f64]) -> SampleBuffer {
        SampleBuffer::new(values.to_vec(), 8000, SampleWidth::Float)
    }

    fn noise(seed: u64, len: usize) -> SampleBuffer {
        let mut rng = seed;
        let values: Vec<f64> = (0..len)
            .map(|_| {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (rng as f64 / u64::MAX as f64) * 2.0 - 1.0
            })
            .collect();
        float(&values)
    }

    #[test]
    fn sums_and_clips() {
        let out = Combiner.combine(&float(&[0.5, 0.9, -0.8]), &[&float(&[0.2, 0.5, -0.5])]);
        assert_relative_eq!(out.samples()[0], 0.7);
        assert_eq!(out.samples()[1], 1.0);
        assert_eq!(out.samples()[2], -1.0);
    }

    #[test]
    fn outputs_stay_in_range() {
        let primary = noise(1, 2000);
        let (a, b, c) = (noise(2, 2000), noise(3, 1500), noise(4, 3000));
        for mixer in [MixMode::Clip, MixMode::Decayed] {
            let out = mixer.combine(&primary, &[&a, &b, &c]);
            assert_eq!(out.len(), 2000);
            for &s in out.samples() {
                assert!((-1.0..=1.0).contains(&s), "{mixer:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn short_secondaries_are_zero_filled() {
        let out = Combiner.combine(&float(&[0.1, 0.1, 0.1]), &[&float(&[0.2])]);
        assert_relative_eq!(out.samples()[0], 0.3);
        assert_relative_eq!(out.samples()[1], 0.1);
        assert_relative_eq!(out.samples()[2], 0.1);
    }

    #[test]
    fn offset_voice_lines_up() {
        let late = float(&[0.4]).delayed(2);
        let out = Combiner.combine(&float(&[0.0, 0.0, 0.0]), &[&late]);
        assert_eq!(out.samples(), &[0.0, 0.0, 0.4]);
    }

    #[test]
    fn secondaries_are_resampled_to_primary_rate() {
        let slow = SampleBuffer::new(vec![0.0, 0.4], 4000, SampleWidth::Float);
        let out = Combiner.combine(&float(&[0.0; 4]), &[&slow]);
        assert_relative_eq!(out.samples()[1], 0.2);
        assert_relative_eq!(out.samples()[2], 0.4);
    }

    #[test]
    fn output_takes_primary_width() {
        let primary = SampleBuffer::from_normalized(vec![0.5, -0.5], 8000, SampleWidth::I16);
        let out = Combiner.combine(&primary, &[&float(&[0.25, 0.25])]);
        assert_eq!(out.width(), SampleWidth::I16);
        assert_relative_eq!(out.samples()[0], 0.75 * 32767.0, epsilon = 1e-9);
        assert_relative_eq!(out.samples()[1], -0.25 * 32767.0, epsilon = 1e-9);
    }

    #[test]
    fn decayed_saturates_matching_signs() {
        let out = DecayedCombiner.combine(
            &float(&[0.5, -0.5, 0.5, 0.0, 0.0]),
            &[&float(&[0.5, -0.5, -0.3, 0.4, 0.0])],
        );
        assert_relative_eq!(out.samples()[0], 0.75);
        assert_relative_eq!(out.samples()[1], -0.75);
        assert_relative_eq!(out.samples()[2], 0.2);
        assert_relative_eq!(out.samples()[3], 0.4);
        assert_eq!(out.samples()[4], 0.0);
    }

    #[test]
    fn decayed_folds_secondaries_pairwise() {
        let p = float(&[0.5]);
        let a = float(&[0.5]);
        let b = float(&[0.5]);
        let out = DecayedCombiner.combine(&p, &[&a, &b]);
        // a and b blend to 0.75, which blends with p to 0.875.
        assert_relative_eq!(out.samples()[0], 0.875);
    }

    #[test]
    fn no_secondaries() {
        let p = float(&[0.3, -0.3]);
        assert_eq!(DecayedCombiner.combine(&p, &[]), p);
        assert_eq!(Combiner.combine(&p, &[]).samples(), p.samples());
    }
}
