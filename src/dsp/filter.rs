//! Waveform filters applied to a rendered tone before it is cached.
//!
//! Filters are strategy objects chained in order; each receives the samples
//! plus the render arguments and returns the new samples.

use std::fmt;
use std::sync::Arc;

use super::tone::Amplitude;
use crate::error::{ComputationError, Result};

pub trait ToneFilter {
    /// Stable name, used in render cache keys. Two filters with the same
    /// name must transform samples identically.
    fn name(&self) -> &str;

    fn apply(&self, tone: Vec<f64>, frequency: f64, amplitude: &Amplitude, beats: f64) -> Vec<f64>;
}

/// Sign-preserving compression toward the mean magnitude:
/// `sign(x) * sqrt(mean|x| * |x|)`. Quiet parts are lifted and peaks pulled
/// in, which adds odd harmonics and a rougher edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Harsher;

impl ToneFilter for Harsher {
    fn name(&self) -> &str {
        "harsher"
    }

    fn apply(&self, tone: Vec<f64>, _: f64, _: &Amplitude, _: f64) -> Vec<f64> {
        if tone.is_empty() {
            return tone;
        }
        let mean = tone.iter().map(|s| s.abs()).sum::<f64>() / tone.len() as f64;
        tone.into_iter()
            .map(|s| {
                if s == 0.0 {
                    0.0
                } else {
                    s.signum() * (mean * s.abs()).sqrt()
                }
            })
            .collect()
    }
}

/// A named closure as a filter.
pub struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F> FnFilter<F>
where
    F: Fn(Vec<f64>, f64, &Amplitude, f64) -> Vec<f64>,
{
    pub fn new(name: &str, f: F) -> Self {
        FnFilter {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> ToneFilter for FnFilter<F>
where
    F: Fn(Vec<f64>, f64, &Amplitude, f64) -> Vec<f64>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, tone: Vec<f64>, frequency: f64, amplitude: &Amplitude, beats: f64) -> Vec<f64> {
        (self.f)(tone, frequency, amplitude, beats)
    }
}

/// Filters applied in registration order.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ToneFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl ToneFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: impl ToneFilter + 'static) {
        self.filters.push(Arc::new(filter));
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }

    /// Run every filter in order. A filter must keep the tone's length.
    pub fn apply(
        &self,
        tone: Vec<f64>,
        frequency: f64,
        amplitude: &Amplitude,
        beats: f64,
    ) -> Result<Vec<f64>> {
        let expected = tone.len();
        self.filters.iter().try_fold(tone, |tone, filter| {
            let tone = filter.apply(tone, frequency, amplitude, beats);
            if tone.len() != expected {
                return Err(ComputationError::FilteredLength {
                    filter: filter.name().to_string(),
                    expected,
                    found: tone.len(),
                }
                .into());
            }
            Ok(tone)
        })
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.filters.iter().map(|x| x.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthError;
    use approx::assert_relative_eq;

    #[test]
    fn harsher_keeps_sign_and_zero() {
        let out = Harsher.apply(vec![0.0, 0.25, -0.25, 1.0], 440.0, &Amplitude::Constant(1.0), 1.0);
        let mean = (0.25 + 0.25 + 1.0) / 4.0;
        assert_eq!(out[0], 0.0);
        assert_relative_eq!(out[1], (mean * 0.25_f64).sqrt());
        assert_relative_eq!(out[2], -(mean * 0.25_f64).sqrt());
        assert_relative_eq!(out[3], (mean * 1.0_f64).sqrt());
    }

    #[test]
    fn harsher_leaves_square_wave_alone() {
        let square = vec![0.5, -0.5, 0.5, -0.5];
        let out = Harsher.apply(square.clone(), 1.0, &Amplitude::Constant(1.0), 1.0);
        for (a, b) in out.iter().zip(&square) {
            assert_relative_eq!(*a, *b);
        }
    }

    #[test]
    fn chain_applies_in_order() {
        let chain = FilterChain::new()
            .with(FnFilter::new("add", |t: Vec<f64>, _: f64, _: &Amplitude, _: f64| {
                t.into_iter().map(|s| s + 1.0).collect()
            }))
            .with(FnFilter::new("double", |t: Vec<f64>, _: f64, _: &Amplitude, _: f64| {
                t.into_iter().map(|s| s * 2.0).collect()
            }));
        assert_eq!(chain.names(), vec!["add".to_string(), "double".to_string()]);
        let out = chain.apply(vec![0.0, 1.0], 1.0, &Amplitude::Constant(1.0), 1.0).unwrap();
        assert_eq!(out, vec![2.0, 4.0]);
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        let out = chain.apply(vec![0.3], 1.0, &Amplitude::Constant(1.0), 1.0).unwrap();
        assert_eq!(out, vec![0.3]);
    }

    #[test]
    fn length_changing_filter_is_rejected() {
        let chain = FilterChain::new().with(FnFilter::new(
            "trim",
            |t: Vec<f64>, _: f64, _: &Amplitude, _: f64| t.into_iter().take(1).collect(),
        ));
        let err = chain
            .apply(vec![0.1, 0.2, 0.3], 1.0, &Amplitude::Constant(1.0), 1.0)
            .unwrap_err();
        match err {
            SynthError::Computation(ComputationError::FilteredLength {
                filter,
                expected,
                found,
            }) => {
                assert_eq!(filter, "trim");
                assert_eq!((expected, found), (3, 1));
            }
            other => panic!("expected a length error, got {other:?}"),
        }
    }
}
