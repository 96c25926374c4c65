//! Harmonic profiles — weighted stacks of partial multipliers that give a
//! tone its timbre.

use serde::{Deserialize, Serialize};

use crate::error::{ComputationError, ConfigError, Result};

/// One sine component: a multiple of the fundamental and its strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Partial {
    pub multiplier: f64,
    pub weight: f64,
}

/// Multiplier → weight map, kept in insertion order.
///
/// Multipliers may be non-integer for inharmonic (bell, string-stiffness)
/// timbres. Keys compare by exact value, so merging two profiles overrides
/// only identical multipliers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HarmonicProfile {
    partials: Vec<Partial>,
}

impl HarmonicProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the weight for a multiplier, replacing any existing entry.
    pub fn insert(&mut self, multiplier: f64, weight: f64) {
        match self.partials.iter_mut().find(|p| p.multiplier == multiplier) {
            Some(existing) => existing.weight = weight,
            None => self.partials.push(Partial { multiplier, weight }),
        }
    }

    pub fn get(&self, multiplier: f64) -> Option<f64> {
        self.partials
            .iter()
            .find(|p| p.multiplier == multiplier)
            .map(|p| p.weight)
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.partials.iter().map(|p| p.weight).sum()
    }

    /// Shallow override: `other`'s entries replace ours for equal
    /// multipliers, new multipliers are appended.
    pub fn merge(mut self, other: &HarmonicProfile) -> Self {
        for p in &other.partials {
            self.insert(p.multiplier, p.weight);
        }
        self
    }

    /// Scale weights to sum to 1. An empty profile becomes the bare
    /// fundamental.
    pub fn normalize(&self) -> Result<HarmonicProfile> {
        if self.partials.is_empty() {
            return Ok(HarmonicProfile::from_iter([(1.0, 1.0)]));
        }
        let total = self.total_weight();
        if total == 0.0 || !total.is_finite() {
            return Err(ComputationError::DegenerateHarmonics(total).into());
        }
        Ok(self
            .partials
            .iter()
            .map(|p| (p.multiplier, p.weight / total))
            .collect())
    }

    /// Ten partials built from `(multiplier(i), weight(i))` for `i` in 1..=10.
    fn series(multiplier: impl Fn(f64) -> f64, weight: impl Fn(f64) -> f64) -> Self {
        (1..=10)
            .map(|i| {
                let i = i as f64;
                (multiplier(i), weight(i))
            })
            .collect()
    }

    /// Harmonics falling off as 1/n (sawtooth-like).
    pub fn simple() -> Self {
        Self::series(|i| i, |i| 1.0 / i)
    }

    /// Harmonics falling off as 1/n².
    pub fn decayed() -> Self {
        Self::series(|i| i, |i| 1.0 / (i * i))
    }

    /// Harmonics falling off as 1/2ⁿ.
    pub fn exp_decayed() -> Self {
        Self::series(|i| i, |i| 1.0 / 2.0_f64.powf(i))
    }

    /// Slightly flattened upper partials.
    pub fn negradius() -> Self {
        Self::series(|i| 0.9992_f64.powf(i - 1.0) * i, |i| 1.0 / (2.0 * 1.7_f64.powf(i)))
    }

    /// Slightly stretched upper partials, as from a stiff string.
    pub fn inharmonic() -> Self {
        Self::series(|i| 1.0008_f64.powf(i - 1.0) * i, |i| 1.0 / 1.65_f64.powf(i))
    }

    pub fn inharmonic2() -> Self {
        Self::series(|i| 1.00081_f64.powf(i - 1.0) * i, |i| 1.0 / 1.75_f64.powf(i))
    }

    pub fn inharmonic3() -> Self {
        Self::series(|i| 1.00083_f64.powf(i - 1.0) * i, |i| 1.0 / 1.71_f64.powf(i))
    }

    /// Widely spread partials for struck, non-pitched sounds.
    pub fn percussive() -> Self {
        Self::series(|i| 1.6_f64.powf(i - 1.0) * i, |i| 1.0 / 2.0_f64.powf(i))
    }

    /// Look up a profile by preset name.
    pub fn preset(name: &str) -> std::result::Result<Self, ConfigError> {
        Ok(match name {
            "simple" => Self::simple(),
            "decayed" => Self::decayed(),
            "exp_decayed" => Self::exp_decayed(),
            "negradius" => Self::negradius(),
            "inharmonic" => Self::inharmonic(),
            "inharmonic2" => Self::inharmonic2(),
            "inharmonic3" => Self::inharmonic3(),
            "percussive" => Self::percussive(),
            _ => return Err(ConfigError::UnknownHarmonicPreset(name.to_string())),
        })
    }
}

impl FromIterator<(f64, f64)> for HarmonicProfile {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let mut profile = HarmonicProfile::new();
        for (multiplier, weight) in iter {
            profile.insert(multiplier, weight);
        }
        profile
    }
}
