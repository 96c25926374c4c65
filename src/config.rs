//! Synth configuration, loadable from JSON.
//!
//! Every section has defaults, so `{}` is a complete configuration: 16-bit
//! output at 22050 Hz, one second per beat, a G tonic on septimal minor
//! ratios pinned to equal-tempered G, and a stretched-string timbre.

use serde::{Deserialize, Serialize};

use crate::dsp::envelope::DecayShape;
use crate::dsp::filter::{FilterChain, Harsher};
use crate::dsp::harmonics::{HarmonicProfile, Partial};
use crate::dsp::mixer::MixMode;
use crate::dsp::renderer::Performer;
use crate::dsp::tone::RenderSettings;
use crate::error::{ConfigError, Result};
use crate::tuning::{Ratio, RatioTable, Tonic, Tuning};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynthConfig {
    pub render: RenderSettings,
    pub tonic: TonicConfig,
    pub tuning: TuningPreferences,
    /// Note to pin to its equal-tempered frequency after tuning.
    pub renormalize_to: Option<String>,
    pub harmonics: HarmonicsConfig,
    pub envelope: DecayShape,
    pub performer: Performer,
    pub mix: MixMode,
    /// Filter names applied to every partial, in order.
    pub filters: Vec<String>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            render: RenderSettings::default(),
            tonic: TonicConfig::default(),
            tuning: TuningPreferences::default(),
            renormalize_to: Some("G".to_string()),
            harmonics: HarmonicsConfig::default(),
            envelope: DecayShape::default(),
            performer: Performer::default(),
            mix: MixMode::default(),
            filters: Vec::new(),
        }
    }
}

impl SynthConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn build_tuning(&self) -> Result<Tuning> {
        let tonic = match self.tonic.frequency {
            Some(frequency) => Tonic::new(&self.tonic.name, frequency)?,
            None => Tonic::equal_tempered(&self.tonic.name)?,
        };
        Tuning::build(tonic, &self.tuning.tables()?, self.renormalize_to.as_deref())
    }

    pub fn harmonic_profile(&self) -> Result<HarmonicProfile> {
        self.harmonics.profile()
    }

    pub fn filter_chain(&self) -> Result<FilterChain> {
        let mut chain = FilterChain::new();
        for name in &self.filters {
            match name.as_str() {
                "harsher" => chain.push(Harsher),
                _ => return Err(ConfigError::UnknownFilter(name.clone()).into()),
            }
        }
        Ok(chain)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TonicConfig {
    pub name: String,
    /// Defaults to the equal-tempered frequency of `name`.
    pub frequency: Option<f64>,
}

impl Default for TonicConfig {
    fn default() -> Self {
        TonicConfig {
            name: "G".to_string(),
            frequency: None,
        }
    }
}

/// A ratio table by preset name or spelled out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableSource {
    Preset(String),
    Table(RatioTable),
}

/// Ratio tables in priority order.
///
/// A bare table (`[[1, 1], null, [9, 8], ...]`) is accepted by the parser
/// so the mistake can be reported precisely when the tables are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TuningPreferences {
    Prioritized(Vec<TableSource>),
    Single(Vec<Option<Ratio>>),
}

impl Default for TuningPreferences {
    fn default() -> Self {
        TuningPreferences::Prioritized(vec![TableSource::Preset("minor".to_string())])
    }
}

impl TuningPreferences {
    pub fn tables(&self) -> std::result::Result<Vec<RatioTable>, ConfigError> {
        match self {
            TuningPreferences::Single(_) => Err(ConfigError::SingleRatioTable),
            TuningPreferences::Prioritized(sources) => sources
                .iter()
                .map(|source| match source {
                    TableSource::Preset(name) => RatioTable::preset(name),
                    TableSource::Table(table) => Ok(table.clone()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicsConfig {
    /// Preset profiles merged in order; later presets override equal
    /// multipliers.
    pub presets: Vec<String>,
    /// Explicit partials merged last.
    pub partials: Vec<Partial>,
}

impl Default for HarmonicsConfig {
    fn default() -> Self {
        HarmonicsConfig {
            presets: ["inharmonic", "inharmonic2", "inharmonic3", "exp_decayed"]
                .map(String::from)
                .to_vec(),
            partials: Vec::new(),
        }
    }
}

impl HarmonicsConfig {
    pub fn profile(&self) -> Result<HarmonicProfile> {
        let mut profile = HarmonicProfile::new();
        for name in &self.presets {
            profile = profile.merge(&HarmonicProfile::preset(name)?);
        }
        for partial in &self.partials {
            profile.insert(partial.multiplier, partial.weight);
        }
        Ok(profile)
    }
}
