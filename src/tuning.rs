//! Tuning systems — absolute pitches derived from a tonic and a prioritized
//! list of ratio tables.
//!
//! A tuning covers one octave (the reference octave, C4–B4). Each semitone
//! offset from the tonic is resolved by the first ratio table that defines
//! it, so sparse tables (just intonation, harmonic series) can be patched by
//! fuller ones further down the list.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LookupError, Result};
use crate::melody::Note;

/// Octave the tuning's twelve pitches live in.
pub const REFERENCE_OCTAVE: i32 = 4;

/// Equal-tempered pitch of each pitch class in the reference octave.
/// By convention C4 is 261.625 Hz and A4 is 440 Hz.
const EQUAL_TEMPERED: [f64; 12] = [
    261.625, 277.185, 293.665, 311.125, 329.625, 349.23, 369.995, 391.995, 415.305, 440.0,
    466.16, 493.88,
];

/// Semitone of a note name relative to C of the reference octave.
///
/// Accepts a letter `A`–`G` followed by an optional accidental: `s` or `#`
/// for sharp, `f` or `b` for flat. Spellings that cross the octave boundary
/// fall outside `0..12` (`Cf` is -1, `Bs` is 12).
pub fn note_semitone(name: &str) -> Option<i32> {
    let mut chars = name.chars();
    let base = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let accidental = match chars.as_str() {
        "" => 0,
        "s" | "#" => 1,
        "f" | "b" => -1,
        _ => return None,
    };
    Some(base + accidental)
}

/// Split a note name into (pitch class, octave shift).
fn pitch_class(name: &str) -> std::result::Result<(usize, i32), LookupError> {
    let semitone = note_semitone(name).ok_or_else(|| LookupError::UnknownNote(name.to_string()))?;
    Ok((semitone.rem_euclid(12) as usize, semitone.div_euclid(12)))
}

/// Equal-tempered frequency of a note name in the reference octave.
pub fn equal_tempered_frequency(name: &str) -> Result<f64> {
    let (class, shift) = pitch_class(name)?;
    Ok(EQUAL_TEMPERED[class] * 2.0_f64.powi(shift))
}

// ── Ratios ──────────────────────────────────────────────────

/// A frequency multiplier `numerator / denominator` relative to the tonic.
///
/// Both parts are floating point so irrational tables (equal temperament)
/// fit the same shape. Serializes as a `[numerator, denominator]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratio(pub f64, pub f64);

impl Ratio {
    pub fn value(&self) -> f64 {
        self.0 / self.1
    }

    fn validate(&self) -> std::result::Result<f64, ConfigError> {
        let value = self.value();
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(ConfigError::InvalidRatio {
                numerator: self.0,
                denominator: self.1,
            })
        }
    }
}

/// Twelve optional ratios, one per semitone offset from the tonic.
/// `None` marks a gap to be filled by a later table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Option<Ratio>>", into = "Vec<Option<Ratio>>")]
pub struct RatioTable {
    slots: [Option<Ratio>; 12],
}

impl TryFrom<Vec<Option<Ratio>>> for RatioTable {
    type Error = ConfigError;

    fn try_from(slots: Vec<Option<Ratio>>) -> std::result::Result<Self, Self::Error> {
        let found = slots.len();
        let slots: [Option<Ratio>; 12] = slots
            .try_into()
            .map_err(|_| ConfigError::RatioTableLength { found })?;
        Ok(RatioTable { slots })
    }
}

impl From<RatioTable> for Vec<Option<Ratio>> {
    fn from(table: RatioTable) -> Self {
        table.slots.to_vec()
    }
}

impl RatioTable {
    pub fn new(slots: [Option<Ratio>; 12]) -> Self {
        RatioTable { slots }
    }

    /// A table defining only one semitone, used to patch a single degree of
    /// another table.
    pub fn single(position: usize, ratio: Ratio) -> Self {
        let mut slots = [None; 12];
        if let Some(slot) = slots.get_mut(position) {
            *slot = Some(ratio);
        }
        RatioTable { slots }
    }

    pub fn get(&self, semitone: usize) -> Option<Ratio> {
        self.slots.get(semitone).copied().flatten()
    }

    /// Equal temperament expressed as ratios over C4.
    pub fn equal() -> Self {
        RatioTable {
            slots: EQUAL_TEMPERED.map(|f| Some(Ratio(f / EQUAL_TEMPERED[0], 1.0))),
        }
    }

    /// Harmonic-series intervals; leaves gaps at 1, 5, 6, 8 and 9.
    pub fn harmonic() -> Self {
        RatioTable {
            slots: [
                Some(Ratio(1.0, 1.0)),
                None,
                Some(Ratio(9.0, 8.0)),
                Some(Ratio(7.0, 6.0)),
                Some(Ratio(5.0, 4.0)),
                None,
                None,
                Some(Ratio(3.0, 2.0)),
                None,
                None,
                Some(Ratio(7.0, 4.0)),
                Some(Ratio(15.0, 8.0)),
            ],
        }
    }

    /// A complete just table leaning on septimal minor intervals.
    pub fn minor() -> Self {
        let ratios = [
            (1.0, 1.0),
            (28.0, 27.0),
            (9.0, 8.0),
            (7.0, 6.0),
            (5.0, 4.0),
            (4.0, 3.0),
            (17.0, 12.0),
            (3.0, 2.0),
            (14.0, 9.0),
            (27.0, 16.0),
            (7.0, 4.0),
            (15.0, 8.0),
        ];
        RatioTable {
            slots: ratios.map(|(n, d)| Some(Ratio(n, d))),
        }
    }

    /// Pythagorean-style table: even semitones stack whole tones (9/8), odd
    /// semitones hang off the fifth (3/2) and the fourth below it.
    pub fn pentatonic() -> Self {
        let mut slots = [None; 12];
        for (i, slot) in slots.iter_mut().enumerate() {
            let ratio = if i % 2 == 0 {
                let k = (i / 2) as i32;
                Ratio(9.0_f64.powi(k), 8.0_f64.powi(k))
            } else if i < 7 {
                let k = ((i + 5) / 2) as i32;
                Ratio(3.0 * 9.0_f64.powi(k), 4.0 * 8.0_f64.powi(k))
            } else {
                let k = ((i - 7) / 2) as i32;
                Ratio(3.0 * 9.0_f64.powi(k), 2.0 * 8.0_f64.powi(k))
            };
            *slot = Some(ratio);
        }
        RatioTable { slots }
    }

    /// Look up a table by preset name.
    pub fn preset(name: &str) -> std::result::Result<Self, ConfigError> {
        Ok(match name {
            "equal" => Self::equal(),
            "harmonic" => Self::harmonic(),
            "minor" => Self::minor(),
            "pentatonic" => Self::pentatonic(),
            "symmetric_la" => Self::single(9, Ratio(27.0, 16.0)),
            "harmonic_la" => Self::single(9, Ratio(13.0, 8.0)),
            "subharmonic_ma" => Self::single(3, Ratio(7.0, 6.0)),
            "subharmonic_fa" => Self::single(4, Ratio(4.0, 3.0)),
            "harmonic_fi" => Self::single(6, Ratio(11.0, 8.0)),
            _ => return Err(ConfigError::UnknownRatioPreset(name.to_string())),
        })
    }
}

// ── Tonic & Tuning ──────────────────────────────────────────

/// The reference note a tuning is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tonic {
    pub name: String,
    /// Frequency in Hz, taken to lie in the reference octave.
    pub frequency: f64,
}

impl Tonic {
    pub fn new(name: &str, frequency: f64) -> Result<Self> {
        pitch_class(name)?;
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(ConfigError::InvalidTonic(frequency).into());
        }
        Ok(Tonic {
            name: name.to_string(),
            frequency,
        })
    }

    /// A tonic at its equal-tempered frequency.
    pub fn equal_tempered(name: &str) -> Result<Self> {
        Self::new(name, equal_tempered_frequency(name)?)
    }
}

/// Twelve absolute pitches indexed by pitch class (C = 0 … B = 11).
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    tonic: Tonic,
    pitches: [f64; 12],
}

impl Tuning {
    /// Derive a tuning from a tonic and a prioritized list of ratio tables.
    ///
    /// When `renormalize_to` names a note, every pitch is rescaled so that
    /// note sits exactly on its equal-tempered frequency.
    pub fn build(
        tonic: Tonic,
        preferences: &[RatioTable],
        renormalize_to: Option<&str>,
    ) -> Result<Self> {
        if preferences.is_empty() {
            return Err(ConfigError::EmptyTuningPreferences.into());
        }
        let (class, shift) = pitch_class(&tonic.name)?;
        let base = tonic.frequency / 2.0_f64.powi(shift);

        let mut by_offset = [0.0; 12];
        for (offset, pitch) in by_offset.iter_mut().enumerate() {
            let ratio = preferences
                .iter()
                .find_map(|table| table.get(offset))
                .ok_or(ConfigError::IncompleteTuning { semitone: offset })?;
            *pitch = base * ratio.validate()?;
        }

        // Offsets that run past B wrap into the next octave; drop them one
        // octave so every pitch stays inside the reference octave.
        let mut pitches = [0.0; 12];
        for (offset, &pitch) in by_offset.iter().enumerate() {
            let index = class + offset;
            if index >= 12 {
                pitches[index - 12] = pitch / 2.0;
            } else {
                pitches[index] = pitch;
            }
        }

        let mut tuning = Tuning { tonic, pitches };
        if let Some(reference) = renormalize_to {
            let adjustment = equal_tempered_frequency(reference)? / tuning.pitch(reference)?;
            for pitch in tuning.pitches.iter_mut() {
                *pitch *= adjustment;
            }
            log::debug!("renormalized tuning to {reference} (x{adjustment:.6})");
        }
        log::debug!(
            "built tuning on {} ({:.3} Hz) from {} table(s): {:?}",
            tuning.tonic.name,
            tuning.tonic.frequency,
            preferences.len(),
            tuning.pitches
        );
        Ok(tuning)
    }

    pub fn tonic(&self) -> &Tonic {
        &self.tonic
    }

    pub fn pitches(&self) -> &[f64; 12] {
        &self.pitches
    }

    /// Frequency of a note name in the reference octave.
    pub fn pitch(&self, name: &str) -> Result<f64> {
        let (class, shift) = pitch_class(name)?;
        Ok(self.pitches[class] * 2.0_f64.powi(shift))
    }

    /// Absolute frequency of a symbolic note.
    pub fn frequency(&self, note: &Note) -> Result<f64> {
        Ok(self.pitch(&note.name)? * 2.0_f64.powi(note.octave - REFERENCE_OCTAVE))
    }
}
