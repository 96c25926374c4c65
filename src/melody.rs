//! Symbolic notes and melodies.
//!
//! A note is a pitch name, an octave and a length. Lengths are written as a
//! multiplier over a denominator so tuplets stay exact: three notes of
//! `note("A", 4).divided(3.0)` fill one unit.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ComputationError, LookupError, Result};
use crate::tuning::note_semitone;

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Pitch name, e.g. `"D"`, `"Fs"`, `"Bb"`.
    pub name: String,
    pub octave: i32,
    #[serde(default = "one")]
    pub duration: f64,
    #[serde(default = "one")]
    pub denominator: f64,
}

/// A note of unit length.
pub fn note(name: &str, octave: i32) -> Note {
    Note {
        name: name.to_string(),
        octave,
        duration: 1.0,
        denominator: 1.0,
    }
}

impl Note {
    /// Multiply the note's length.
    pub fn times(mut self, factor: f64) -> Self {
        self.duration *= factor;
        self
    }

    /// Divide the note's length.
    pub fn divided(mut self, factor: f64) -> Self {
        self.denominator *= factor;
        self
    }

    /// Length in beats when a unit-length note lasts `beat_unit` beats.
    pub fn beats(&self, beat_unit: f64) -> Result<f64> {
        if self.denominator == 0.0 {
            return Err(ComputationError::ZeroDenominator.into());
        }
        Ok(self.duration * beat_unit / self.denominator)
    }
}

/// Parses `"D5"`, `"Fs4"`, `"Bb3"`, `"C-1"`.
impl FromStr for Note {
    type Err = LookupError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| LookupError::UnknownNote(s.to_string()))?;
        let (name, octave) = s.split_at(split);
        if note_semitone(name).is_none() {
            return Err(LookupError::UnknownNote(s.to_string()));
        }
        let octave = octave
            .parse()
            .map_err(|_| LookupError::UnknownNote(s.to_string()))?;
        Ok(note(name, octave))
    }
}

/// An ordered sequence of notes played one after another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Melody {
    pub notes: Vec<Note>,
}

impl Melody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note, builder style.
    pub fn then(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Total length in beats.
    pub fn total_beats(&self, beat_unit: f64) -> Result<f64> {
        self.notes.iter().map(|n| n.beats(beat_unit)).sum()
    }

    /// Opening of the Minuet in G (BWV Anh. 114), ending on a long
    /// ten-subdivided B–A.
    pub fn minuet() -> Self {
        let phrase: [(&str, i32, f64); 32] = [
            ("D", 5, 2.0),
            ("G", 4, 1.0),
            ("A", 4, 1.0),
            ("B", 4, 1.0),
            ("C", 5, 1.0),
            ("D", 5, 2.0),
            ("G", 4, 2.0),
            ("G", 4, 2.0),
            ("E", 5, 2.0),
            ("C", 5, 1.0),
            ("D", 5, 1.0),
            ("E", 5, 1.0),
            ("Fs", 5, 1.0),
            ("G", 5, 2.0),
            ("G", 4, 2.0),
            ("G", 4, 2.0),
            ("C", 5, 2.0),
            ("D", 5, 1.0),
            ("C", 5, 1.0),
            ("B", 4, 1.0),
            ("A", 4, 1.0),
            ("B", 4, 2.0),
            ("C", 5, 1.0),
            ("B", 4, 1.0),
            ("A", 4, 1.0),
            ("G", 4, 1.0),
            ("Fs", 4, 2.0),
            ("G", 4, 1.0),
            ("A", 4, 1.0),
            ("B", 4, 1.0),
            ("G", 4, 1.0),
            ("B", 4, 6.0),
        ];
        let mut melody: Melody = phrase
            .iter()
            .map(|&(name, octave, length)| note(name, octave).times(length))
            .collect();
        if let Some(last) = melody.notes.last_mut() {
            last.denominator = 10.0;
        }
        melody.then(note("A", 4).times(54.0).divided(10.0))
    }
}

impl FromIterator<Note> for Melody {
    fn from_iter<I: IntoIterator<Item = Note>>(iter: I) -> Self {
        Melody {
            notes: iter.into_iter().collect(),
        }
    }
}

impl Extend<Note> for Melody {
    fn extend<I: IntoIterator<Item = Note>>(&mut self, iter: I) {
        self.notes.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthError;
    use approx::assert_relative_eq;

    #[test]
    fn length_combines_duration_and_denominator() {
        let n = note("A", 4).times(2.0).divided(3.0);
        assert_relative_eq!(n.beats(0.25).unwrap(), 2.0 * 0.25 / 3.0);
        assert_relative_eq!(note("A", 4).beats(1.0).unwrap(), 1.0);
    }

    #[test]
    fn zero_denominator_is_rejected() {
        let n = note("A", 4).divided(0.0);
        assert!(matches!(
            n.beats(1.0),
            Err(SynthError::Computation(ComputationError::ZeroDenominator))
        ));
    }

    #[test]
    fn parses_note_shorthand() {
        assert_eq!("D5".parse::<Note>().unwrap(), note("D", 5));
        assert_eq!("Fs4".parse::<Note>().unwrap(), note("Fs", 4));
        assert_eq!("Bb3".parse::<Note>().unwrap(), note("Bb", 3));
        assert_eq!("C-1".parse::<Note>().unwrap(), note("C", -1));
        assert!("H4".parse::<Note>().is_err());
        assert!("A".parse::<Note>().is_err());
        assert!("A4x".parse::<Note>().is_err());
    }

    #[test]
    fn minuet_shape() {
        let melody = Melody::minuet();
        assert_eq!(melody.len(), 33);
        assert_eq!(melody.notes[0], note("D", 5).times(2.0));
        let tail = &melody.notes[31..];
        assert_relative_eq!(tail[0].beats(1.0).unwrap(), 0.6);
        assert_relative_eq!(tail[1].beats(1.0).unwrap(), 5.4);
        // 42 whole units in the first 31 notes plus the 6-unit tail.
        assert_relative_eq!(melody.total_beats(1.0).unwrap(), 48.0, epsilon = 1e-9);
    }

    #[test]
    fn deserializes_with_default_lengths() {
        let json = r#"[{"name":"G","octave":4},{"name":"A","octave":4,"duration":2}]"#;
        let melody: Melody = serde_json::from_str(json).unwrap();
        assert_eq!(melody.notes[0], note("G", 4));
        assert_eq!(melody.notes[1], note("A", 4).times(2.0));
    }
}
