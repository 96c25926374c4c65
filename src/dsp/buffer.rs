//! Sample buffers — the unit passed between rendering stages and handed to
//! playback or export.
//!
//! Samples are stored as `f64` centred on zero and scaled to the buffer's
//! sample width, so summing and mixing stay linear. Conversion to packed
//! integers (including the offset for unsigned 8-bit) happens once, in
//! [`SampleBuffer::to_pcm`].

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Output sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleWidth {
    /// 1 byte, unsigned: centred on the full-scale value.
    U8,
    I16,
    I32,
    I64,
    /// Normalized floating point in [-1, 1].
    Float,
}

impl SampleWidth {
    /// Integer width from a byte count.
    pub fn from_bytes(bytes: u8) -> Result<Self, ConfigError> {
        match bytes {
            1 => Ok(SampleWidth::U8),
            2 => Ok(SampleWidth::I16),
            4 => Ok(SampleWidth::I32),
            8 => Ok(SampleWidth::I64),
            other => Err(ConfigError::UnsupportedWidth(other)),
        }
    }

    /// Largest positive amplitude: `2^(8 * bytes - 1) - 1`, or 1.0 for floats.
    pub fn full_scale(&self) -> f64 {
        match self {
            SampleWidth::U8 => i8::MAX as f64,
            SampleWidth::I16 => i16::MAX as f64,
            SampleWidth::I32 => i32::MAX as f64,
            SampleWidth::I64 => i64::MAX as f64,
            SampleWidth::Float => 1.0,
        }
    }
}

/// Packed samples ready for a playback device or file writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Pcm {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
}

impl Pcm {
    pub fn len(&self) -> usize {
        match self {
            Pcm::U8(v) => v.len(),
            Pcm::I16(v) => v.len(),
            Pcm::I32(v) => v.len(),
            Pcm::I64(v) => v.len(),
            Pcm::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A mono run of samples at a fixed frame rate and width.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f64>,
    frame_rate: u32,
    width: SampleWidth,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f64>, frame_rate: u32, width: SampleWidth) -> Self {
        SampleBuffer {
            samples,
            frame_rate,
            width,
        }
    }

    pub fn silence(len: usize, frame_rate: u32, width: SampleWidth) -> Self {
        Self::new(vec![0.0; len], frame_rate, width)
    }

    /// Build from normalized [-1, 1] values, scaling to `width`.
    pub fn from_normalized(values: Vec<f64>, frame_rate: u32, width: SampleWidth) -> Self {
        let scale = width.full_scale();
        let samples = values.into_iter().map(|v| v * scale).collect();
        Self::new(samples, frame_rate, width)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    pub fn full_scale(&self) -> f64 {
        self.width.full_scale()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.frame_rate as f64
    }

    /// Samples divided by the full-scale value.
    pub fn normalized(&self) -> Vec<f64> {
        let scale = self.full_scale();
        self.samples.iter().map(|s| s / scale).collect()
    }

    /// Append another buffer, rescaling it if its width differs and
    /// resampling if its frame rate differs.
    pub fn append(&mut self, other: &SampleBuffer) {
        let other = other.resampled(self.frame_rate);
        if other.width == self.width {
            self.samples.extend_from_slice(&other.samples);
        } else {
            let scale = self.full_scale() / other.full_scale();
            self.samples.extend(other.samples.iter().map(|s| s * scale));
        }
    }

    /// Concatenate buffers end to end in the first buffer's format.
    pub fn concat<'a, I>(buffers: I, frame_rate: u32, width: SampleWidth) -> Self
    where
        I: IntoIterator<Item = &'a SampleBuffer>,
    {
        let mut out = Self::silence(0, frame_rate, width);
        for buffer in buffers {
            out.append(buffer);
        }
        out
    }

    /// The same buffer preceded by `offset` samples of silence.
    pub fn delayed(&self, offset: usize) -> Self {
        let mut samples = vec![0.0; offset];
        samples.extend_from_slice(&self.samples);
        Self::new(samples, self.frame_rate, self.width)
    }

    /// Linear-interpolation resample to another frame rate.
    pub fn resampled(&self, frame_rate: u32) -> Self {
        if frame_rate == self.frame_rate || self.samples.is_empty() {
            return Self::new(self.samples.clone(), frame_rate, self.width);
        }
        let ratio = self.frame_rate as f64 / frame_rate as f64;
        let len = (self.samples.len() as f64 / ratio).round() as usize;
        let last = self.samples.len() - 1;
        let samples = (0..len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = pos.floor() as usize;
                if idx >= last {
                    return self.samples[last];
                }
                let frac = pos - idx as f64;
                self.samples[idx] * (1.0 - frac) + self.samples[idx + 1] * frac
            })
            .collect();
        Self::new(samples, frame_rate, self.width)
    }

    /// Normalized samples stretched or cut to `len`, zero-filled past the end.
    pub(crate) fn aligned_to(&self, frame_rate: u32, len: usize) -> Vec<f64> {
        let mut values = self.resampled(frame_rate).normalized();
        values.resize(len, 0.0);
        values
    }

    /// Pack into integers of the buffer's width, rounding and clamping.
    /// Unsigned 8-bit samples are offset by the full-scale value so silence
    /// sits at 127.
    pub fn to_pcm(&self) -> Pcm {
        let scale = self.full_scale();
        match self.width {
            SampleWidth::U8 => Pcm::U8(
                self.samples
                    .iter()
                    .map(|&s| (s + scale).round().clamp(0.0, u8::MAX as f64) as u8)
                    .collect(),
            ),
            SampleWidth::I16 => Pcm::I16(
                self.samples
                    .iter()
                    .map(|&s| s.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
                    .collect(),
            ),
            SampleWidth::I32 => Pcm::I32(
                self.samples
                    .iter()
                    .map(|&s| s.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
                    .collect(),
            ),
            // `as` saturates at the i64 bounds.
            SampleWidth::I64 => Pcm::I64(self.samples.iter().map(|&s| s.round() as i64).collect()),
            SampleWidth::Float => Pcm::F32(
                self.samples
                    .iter()
                    .map(|&s| s.clamp(-1.0, 1.0) as f32)
                    .collect(),
            ),
        }
    }

    /// Normalized `f32` samples for an audio worklet.
    pub fn to_f32(&self) -> Vec<f32> {
        let scale = self.full_scale();
        self.samples
            .iter()
            .map(|&s| (s / scale).clamp(-1.0, 1.0) as f32)
            .collect()
    }
}
