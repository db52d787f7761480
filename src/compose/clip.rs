use std::io::Cursor;
use std::path::{Path, PathBuf};
use hound::{SampleFormat, WavReader};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use super::CompositionError;

/// Synthesized speech placed on the timeline.
///
/// `audio` holds a complete WAV file. Offsets are signed so that bad upstream
/// timing survives until validation instead of wrapping silently.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedClip {
    pub audio: Vec<u8>,
    pub start_offset_ms: i64,
    pub end_offset_ms: i64,
    pub speaker_id: String,
}

impl TimedClip {
    pub fn new<S: Into<String>>(audio: Vec<u8>, start_offset_ms: i64, end_offset_ms: i64, speaker_id: S) -> Self {
        Self {
            audio,
            start_offset_ms,
            end_offset_ms,
            speaker_id: speaker_id.into(),
        }
    }

    /// Load the clip audio from a WAV file on disk
    pub fn from_file<P: AsRef<Path>, S: Into<String>>(
        path: P,
        start_offset_ms: i64,
        end_offset_ms: i64,
        speaker_id: S,
    ) -> Result<Self> {
        let audio = std::fs::read(path)?;
        Ok(Self::new(audio, start_offset_ms, end_offset_ms, speaker_id))
    }

    /// Length of the slot reserved for this clip
    pub fn slot_ms(&self) -> i64 {
        self.end_offset_ms - self.start_offset_ms
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> CompositionError {
        CompositionError::InvalidClip {
            speaker_id: self.speaker_id.clone(),
            start_offset_ms: self.start_offset_ms,
            reason: reason.into(),
        }
    }

    /// Check offsets without touching the audio
    pub fn validate_timing(&self) -> std::result::Result<(), CompositionError> {
        if self.start_offset_ms < 0 {
            return Err(self.invalid("start offset is negative"));
        }
        if self.end_offset_ms < self.start_offset_ms {
            return Err(self.invalid(format!(
                "end offset {}ms precedes start offset",
                self.end_offset_ms
            )));
        }
        Ok(())
    }

    /// Decode the WAV payload into mono 16-bit samples at `sample_rate`.
    ///
    /// Integer formats are shifted to 16-bit full scale (up for 8 or 12 bits,
    /// down for 24 or 32), float samples are scaled, channels are averaged and
    /// a differing rate is linearly resampled.
    pub fn decode(&self, sample_rate: u32) -> std::result::Result<Vec<i16>, CompositionError> {
        let reader = WavReader::new(Cursor::new(self.audio.as_slice()))
            .map_err(|e| self.invalid(format!("cannot decode audio: {}", e)))?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(self.invalid("audio header declares no channels or zero sample rate"));
        }

        let interleaved: Vec<i32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits) if bits <= 16 => {
                let shift = 16 - bits;
                reader
                    .into_samples::<i16>()
                    .map(|s| s.map(|v| i32::from(v) << shift))
                    .collect::<std::result::Result<Vec<i32>, _>>()
            }
            (SampleFormat::Int, bits) if bits <= 32 => {
                let shift = bits - 16;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v >> shift))
                    .collect::<std::result::Result<Vec<i32>, _>>()
            }
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i32))
                .collect::<std::result::Result<Vec<i32>, _>>(),
            (format, bits) => {
                return Err(self.invalid(format!("unsupported sample format {:?}/{}bit", format, bits)));
            }
        }
        .map_err(|e| self.invalid(format!("cannot decode audio: {}", e)))?;

        let mono = downmix(&interleaved, spec.channels as usize);
        Ok(resample_linear(&mono, spec.sample_rate, sample_rate))
    }
}

fn downmix(interleaved: &[i32], channels: usize) -> Vec<i16> {
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().sum();
            (sum / channels as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16
        })
        .collect()
}

fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = pos - idx as f64;
            let value = samples[idx] as f64 * (1.0 - frac) + samples[next] as f64 * frac;
            value.round() as i16
        })
        .collect()
}

/// One entry of a clip list file, pointing at a WAV file on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipEntry {
    pub path: PathBuf,
    pub start_offset_ms: i64,
    pub end_offset_ms: i64,
    pub speaker_id: String,
}

impl ClipEntry {
    /// Read a JSON array of entries and load every referenced clip.
    ///
    /// Relative clip paths are resolved against the list's directory.
    pub fn load_all<P: AsRef<Path>>(list_path: P) -> Result<Vec<TimedClip>> {
        let list_path = list_path.as_ref();
        let entries: Vec<ClipEntry> = serde_json::from_str(&std::fs::read_to_string(list_path)?)?;
        let base_dir = list_path.parent().unwrap_or_else(|| Path::new("."));

        entries
            .into_iter()
            .map(|entry| {
                let path = if entry.path.is_absolute() {
                    entry.path
                } else {
                    base_dir.join(entry.path)
                };
                TimedClip::from_file(path, entry.start_offset_ms, entry.end_offset_ms, entry.speaker_id)
            })
            .collect()
    }
}
