use std::path::Path;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::error::Result;
use super::ms_to_samples;

/// Mono 16-bit PCM track produced by the compositor
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeTrack {
    samples: Vec<i16>,
    sample_rate: u32,
    duration_ms: u64,
}

impl CompositeTrack {
    /// A silent track of exactly `duration_ms`
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        Self {
            samples: vec![0; ms_to_samples(duration_ms, sample_rate)],
            sample_rate,
            duration_ms,
        }
    }

    pub(crate) fn from_samples(samples: Vec<i16>, sample_rate: u32, duration_ms: u64) -> Self {
        Self {
            samples,
            sample_rate,
            duration_ms,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    fn range(&self, start_ms: u64, end_ms: u64) -> &[i16] {
        let start = ms_to_samples(start_ms, self.sample_rate).min(self.samples.len());
        let end = ms_to_samples(end_ms, self.sample_rate).clamp(start, self.samples.len());
        &self.samples[start..end]
    }

    /// Largest absolute amplitude within `[start_ms, end_ms)`
    pub fn peak(&self, start_ms: u64, end_ms: u64) -> u16 {
        self.range(start_ms, end_ms)
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    pub fn is_silent(&self, start_ms: u64, end_ms: u64) -> bool {
        self.range(start_ms, end_ms).iter().all(|s| *s == 0)
    }

    /// Write the track as lossless 16-bit PCM WAV
    pub fn export_wav<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Exporting composite track ({} ms) to {}", self.duration_ms, path.display());

        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_track_has_exact_length() {
        let track = CompositeTrack::silent(10_000, 22050);
        assert_eq!(track.duration_ms(), 10_000);
        assert_eq!(track.samples().len(), 220_500);
        assert!(track.is_silent(0, 10_000));
    }

    #[test]
    fn test_peak_and_ranges_clamp_to_track() {
        let mut samples = vec![0i16; 22050];
        samples[11025] = -1200;
        let track = CompositeTrack::from_samples(samples, 22050, 1000);
        assert_eq!(track.peak(0, 1000), 1200);
        assert_eq!(track.peak(0, 400), 0);
        assert_eq!(track.peak(900, 5000), 0);
        assert!(!track.is_silent(500, 501));
    }

    #[test]
    fn test_export_wav_round_trips_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        let track = CompositeTrack::from_samples(vec![0, 100, -100, i16::MAX], 22050, 1);
        track.export_wav(&path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, track.samples());
    }
}
