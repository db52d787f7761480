// Timeline compositing
//
// Synthesized speech clips are placed onto a silent base track at the offsets
// recorded during transcription:
// - Clip: a timed, speaker-tagged WAV buffer and its decoding
// - Track: the composite PCM buffer and its export
// - Compositor: timeline ordering, overlap detection and additive mixing

pub mod clip;
pub mod compositor;
pub mod track;

use thiserror::Error;

pub use clip::*;
pub use compositor::*;
pub use track::*;

#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Invalid clip for speaker '{speaker_id}' at {start_offset_ms}ms: {reason}")]
    InvalidClip {
        speaker_id: String,
        start_offset_ms: i64,
        reason: String,
    },

    #[error("Timeline contains no clips")]
    EmptyTimeline,
}

/// Number of whole samples covering `ms` milliseconds at `sample_rate`
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Milliseconds needed to hold `samples` samples, rounded up
pub fn samples_to_ms_ceil(samples: usize, sample_rate: u32) -> u64 {
    (samples as u64 * 1000).div_ceil(sample_rate as u64)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_sample_conversions() {
        assert_eq!(ms_to_samples(1000, 22050), 22050);
        assert_eq!(ms_to_samples(10, 22050), 220);
        assert_eq!(samples_to_ms_ceil(22050, 22050), 1000);
        assert_eq!(samples_to_ms_ceil(221, 22050), 11);
        assert_eq!(samples_to_ms_ceil(0, 22050), 0);
    }
}
