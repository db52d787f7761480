use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ComposeConfig;
use super::{ms_to_samples, samples_to_ms_ceil, CompositeTrack, CompositionError, TimedClip};

/// Two clips whose slots share time on the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlap {
    pub first_speaker: String,
    pub second_speaker: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Overlap {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Clips ordered by start offset, ties broken by end offset
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    clips: Vec<TimedClip>,
}

impl Timeline {
    pub fn new(mut clips: Vec<TimedClip>) -> Self {
        clips.sort_by_key(|clip| (clip.start_offset_ms, clip.end_offset_ms));
        Self { clips }
    }

    pub fn clips(&self) -> &[TimedClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Latest slot end across all clips
    pub fn max_end_ms(&self) -> Option<i64> {
        self.clips.iter().map(|clip| clip.end_offset_ms).max()
    }

    /// Every pair of clips whose `[start, end)` slots intersect
    pub fn overlaps(&self) -> Vec<Overlap> {
        let mut overlaps = Vec::new();
        for (i, first) in self.clips.iter().enumerate() {
            for second in &self.clips[i + 1..] {
                // Sorted by start, nothing later can reach back into `first`
                if second.start_offset_ms >= first.end_offset_ms {
                    break;
                }
                let end_ms = first.end_offset_ms.min(second.end_offset_ms);
                if end_ms > second.start_offset_ms {
                    overlaps.push(Overlap {
                        first_speaker: first.speaker_id.clone(),
                        second_speaker: second.speaker_id.clone(),
                        start_ms: second.start_offset_ms,
                        end_ms,
                    });
                }
            }
        }
        overlaps
    }
}

impl From<Vec<TimedClip>> for Timeline {
    fn from(clips: Vec<TimedClip>) -> Self {
        Self::new(clips)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompositorOptions {
    pub sample_rate: u32,
    pub require_clips: bool,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            require_clips: false,
        }
    }
}

impl From<&ComposeConfig> for CompositorOptions {
    fn from(config: &ComposeConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            require_clips: config.require_clips,
        }
    }
}

/// A mixed track with the overlapping clip pairs found while mixing
#[derive(Debug, Clone)]
pub struct Composition {
    pub track: CompositeTrack,
    pub overlaps: Vec<Overlap>,
}

/// Overlays timed clips onto a silent base track
pub struct Compositor {
    options: CompositorOptions,
}

impl Compositor {
    pub fn new(options: CompositorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompositorOptions {
        &self.options
    }

    /// Compose clips given in any order
    pub fn compose(
        &self,
        base_duration_ms: u64,
        clips: Vec<TimedClip>,
    ) -> Result<CompositeTrack, CompositionError> {
        self.compose_timeline(base_duration_ms, Timeline::new(clips))
            .map(|composition| composition.track)
    }

    /// Mix every clip into a silent buffer at its start offset.
    ///
    /// All clips are validated and decoded before the buffer is allocated, so
    /// the call either returns a full track or fails without partial output.
    /// Samples are accumulated as `i32` and clipped to 16 bits once at the end,
    /// which keeps the result independent of mixing order.
    pub fn compose_timeline(
        &self,
        base_duration_ms: u64,
        timeline: Timeline,
    ) -> Result<Composition, CompositionError> {
        let sample_rate = self.options.sample_rate;

        if timeline.is_empty() {
            if self.options.require_clips {
                return Err(CompositionError::EmptyTimeline);
            }
            debug!("Empty timeline, returning {} ms of silence", base_duration_ms);
            return Ok(Composition {
                track: CompositeTrack::silent(base_duration_ms, sample_rate),
                overlaps: Vec::new(),
            });
        }

        let mut decoded = Vec::with_capacity(timeline.len());
        for clip in timeline.clips() {
            clip.validate_timing()?;
            let samples = clip.decode(sample_rate)?;
            let start = ms_to_samples(clip.start_offset_ms as u64, sample_rate);
            if samples_to_ms_ceil(samples.len(), sample_rate) > clip.slot_ms() as u64 {
                debug!(
                    "Clip for speaker {} at {} ms runs {} ms past its slot",
                    clip.speaker_id,
                    clip.start_offset_ms,
                    samples_to_ms_ceil(samples.len(), sample_rate) - clip.slot_ms() as u64
                );
            }
            decoded.push((start, samples));
        }

        let overlaps = timeline.overlaps();
        for overlap in &overlaps {
            warn!(
                "Overlapping speech {}..{} ms between speakers {} and {}; mixing both",
                overlap.start_ms, overlap.end_ms, overlap.first_speaker, overlap.second_speaker
            );
        }

        let audio_end = decoded
            .iter()
            .map(|(start, samples)| start + samples.len())
            .max()
            .unwrap_or(0);
        let duration_ms = base_duration_ms
            .max(timeline.max_end_ms().unwrap_or(0) as u64)
            .max(samples_to_ms_ceil(audio_end, sample_rate));

        let mut mix = vec![0i32; ms_to_samples(duration_ms, sample_rate)];
        for (start, samples) in &decoded {
            for (slot, sample) in mix[*start..*start + samples.len()].iter_mut().zip(samples) {
                *slot += *sample as i32;
            }
        }

        let mut clipped = 0usize;
        let samples: Vec<i16> = mix
            .into_iter()
            .map(|value| {
                if value > i16::MAX as i32 || value < i16::MIN as i32 {
                    clipped += 1;
                }
                value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect();
        if clipped > 0 {
            warn!("{} samples clipped while mixing", clipped);
        }

        info!(
            "Composed {} clips into {} ms track (base {} ms)",
            timeline.len(),
            duration_ms,
            base_duration_ms
        );

        Ok(Composition {
            track: CompositeTrack::from_samples(samples, sample_rate, duration_ms),
            overlaps,
        })
    }
}

/// Compose with default options
pub fn compose(base_duration_ms: u64, clips: Vec<TimedClip>) -> Result<CompositeTrack, CompositionError> {
    Compositor::new(CompositorOptions::default()).compose(base_duration_ms, clips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::test_audio::tone_wav;

    const RATE: u32 = 22050;

    fn tone_clip(start: i64, end: i64, freq: f32, speaker: &str) -> TimedClip {
        TimedClip::new(tone_wav(freq, (end - start) as u64, RATE, 1, 0.4), start, end, speaker)
    }

    #[test]
    fn test_empty_timeline_is_exact_silence() {
        let track = compose(7_345, vec![]).unwrap();
        assert_eq!(track.duration_ms(), 7_345);
        assert_eq!(track.samples().len(), ms_to_samples(7_345, RATE));
        assert!(track.is_silent(0, 7_345));
    }

    #[test]
    fn test_empty_timeline_rejected_when_required() {
        let compositor = Compositor::new(CompositorOptions { sample_rate: RATE, require_clips: true });
        assert!(matches!(compositor.compose(1_000, vec![]), Err(CompositionError::EmptyTimeline)));
    }

    #[test]
    fn test_single_tone_in_long_base() {
        let track = compose(10_000, vec![tone_clip(0, 2_000, 440.0, "A")]).unwrap();
        assert_eq!(track.duration_ms(), 10_000);
        assert!(track.peak(0, 2_000) > 10_000);
        assert!(track.is_silent(2_000, 10_000));
    }

    #[test]
    fn test_silence_outside_non_overlapping_clips() {
        let clips = vec![
            tone_clip(3_000, 3_500, 330.0, "B"),
            tone_clip(1_000, 2_000, 440.0, "A"),
        ];
        let track = compose(5_000, clips).unwrap();
        assert!(track.is_silent(0, 1_000));
        assert!(track.is_silent(2_000, 3_000));
        assert!(track.is_silent(3_500, 5_000));
        assert!(!track.is_silent(1_000, 2_000));
        assert!(!track.is_silent(3_000, 3_500));
    }

    #[test]
    fn test_order_independent() {
        let a = tone_clip(500, 1_500, 440.0, "A");
        let b = tone_clip(1_000, 2_000, 523.25, "B");
        let forward = compose(3_000, vec![a.clone(), b.clone()]).unwrap();
        let backward = compose(3_000, vec![b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_overlap_is_additive() {
        let clips = vec![tone_clip(500, 1_500, 440.0, "A"), tone_clip(1_000, 2_000, 440.0, "B")];
        let track = compose(2_000, clips).unwrap();

        assert!(track.is_silent(0, 500));
        let single = track.peak(500, 1_000);
        let overlapped = track.peak(1_000, 1_500);
        assert!(single > 0);
        assert!(!track.is_silent(1_500, 2_000));
        assert!(overlapped > single);
    }

    #[test]
    fn test_identical_overlap_clips_at_full_scale() {
        let loud = |speaker: &str| {
            TimedClip::new(tone_wav(440.0, 1_000, RATE, 1, 0.9), 0, 1_000, speaker)
        };
        let alone = compose(1_000, vec![loud("A")]).unwrap();
        let doubled = compose(1_000, vec![loud("A"), loud("B")]).unwrap();
        assert!(doubled.peak(0, 1_000) >= i16::MAX as u16);
        assert!(doubled.peak(0, 1_000) > alone.peak(0, 1_000));
    }

    #[test]
    fn test_clip_past_base_extends_track() {
        let track = compose(1_000, vec![tone_clip(500, 3_000, 440.0, "A")]).unwrap();
        assert_eq!(track.duration_ms(), 3_000);
        assert!(!track.is_silent(2_500, 3_000));
    }

    #[test]
    fn test_audio_longer_than_slot_is_not_truncated() {
        let long_audio = tone_wav(440.0, 1_500, RATE, 1, 0.4);
        let clip = TimedClip::new(long_audio, 1_000, 1_500, "A");
        let track = compose(2_000, vec![clip]).unwrap();
        assert_eq!(track.duration_ms(), 2_500);
        assert!(!track.is_silent(2_000, 2_500));
    }

    #[test]
    fn test_negative_start_is_invalid() {
        let clip = TimedClip::new(tone_wav(440.0, 100, RATE, 1, 0.4), -20, 80, "A");
        assert!(matches!(compose(1_000, vec![clip]), Err(CompositionError::InvalidClip { .. })));
    }

    #[test]
    fn test_undecodable_clip_fails_whole_call() {
        let clips = vec![
            tone_clip(0, 500, 440.0, "A"),
            TimedClip::new(vec![0u8; 16], 600, 900, "B"),
        ];
        match compose(1_000, clips) {
            Err(CompositionError::InvalidClip { speaker_id, .. }) => assert_eq!(speaker_id, "B"),
            other => panic!("expected InvalidClip, got {:?}", other),
        }
    }

    #[test]
    fn test_overlap_detection() {
        let timeline = Timeline::new(vec![
            TimedClip::new(vec![], 1_000, 2_000, "B"),
            TimedClip::new(vec![], 500, 1_500, "A"),
            TimedClip::new(vec![], 2_000, 2_500, "C"),
        ]);
        assert_eq!(timeline.clips()[0].speaker_id, "A");
        let overlaps = timeline.overlaps();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].first_speaker, "A");
        assert_eq!(overlaps[0].second_speaker, "B");
        assert_eq!(overlaps[0].duration_ms(), 500);
    }

    #[test]
    fn test_compose_timeline_returns_overlaps() {
        let compositor = Compositor::new(CompositorOptions::default());
        let timeline = Timeline::new(vec![
            TimedClip::new(tone_wav(440.0, 1_000, 22050, 1, 0.25), 0, 1_000, "A"),
            TimedClip::new(tone_wav(660.0, 1_000, 22050, 1, 0.25), 600, 1_600, "B"),
        ]);
        let composition = compositor.compose_timeline(2_000, timeline).unwrap();
        assert_eq!(composition.overlaps.len(), 1);
        assert_eq!((composition.overlaps[0].start_ms, composition.overlaps[0].end_ms), (600, 1_000));
        assert_eq!(composition.track.duration_ms(), 2_000);

        let empty = compositor.compose_timeline(500, Timeline::new(vec![])).unwrap();
        assert!(empty.overlaps.is_empty());
    }
}
