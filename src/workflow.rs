use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::compose::{ClipEntry, CompositeTrack, Compositor, CompositorOptions, Overlap, TimedClip, Timeline};
use crate::config::Config;
use crate::download::{Downloader, VideoSource, video_id};
use crate::error::{Result, DubError};
use crate::media::{MediaProcessorTrait, MediaProcessorFactory};
use crate::retry::RetryPolicy;
use crate::subtitle::write_srt;
use crate::transcribe::{Segment, Transcript, TranscriberFactory};
use crate::translate::{TranslatorFactory, check_ollama_availability};
use crate::tts::{SpeechSynthesizer, SynthesizerFactory};
use crate::voice::{VoiceProfile, VoiceProfileRegistry};

/// Shared flag polled between stages and between TTS segments
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if cancellation was requested before `stage`
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(DubError::Cancelled(stage.to_string()));
        }
        Ok(())
    }
}

/// Summary of a finished dubbing run, written next to the output video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_url: String,
    pub video_id: String,
    pub title: String,
    pub source_language: String,
    pub target_language: String,
    pub base_duration_ms: u64,
    pub track_duration_ms: u64,
    pub segments: usize,
    pub voices: Vec<(String, VoiceProfile)>,
    pub overlaps: Vec<Overlap>,
    pub output_video: PathBuf,
    pub subtitles: PathBuf,
    pub video_stream_verified: bool,
}

pub struct Workflow {
    config: Config,
    retry: RetryPolicy,
    media: Arc<dyn MediaProcessorTrait>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    cancel: CancellationFlag,
}

impl Workflow {
    pub async fn new(config: Config) -> Result<Self> {
        let retry = RetryPolicy::from(&config.retry);
        let media: Arc<dyn MediaProcessorTrait> =
            Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));

        // Check dependencies
        media.check_availability().await?;

        let synthesizer = SynthesizerFactory::create_synthesizer(config.tts.clone(), retry, media.clone())?;
        Ok(Self::with_components(config, media, synthesizer))
    }

    pub fn with_components(
        config: Config,
        media: Arc<dyn MediaProcessorTrait>,
        synthesizer: Box<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            config,
            media,
            synthesizer,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline for one video URL
    pub async fn dub(&mut self, url: &str) -> Result<RunManifest> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting dubbing run {} for {}", run_id, url);

        self.config.ensure_directories()?;
        let run_temp_dir = self.config.paths.temp_dir.join(run_id.to_string());
        let clip_dir = self.config.paths.tts_dir.join(run_id.to_string());
        fs::create_dir_all(&run_temp_dir).await?;

        self.cancel.check("download")?;
        let source = self.download(url).await?;

        self.cancel.check("transcription")?;
        let mut transcript = self.transcribe(&source.audio_path).await?;
        transcript.save(run_temp_dir.join("transcript.json")).await?;

        self.cancel.check("translation")?;
        self.translate(&mut transcript.segments).await?;

        self.cancel.check("synthesis")?;
        let mut registry = VoiceProfileRegistry::new(self.config.tts.voice_seed);
        self.synthesizer.acquire().await?;
        let clips = self.synthesize(&transcript.segments, &mut registry, &clip_dir).await;
        self.synthesizer.release();
        let clips = clips?;

        self.cancel.check("composition")?;
        let (track, overlaps) = self.compose(source.duration_ms, clips)?;

        self.cancel.check("mux")?;
        let target = &self.config.translate.target_language;
        let output_dir = &self.config.paths.output_dir;
        let output_video = output_dir.join(format!("{}_{}.mp4", source.id, target));
        let video_stream_verified = self
            .mux(&source.video_path, &track, &output_video, &run_temp_dir)
            .await?;

        let subtitles = output_dir.join(format!("{}_{}.srt", source.id, target));
        write_srt(&transcript.segments, &subtitles).await?;

        let speakers = transcript.speakers();
        let manifest = RunManifest {
            run_id,
            started_at,
            finished_at: Utc::now(),
            source_url: url.to_string(),
            video_id: source.id.clone(),
            title: source.title.clone(),
            source_language: self.config.translate.source_language.clone(),
            target_language: target.clone(),
            base_duration_ms: source.duration_ms,
            track_duration_ms: track.duration_ms(),
            segments: transcript.segments.len(),
            voices: registry
                .iter()
                .filter(|(speaker, _)| speakers.contains(speaker))
                .map(|(speaker, profile)| (speaker.to_string(), *profile))
                .collect(),
            overlaps,
            output_video,
            subtitles,
            video_stream_verified,
        };

        let manifest_path = output_dir.join(format!("{}_{}.manifest.json", source.id, target));
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?).await?;

        if !self.config.paths.keep_intermediates {
            self.cleanup(&source, &[run_temp_dir, clip_dir]).await;
        }

        info!("Dubbed video written to {}", manifest.output_video.display());
        Ok(manifest)
    }

    /// Download the video and extract its audio
    pub async fn download(&self, url: &str) -> Result<VideoSource> {
        // Malformed URLs fail before the retried section
        video_id(url)?;
        let downloader = Downloader::new(self.config.download.clone(), self.config.paths.input_dir.clone());
        self.retry
            .run("Download", || downloader.download(url, self.media.as_ref()))
            .await
    }

    /// Speaker-labelled transcription of an audio file
    pub async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let transcriber = TranscriberFactory::create_default(self.config.transcriber.clone(), self.retry)?;
        transcriber.transcribe(audio_path).await
    }

    /// Translate segment texts in place
    pub async fn translate(&self, segments: &mut [Segment]) -> Result<()> {
        check_ollama_availability(&self.config.translate.endpoint, &self.config.translate.model).await?;

        let mut translator = TranslatorFactory::create_translator(self.config.translate.clone(), self.retry)?;
        translator.translate_segments(segments).await
    }

    /// One clip per non-empty segment, voiced with the speaker's profile.
    ///
    /// The synthesizer must have been acquired.
    pub async fn synthesize(
        &self,
        segments: &[Segment],
        registry: &mut VoiceProfileRegistry,
        clip_dir: &Path,
    ) -> Result<Vec<TimedClip>> {
        let entries = self.synthesize_entries(segments, registry, clip_dir).await?;
        entries
            .into_iter()
            .map(|entry| TimedClip::from_file(entry.path, entry.start_offset_ms, entry.end_offset_ms, entry.speaker_id))
            .collect()
    }

    /// Synthesize a transcript into `output_dir` and write `clips.json`
    /// listing the clips for the `compose` command
    pub async fn synthesize_clip_list(&mut self, segments: &[Segment], output_dir: &Path) -> Result<PathBuf> {
        let mut registry = VoiceProfileRegistry::new(self.config.tts.voice_seed);

        self.synthesizer.acquire().await?;
        let entries = self.synthesize_entries(segments, &mut registry, output_dir).await;
        self.synthesizer.release();

        let list_path = output_dir.join("clips.json");
        fs::write(&list_path, serde_json::to_string_pretty(&entries?)?).await?;
        Ok(list_path)
    }

    async fn synthesize_entries(
        &self,
        segments: &[Segment],
        registry: &mut VoiceProfileRegistry,
        clip_dir: &Path,
    ) -> Result<Vec<ClipEntry>> {
        fs::create_dir_all(clip_dir).await?;

        let pb = ProgressBar::new(segments.len() as u64);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"));

        let mut entries = Vec::with_capacity(segments.len());
        for (idx, segment) in segments.iter().enumerate() {
            if let Err(e) = self.cancel.check("synthesis") {
                pb.abandon();
                return Err(e);
            }
            pb.inc(1);

            if segment.text.trim().is_empty() {
                continue;
            }

            let profile = registry.profile_for(&segment.speaker);
            let clip_path = clip_dir.join(format!("{:04}_{}.wav", idx, segment.speaker));
            if let Err(e) = self.synthesizer.synthesize(&segment.text, &profile, &clip_path).await {
                pb.abandon();
                return Err(e);
            }

            entries.push(ClipEntry {
                path: clip_path,
                start_offset_ms: segment.start_ms,
                end_offset_ms: segment.end_ms,
                speaker_id: segment.speaker.clone(),
            });
        }

        pb.finish_and_clear();
        info!("Synthesized {} clips", entries.len());
        Ok(entries)
    }

    /// Overlay clips onto a silent track of the source duration
    pub fn compose(&self, base_duration_ms: u64, clips: Vec<TimedClip>) -> Result<(CompositeTrack, Vec<Overlap>)> {
        let compositor = Compositor::new(CompositorOptions::from(&self.config.compose));
        let composition = compositor.compose_timeline(base_duration_ms, Timeline::new(clips))?;
        Ok((composition.track, composition.overlaps))
    }

    /// Replace the video's audio with `track`; returns whether the video
    /// stream was verified unchanged
    pub async fn mux(
        &self,
        video_path: &Path,
        track: &CompositeTrack,
        output_path: &Path,
        scratch_dir: &Path,
    ) -> Result<bool> {
        fs::create_dir_all(scratch_dir).await?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let track_path = scratch_dir.join("dub_track.wav");
        self.media.export_track(track, &track_path).await?;
        self.media.replace_audio(video_path, &track_path, output_path).await?;

        if !self.config.media.verify_video_stream {
            return Ok(false);
        }

        let before = self.media.video_stream_hash(video_path).await?;
        let after = self.media.video_stream_hash(output_path).await?;
        if before != after {
            return Err(DubError::Mux(format!(
                "Video stream of {} differs from {}",
                output_path.display(),
                video_path.display()
            )));
        }
        info!("Video stream unchanged ({})", after);
        Ok(true)
    }

    async fn cleanup(&self, source: &VideoSource, dirs: &[PathBuf]) {
        for dir in dirs {
            if let Err(e) = fs::remove_dir_all(dir).await {
                warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }
        for file in [&source.video_path, &source.audio_path] {
            if let Err(e) = fs::remove_file(file).await {
                warn!("Failed to remove {}: {}", file.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::test_audio::tone_wav;
    use crate::tts::MockSpeechSynthesizer;

    fn segment(text: &str, start_ms: i64, end_ms: i64, speaker: &str) -> Segment {
        Segment {
            text: text.to_string(),
            start_ms,
            end_ms,
            speaker: speaker.to_string(),
            confidence: None,
        }
    }

    fn workflow(synthesizer: MockSpeechSynthesizer) -> Workflow {
        workflow_with(Config::default(), synthesizer)
    }

    fn workflow_with(config: Config, synthesizer: MockSpeechSynthesizer) -> Workflow {
        let media = Arc::from(MediaProcessorFactory::create_processor(config.media.clone()));
        Workflow::with_components(config, media, Box::new(synthesizer))
    }

    fn tone_synthesizer() -> MockSpeechSynthesizer {
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer
            .expect_synthesize()
            .returning(|_, _, output_path| {
                std::fs::write(output_path, tone_wav(440.0, 500, 22050, 1, 0.5))?;
                Ok(())
            });
        synthesizer
    }

    #[tokio::test]
    async fn test_synthesize_places_clips_at_segment_times() {
        let dir = tempfile::tempdir().unwrap();
        let flow = workflow(tone_synthesizer());
        let mut registry = VoiceProfileRegistry::new(7);

        let segments = vec![
            segment("Hallo", 1000, 1500, "A"),
            segment("", 1500, 2000, "A"),
            segment("Guten Tag", 3000, 3500, "B"),
        ];
        let clips = flow.synthesize(&segments, &mut registry, dir.path()).await.unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!((clips[0].start_offset_ms, clips[0].speaker_id.as_str()), (1000, "A"));
        assert_eq!((clips[1].start_offset_ms, clips[1].speaker_id.as_str()), (3000, "B"));

        let (track, overlaps) = flow.compose(5000, clips).unwrap();
        assert!(overlaps.is_empty());
        assert_eq!(track.duration_ms(), 5000);
        assert!(track.is_silent(0, 1000));
        assert!(!track.is_silent(1000, 1500));
        assert!(track.is_silent(1500, 3000));
        assert!(!track.is_silent(3000, 3500));
    }

    #[tokio::test]
    async fn test_speakers_get_their_registry_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer
            .expect_synthesize()
            .withf(|text, profile, _| text == "Hallo" && profile.speed == 0.95 && profile.pitch_semitones == 2.0)
            .times(1)
            .returning(|_, _, output_path| {
                std::fs::write(output_path, tone_wav(220.0, 200, 22050, 1, 0.5))?;
                Ok(())
            });
        let flow = workflow(synthesizer);
        let mut registry = VoiceProfileRegistry::new(0);

        let clips = flow
            .synthesize(&[segment("Hallo", 0, 200, "B")], &mut registry, dir.path())
            .await
            .unwrap();
        assert_eq!(clips.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer.expect_synthesize().never();
        let flow = workflow(synthesizer);
        flow.cancellation_flag().cancel();

        let mut registry = VoiceProfileRegistry::default();
        let err = flow
            .synthesize(&[segment("Hallo", 0, 500, "A")], &mut registry, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Cancelled(stage) if stage == "synthesis"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer
            .expect_synthesize()
            .returning(|_, _, _| Err(DubError::tts("server down")));
        let flow = workflow(synthesizer);

        let mut registry = VoiceProfileRegistry::default();
        let err = flow
            .synthesize(&[segment("Hallo", 0, 500, "A")], &mut registry, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Tts { .. }));
    }

    #[test]
    fn test_compose_reports_overlaps() {
        let flow = workflow(MockSpeechSynthesizer::new());
        let clips = vec![
            TimedClip::new(tone_wav(440.0, 1000, 22050, 1, 0.3), 500, 1500, "A"),
            TimedClip::new(tone_wav(660.0, 1000, 22050, 1, 0.3), 1000, 2000, "B"),
        ];
        let (track, overlaps) = flow.compose(0, clips).unwrap();

        assert_eq!(track.duration_ms(), 2000);
        assert_eq!(overlaps.len(), 1);
        assert_eq!((overlaps[0].start_ms, overlaps[0].end_ms), (1000, 1500));
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(flag.check("download").is_ok());
        clone.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check("download"), Err(DubError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_clip_list_round_trips_through_compose() {
        let dir = tempfile::tempdir().unwrap();
        let mut synthesizer = tone_synthesizer();
        synthesizer.expect_acquire().times(1).returning(|| Ok(()));
        synthesizer.expect_release().times(1).return_const(());
        let mut flow = workflow(synthesizer);

        let segments = vec![segment("Hallo", 0, 500, "A"), segment("Servus", 600, 1100, "C")];
        let list_path = flow.synthesize_clip_list(&segments, dir.path()).await.unwrap();

        let clips = ClipEntry::load_all(&list_path).unwrap();
        assert_eq!(clips.len(), 2);
        let (track, _) = flow.compose(2000, clips).unwrap();
        assert!(!track.is_silent(600, 1100));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_live_stream_download_is_attempted_once() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let calls = dir.path().join("calls.log");
        let script = dir.path().join("yt-dlp");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho run >> '{}'\necho '{{\"id\":\"dQw4w9WgXcQ\",\"is_live\":true}}'\n",
                calls.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = Config::default();
        config.download.binary_path = script.display().to_string();
        config.paths.input_dir = dir.path().join("input");
        config.retry.max_retries = 3;
        config.retry.delay_secs = 0;
        let flow = workflow_with(config, MockSpeechSynthesizer::new());

        let err = flow.download("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, DubError::Download { transient: false, .. }));
        assert_eq!(std::fs::read_to_string(&calls).unwrap().lines().count(), 1);
    }
}
