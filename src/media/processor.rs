use async_trait::async_trait;
use std::path::Path;
use tracing::{info, debug};

use crate::compose::CompositeTrack;
use crate::config::MediaConfig;
use crate::error::{Result, DubError};
use crate::voice::VoiceProfile;
use super::{MediaProcessorTrait, MediaCommandBuilder, probe_duration};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Pull the digest out of ffmpeg's `SHA256=<hex>` hash muxer output
fn parse_stream_hash(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("SHA256="))
        .map(|hash| hash.to_string())
}

fn parse_duration_ms(stdout: &str) -> Option<u64> {
    let seconds: f64 = stdout.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn export_track(&self, track: &CompositeTrack, target: &Path) -> Result<()> {
        if is_wav(target) {
            return track.export_wav(target);
        }

        let staging = tempfile::Builder::new()
            .prefix("composite-")
            .suffix(".wav")
            .tempfile()?;
        track.export_wav(staging.path())?;

        info!("Encoding composite track to {} ({} @ {})",
              target.display(), self.config.audio_codec, self.config.audio_bitrate);

        self.command_builder
            .encode_audio(staging.path(), target, &self.config.audio_codec, &self.config.audio_bitrate)
            .execute()
            .await?;

        Ok(())
    }

    async fn replace_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        info!("Muxing {} onto {} -> {}",
              audio_path.display(), video_path.display(), output_path.display());

        let command = self.command_builder.replace_audio(
            video_path,
            audio_path,
            output_path,
            &self.config.audio_codec,
            &self.config.audio_bitrate,
            &self.config.mux_options,
        );

        command.execute().await.map_err(|e| match e {
            DubError::Media(message) => DubError::Mux(message),
            DubError::FileNotFound(binary) => DubError::Mux(format!("Media processor not found: {}", binary)),
            other => other,
        })?;

        info!("Muxing completed successfully");
        Ok(())
    }

    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        let command = self.command_builder.extract_audio(video_path, audio_path);
        command.execute().await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn probe_duration_ms(&self, media_path: &Path) -> Result<u64> {
        let stdout = probe_duration(&self.config.probe_binary_path, media_path)
            .execute()
            .await?;

        let duration = parse_duration_ms(&stdout).ok_or_else(|| {
            DubError::Media(format!("Unexpected duration output for {}: {}", media_path.display(), stdout.trim()))
        })?;
        debug!("Probed duration of {}: {} ms", media_path.display(), duration);
        Ok(duration)
    }

    async fn video_stream_hash(&self, video_path: &Path) -> Result<String> {
        let stdout = self.command_builder.video_stream_hash(video_path).execute().await?;
        parse_stream_hash(&stdout).ok_or_else(|| {
            DubError::Media(format!("No stream hash reported for {}", video_path.display()))
        })
    }

    async fn apply_voice_profile(
        &self,
        input_path: &Path,
        output_path: &Path,
        profile: &VoiceProfile,
        sample_rate: u32,
    ) -> Result<()> {
        debug!("Applying voice profile {:?} to {}", profile, input_path.display());

        self.command_builder
            .apply_voice_profile(input_path, output_path, profile, sample_rate)
            .execute()
            .await
            .map_err(|e| DubError::tts(format!("Voice profile adjustment failed: {}", e)))?;

        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        let version = self.command_builder
            .version_check()
            .execute()
            .await
            .map_err(|e| DubError::Media(format!("Media processor not found: {}", e)))?;

        let first_line = version.lines().next().unwrap_or("Unknown version");
        info!("Media processor is available: {}", first_line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_hash() {
        let stdout = "SHA256=9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08\n";
        assert_eq!(
            parse_stream_hash(stdout).as_deref(),
            Some("9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")
        );
        assert_eq!(parse_stream_hash("nothing here"), None);
    }

    #[test]
    fn test_parse_duration_ms() {
        assert_eq!(parse_duration_ms("212.345000\n"), Some(212_345));
        assert_eq!(parse_duration_ms("N/A"), None);
        assert_eq!(parse_duration_ms("-1"), None);
    }

    #[test]
    fn test_wav_detection_ignores_case() {
        assert!(is_wav(Path::new("dub.WAV")));
        assert!(!is_wav(Path::new("dub.m4a")));
        assert!(!is_wav(Path::new("dub")));
    }

    #[tokio::test]
    async fn test_export_wav_needs_no_ffmpeg() {
        let mut config = crate::config::Config::default().media;
        config.binary_path = "/nonexistent/ffmpeg".to_string();
        let processor = MediaProcessorImpl::new(config);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dub.wav");
        let track = CompositeTrack::silent(250, 22050);
        processor.export_track(&track, &target).await.unwrap();
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_mux_failure_is_mux_error() {
        let mut config = crate::config::Config::default().media;
        config.binary_path = "false".to_string();
        let processor = MediaProcessorImpl::new(config);

        let err = processor
            .replace_audio(Path::new("in.mp4"), Path::new("dub.m4a"), Path::new("out.mp4"))
            .await
            .unwrap_err();
        match err {
            DubError::Mux(message) => assert!(message.starts_with("Audio replacement failed")),
            other => panic!("expected Mux error, got {:?}", other),
        }
    }
}
