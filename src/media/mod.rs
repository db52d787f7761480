// Media processing over ffmpeg/ffprobe
//
// - Processor: export, mux, probing and voice-profile filtering
// - Commands: command builders and execution

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::compose::CompositeTrack;
use crate::config::MediaConfig;
use crate::error::Result;
use crate::voice::VoiceProfile;

/// Main trait for media processing operations
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Write a composite track to `target`; `.wav` is lossless, anything
    /// else is encoded with the configured codec and bitrate
    async fn export_track(&self, track: &CompositeTrack, target: &Path) -> Result<()>;

    /// Replace the audio stream of `video_path`, copying the video stream
    async fn replace_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<()>;

    /// Extract mono PCM audio from a video
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Container duration in milliseconds
    async fn probe_duration_ms(&self, media_path: &Path) -> Result<u64>;

    /// SHA-256 of the first video stream
    async fn video_stream_hash(&self, video_path: &Path) -> Result<String>;

    /// Apply speed and pitch of a voice profile to a WAV file
    async fn apply_voice_profile(
        &self,
        input_path: &Path,
        output_path: &Path,
        profile: &VoiceProfile,
        sample_rate: u32,
    ) -> Result<()>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
