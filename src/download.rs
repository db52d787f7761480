use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{info, debug};

use crate::config::DownloadConfig;
use crate::error::{Result, DubError};
use crate::media::{MediaCommand, MediaProcessorTrait};

/// Subset of `yt-dlp -J` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub is_live: Option<bool>,
}

/// A downloaded video with its extracted audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSource {
    pub id: String,
    pub title: String,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub duration_ms: u64,
}

/// Extract the 11-character video id from the common YouTube URL shapes
pub fn video_id(url: &str) -> Result<String> {
    let url = url.trim();
    let candidate = if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest
    } else if let Some((_, rest)) = url.split_once("v=") {
        rest
    } else if let Some((_, rest)) = url.split_once("/embed/") {
        rest
    } else if let Some((_, rest)) = url.split_once("/shorts/") {
        rest
    } else {
        return Err(DubError::download(format!("Invalid YouTube URL: {}", url)));
    };

    let id: String = candidate
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if id.len() != 11 {
        return Err(DubError::download(format!("Invalid YouTube URL: {}", url)));
    }
    Ok(id)
}

/// yt-dlp messages for videos that will never download
const PERMANENT_FAILURES: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "Unsupported URL",
    "HTTP Error 404",
    "Sign in to confirm your age",
];

/// Turn a failed yt-dlp run into a download error. A missing binary and
/// the known unavailable-video messages are permanent; anything else is
/// assumed to be network trouble.
fn classify_failure(err: DubError) -> DubError {
    match err {
        DubError::Media(message) => {
            let permanent = PERMANENT_FAILURES.iter().any(|m| message.contains(m));
            DubError::download(message).retryable(!permanent)
        }
        other => DubError::download(other.to_string()),
    }
}

/// yt-dlp backed downloader
pub struct Downloader {
    config: DownloadConfig,
    input_dir: PathBuf,
}

impl Downloader {
    pub fn new(config: DownloadConfig, input_dir: PathBuf) -> Self {
        Self { config, input_dir }
    }

    fn command(&self, description: &str) -> MediaCommand {
        MediaCommand::new(&self.config.binary_path, description)
    }

    /// Fetch metadata without downloading
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        debug!("Fetching metadata for {}", url);

        let stdout = self.command("Metadata lookup")
            .arg("-J")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg(url)
            .execute()
            .await
            .map_err(classify_failure)?;

        serde_json::from_str(&stdout)
            .map_err(|e| DubError::download(format!("Unreadable metadata for {}: {}", url, e)))
    }

    /// Download the video and extract its audio track
    pub async fn download(&self, url: &str, media: &dyn MediaProcessorTrait) -> Result<VideoSource> {
        let expected_id = video_id(url)?;
        let metadata = self.fetch_metadata(url).await?;

        if metadata.is_live.unwrap_or(false) {
            return Err(DubError::download("Live streams are not supported"));
        }
        if metadata.id != expected_id {
            debug!("yt-dlp reported id {} for URL id {}", metadata.id, expected_id);
        }

        let title = metadata.title.clone().unwrap_or_else(|| metadata.id.clone());
        info!("Downloading video: {}", title);

        tokio::fs::create_dir_all(&self.input_dir).await?;
        let template = self.input_dir.join("%(id)s.%(ext)s");

        self.command("Video download")
            .arg("-f").arg(&self.config.video_format)
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("-o").arg(template.to_string_lossy().to_string())
            .arg(url)
            .execute()
            .await
            .map_err(classify_failure)?;

        let video_path = self.input_dir.join(format!("{}.mp4", metadata.id));
        if !video_path.exists() {
            return Err(DubError::download(format!(
                "Downloaded video not found at {}",
                video_path.display()
            )));
        }

        let audio_path = self.input_dir.join(format!("{}.wav", metadata.id));
        media.extract_audio(&video_path, &audio_path).await?;

        let duration_ms = self.resolve_duration(&metadata, &video_path, media).await?;
        info!("Downloaded {} ({} ms) to {}", metadata.id, duration_ms, video_path.display());

        Ok(VideoSource {
            id: metadata.id,
            title,
            video_path,
            audio_path,
            duration_ms,
        })
    }

    /// Prefer the probed container duration, fall back to metadata
    async fn resolve_duration(
        &self,
        metadata: &VideoMetadata,
        video_path: &Path,
        media: &dyn MediaProcessorTrait,
    ) -> Result<u64> {
        match media.probe_duration_ms(video_path).await {
            Ok(duration) => Ok(duration),
            Err(e) => {
                let seconds = metadata.duration.ok_or(e)?;
                Ok((seconds * 1000.0).round() as u64)
            }
        }
    }
}
