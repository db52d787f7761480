use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, DubError};

fn default_keep_intermediates() -> bool {
    false
}

fn default_verify_video_stream() -> bool {
    false
}

fn default_max_chunk_chars() -> usize {
    4500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub download: DownloadConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub tts: TtsConfig,
    pub compose: ComposeConfig,
    pub media: MediaConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Downloaded source video and audio
    pub input_dir: PathBuf,
    /// Final muxed videos, subtitles and run manifests
    pub output_dir: PathBuf,
    /// Per-segment synthesized clips
    pub tts_dir: PathBuf,
    /// Scratch files such as the exported composite track
    pub temp_dir: PathBuf,
    /// Rolling log files
    pub log_dir: PathBuf,
    /// Keep downloaded and intermediate files after a successful run
    #[serde(default = "default_keep_intermediates")]
    pub keep_intermediates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Path to yt-dlp binary
    pub binary_path: String,
    /// yt-dlp format selector for the video download
    pub video_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// AssemblyAI API base URL
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Source language code
    pub language_code: String,
    /// Request speaker diarization
    pub speaker_labels: bool,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Give up after this many polls
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Segments longer than this are split at sentence boundaries first
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Coqui TTS server URL
    pub endpoint: String,
    /// Model served by the TTS server (informational, logged on acquire)
    pub model_name: String,
    /// Optional speaker id for multi-speaker models
    pub speaker_id: Option<String>,
    /// Seed for voice profiles of speakers outside the built-in set
    pub voice_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Sample rate of the composite track
    pub sample_rate: u32,
    /// Fail when there is nothing to place on the timeline
    pub require_clips: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_binary_path: String,
    /// Audio codec for the dubbed stream
    pub audio_codec: String,
    /// Audio bitrate for the dubbed stream
    pub audio_bitrate: String,
    /// Compare video stream hashes before and after muxing
    #[serde(default = "default_verify_video_stream")]
    pub verify_video_stream: bool,
    /// Extra arguments appended before the output path when muxing
    pub mux_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts after the first failure for network stages
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            paths: PathsConfig {
                input_dir: data_dir.join("input"),
                output_dir: data_dir.join("output"),
                tts_dir: data_dir.join("tts"),
                temp_dir: data_dir.join("temp"),
                log_dir: data_dir.join("logs"),
                keep_intermediates: false,
            },
            download: DownloadConfig {
                binary_path: "yt-dlp".to_string(),
                video_format: "best[ext=mp4]".to_string(),
            },
            transcriber: TranscriberConfig {
                endpoint: "https://api.assemblyai.com".to_string(),
                api_key_env: "ASSEMBLYAI_API_KEY".to_string(),
                language_code: "en".to_string(),
                speaker_labels: true,
                poll_interval_secs: 3,
                max_poll_attempts: 1200,
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                source_language: "en".to_string(),
                target_language: "de".to_string(),
                max_chunk_chars: 4500,
            },
            tts: TtsConfig {
                endpoint: "http://localhost:5002".to_string(),
                model_name: "tts_models/de/thorsten/tacotron2-DDC".to_string(),
                speaker_id: None,
                voice_seed: 0,
            },
            compose: ComposeConfig {
                sample_rate: 22050,
                require_clips: false,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_binary_path: "ffprobe".to_string(),
                audio_codec: "aac".to_string(),
                audio_bitrate: "192k".to_string(),
                verify_video_stream: false,
                mux_options: vec![],
            },
            retry: RetryConfig {
                max_retries: 3,
                delay_secs: 5,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| DubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Create every working directory
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.paths.input_dir,
            &self.paths.output_dir,
            &self.paths.tts_dir,
            &self.paths.temp_dir,
            &self.paths.log_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
