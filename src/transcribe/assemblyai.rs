// AssemblyAI speech-to-text with speaker diarization

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, debug};

use crate::config::TranscriberConfig;
use crate::error::{Result, DubError, is_transient_request, is_transient_status};
use crate::retry::RetryPolicy;
use super::{Transcriber, common::{Segment, Transcript, TranscriptionMapper}};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyAiUtterance {
    pub text: String,
    pub start: i64,
    pub end: i64,
    pub speaker: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// `GET /v2/transcript/{id}` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyAiTranscript {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<AssemblyAiUtterance>>,
}

pub struct AssemblyAiMapper;

impl TranscriptionMapper<AssemblyAiTranscript> for AssemblyAiMapper {
    fn to_transcript(response: AssemblyAiTranscript) -> Result<Transcript> {
        let utterances = response.utterances.unwrap_or_default();
        if utterances.is_empty() {
            return Err(DubError::transcription("No speech detected"));
        }

        let segments = utterances
            .into_iter()
            .map(|u| Segment {
                text: u.text.trim().to_string(),
                start_ms: u.start,
                end_ms: u.end,
                speaker: u.speaker,
                confidence: u.confidence,
            })
            .collect();

        Ok(Transcript {
            id: response.id,
            language: response.language_code.unwrap_or_else(|| "unknown".to_string()),
            segments,
        })
    }
}

pub struct AssemblyAiTranscriber {
    client: Client,
    config: TranscriberConfig,
    retry: RetryPolicy,
}

impl AssemblyAiTranscriber {
    pub fn new(config: TranscriberConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self { client, config, retry })
    }

    fn api_key(&self) -> Result<String> {
        std::env::var(&self.config.api_key_env).map_err(|_| {
            DubError::Config(format!("Environment variable {} is not set", self.config.api_key_env))
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        Err(DubError::transcription(format!("AssemblyAI API error {}: {}", status, error_text))
            .retryable(is_transient_status(status)))
    }

    async fn upload(&self, api_key: &str, audio: Vec<u8>) -> Result<String> {
        let response = self.client
            .post(format!("{}/v2/upload", self.config.endpoint))
            .header("authorization", api_key)
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                DubError::transcription(format!("HTTP request failed: {}", e))
                    .retryable(is_transient_request(&e))
            })?;

        let upload: UploadResponse = Self::check_status(response).await?.json().await?;
        Ok(upload.upload_url)
    }

    async fn submit(&self, api_key: &str, audio_url: &str) -> Result<AssemblyAiTranscript> {
        let response = self.client
            .post(format!("{}/v2/transcript", self.config.endpoint))
            .header("authorization", api_key)
            .json(&json!({
                "audio_url": audio_url,
                "speaker_labels": self.config.speaker_labels,
                "language_code": self.config.language_code,
            }))
            .send()
            .await
            .map_err(|e| {
                DubError::transcription(format!("HTTP request failed: {}", e))
                    .retryable(is_transient_request(&e))
            })?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    async fn fetch(&self, api_key: &str, transcript_id: &str) -> Result<AssemblyAiTranscript> {
        let response = self.client
            .get(format!("{}/v2/transcript/{}", self.config.endpoint, transcript_id))
            .header("authorization", api_key)
            .send()
            .await
            .map_err(|e| {
                DubError::transcription(format!("HTTP request failed: {}", e))
                    .retryable(is_transient_request(&e))
            })?;

        Ok(Self::check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        if !audio_path.exists() {
            return Err(DubError::FileNotFound(audio_path.display().to_string()));
        }
        let api_key = self.api_key()?;
        let audio = tokio::fs::read(audio_path).await?;

        info!("Uploading audio file {} ({} bytes)", audio_path.display(), audio.len());
        let audio_url = self.retry
            .run("Audio upload", || self.upload(&api_key, audio.clone()))
            .await?;

        let submitted = self.retry
            .run("Transcript submission", || self.submit(&api_key, &audio_url))
            .await?;
        info!("Transcription job {} submitted", submitted.id);

        let interval = Duration::from_secs(self.config.poll_interval_secs);
        for attempt in 1..=self.config.max_poll_attempts {
            let current = self.retry
                .run("Transcript status", || self.fetch(&api_key, &submitted.id))
                .await?;
            debug!("Transcript {} status {} (poll {})", current.id, current.status, attempt);

            match current.status.as_str() {
                "completed" => {
                    let transcript = AssemblyAiMapper::to_transcript(current)?;
                    info!("Transcription completed: {} segments", transcript.segments.len());
                    return Ok(transcript);
                }
                "error" => {
                    return Err(DubError::transcription(
                        current.error.unwrap_or_else(|| "Transcription failed".to_string()),
                    ));
                }
                _ => tokio::time::sleep(interval).await,
            }
        }

        Err(DubError::transcription(format!(
            "Transcript {} not ready after {} polls",
            submitted.id, self.config.max_poll_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_transcript_maps_utterances() {
        let json = r#"{
            "id": "abc123",
            "status": "completed",
            "language_code": "en_us",
            "utterances": [
                {"text": " Hello there. ", "start": 250, "end": 1200, "speaker": "A", "confidence": 0.93},
                {"text": "General Kenobi.", "start": 1300, "end": 2400, "speaker": "B", "confidence": 0.88}
            ]
        }"#;
        let response: AssemblyAiTranscript = serde_json::from_str(json).unwrap();
        let transcript = AssemblyAiMapper::to_transcript(response).unwrap();

        assert_eq!(transcript.id, "abc123");
        assert_eq!(transcript.language, "en_us");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "Hello there.");
        assert_eq!(transcript.segments[1].speaker, "B");
        assert_eq!(transcript.segments[1].start_ms, 1300);
    }

    #[test]
    fn test_no_utterances_means_no_speech() {
        let json = r#"{"id": "abc123", "status": "completed", "utterances": null}"#;
        let response: AssemblyAiTranscript = serde_json::from_str(json).unwrap();
        let err = AssemblyAiMapper::to_transcript(response).unwrap_err();
        assert!(matches!(err, DubError::Transcription { message, transient: false } if message == "No speech detected"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let mut config = crate::config::Config::default().transcriber;
        config.api_key_env = "GERMANIZER_TEST_UNSET_KEY".to_string();
        let transcriber = AssemblyAiTranscriber::new(config, RetryPolicy::none()).unwrap();

        let err = transcriber.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, DubError::Config(_)));
    }
}
