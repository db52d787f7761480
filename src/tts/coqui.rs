// Coqui TTS server client

use async_trait::async_trait;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use tracing::{info, debug};

use crate::config::TtsConfig;
use crate::error::{Result, DubError, is_transient_request, is_transient_status};
use crate::media::MediaProcessorTrait;
use crate::retry::RetryPolicy;
use crate::voice::VoiceProfile;
use super::{SpeechSynthesizer, SynthesisModel};

pub struct CoquiSynthesizer {
    client: Client,
    config: TtsConfig,
    retry: RetryPolicy,
    media: Arc<dyn MediaProcessorTrait>,
    model: SynthesisModel,
}

impl CoquiSynthesizer {
    pub fn new(config: TtsConfig, retry: RetryPolicy, media: Arc<dyn MediaProcessorTrait>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let model = SynthesisModel::new(config.model_name.clone());

        Ok(Self { client, config, retry, media, model })
    }

    fn query(&self, text: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![("text", text.to_string())];
        if let Some(speaker_id) = &self.config.speaker_id {
            query.push(("speaker_id", speaker_id.clone()));
        }
        query
    }

    async fn fetch_speech(&self, text: &str) -> Result<Vec<u8>> {
        let response = self.client
            .get(format!("{}/api/tts", self.config.endpoint))
            .query(&self.query(text))
            .send()
            .await
            .map_err(|e| {
                DubError::tts(format!("HTTP request failed: {}", e))
                    .retryable(is_transient_request(&e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DubError::tts(format!("TTS server error {}: {}", status, error_text))
                .retryable(is_transient_status(status)));
        }

        let bytes = response.bytes().await
            .map_err(|e| {
                DubError::tts(format!("Failed to read TTS response: {}", e))
                    .retryable(is_transient_request(&e))
            })?;
        Ok(bytes.to_vec())
    }
}

/// Sample rate of the WAV returned by the server
fn wav_sample_rate(audio: &[u8]) -> Result<u32> {
    let reader = hound::WavReader::new(Cursor::new(audio))
        .map_err(|e| DubError::tts(format!("TTS server returned invalid WAV: {}", e)))?;
    Ok(reader.spec().sample_rate)
}

#[async_trait]
impl SpeechSynthesizer for CoquiSynthesizer {
    async fn acquire(&mut self) -> Result<()> {
        if self.model.is_ready() {
            return Ok(());
        }

        let response = self.client
            .get(&self.config.endpoint)
            .send()
            .await
            .map_err(|e| {
                DubError::tts(format!("TTS server not reachable at {}: {}", self.config.endpoint, e))
                    .retryable(is_transient_request(&e))
            })?;

        if !response.status().is_success() {
            return Err(DubError::tts(format!(
                "TTS server at {} answered {}", self.config.endpoint, response.status()
            )));
        }

        self.model.mark_ready();
        Ok(())
    }

    fn release(&mut self) {
        self.model.release();
    }

    async fn synthesize(&self, text: &str, profile: &VoiceProfile, output_path: &Path) -> Result<()> {
        self.model.ensure_ready()?;
        if text.trim().is_empty() {
            return Err(DubError::tts("Nothing to synthesize"));
        }

        debug!("Synthesizing {} chars with {}", text.len(), self.model.name());
        let audio = self.retry
            .run("Speech synthesis", || self.fetch_speech(text))
            .await?;
        let sample_rate = wav_sample_rate(&audio)?;

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if profile.is_neutral() {
            tokio::fs::write(output_path, &audio).await?;
        } else {
            let raw = tempfile::Builder::new().suffix(".wav").tempfile()?;
            tokio::fs::write(raw.path(), &audio).await?;
            self.media
                .apply_voice_profile(raw.path(), output_path, profile, sample_rate)
                .await?;
        }

        info!("Synthesized clip {}", output_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::test_audio::tone_wav;
    use crate::media::MediaProcessorFactory;

    fn synthesizer() -> CoquiSynthesizer {
        let config = crate::config::Config::default();
        let media = Arc::from(MediaProcessorFactory::create_processor(config.media));
        CoquiSynthesizer::new(config.tts, RetryPolicy::none(), media).unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_before_acquire_fails() {
        let dir = tempfile::tempdir().unwrap();
        let synth = synthesizer();
        let err = synth
            .synthesize("Hallo", &VoiceProfile::NEUTRAL, &dir.path().join("clip.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::ModelNotInitialized));
    }

    #[tokio::test]
    async fn test_synthesize_after_release_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = synthesizer();
        synth.model.mark_ready();
        synth.release();
        let err = synth
            .synthesize("Hallo", &VoiceProfile::NEUTRAL, &dir.path().join("clip.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::ModelNotInitialized));
    }

    #[test]
    fn test_query_includes_speaker_when_configured() {
        let mut synth = synthesizer();
        assert_eq!(synth.query("Hallo"), vec![("text", "Hallo".to_string())]);

        synth.config.speaker_id = Some("p225".to_string());
        assert_eq!(synth.query("Hallo")[1], ("speaker_id", "p225".to_string()));
    }

    #[test]
    fn test_wav_sample_rate() {
        let wav = tone_wav(440.0, 100, 22050, 1, 0.5);
        assert_eq!(wav_sample_rate(&wav).unwrap(), 22050);
        assert!(matches!(wav_sample_rate(b"<html>"), Err(DubError::Tts { transient: false, .. })));
    }
}
