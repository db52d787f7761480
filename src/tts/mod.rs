// Speech synthesis
//
// - Model: lifecycle handle for the synthesis backend
// - Coqui: Coqui TTS server client

pub mod coqui;
pub mod model;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use model::SynthesisModel;
use crate::config::TtsConfig;
use crate::error::Result;
use crate::media::MediaProcessorTrait;
use crate::retry::RetryPolicy;
use crate::voice::VoiceProfile;

/// Main trait for speech synthesis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Make the backend ready; must precede any `synthesize` call
    async fn acquire(&mut self) -> Result<()>;

    /// Give the backend up; later `synthesize` calls fail
    fn release(&mut self);

    /// Speak `text` with `profile` and write a WAV file to `output_path`
    async fn synthesize(&self, text: &str, profile: &VoiceProfile, output_path: &Path) -> Result<()>;
}

/// Factory for creating synthesizer instances
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    pub fn create_synthesizer(
        config: TtsConfig,
        retry: RetryPolicy,
        media: Arc<dyn MediaProcessorTrait>,
    ) -> Result<Box<dyn SpeechSynthesizer>> {
        Ok(Box::new(coqui::CoquiSynthesizer::new(config, retry, media)?))
    }
}
