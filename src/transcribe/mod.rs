// Transcription with speaker labels
//
// Service responses are mapped into the crate's `Transcript` through the
// `TranscriptionMapper` trait so that the rest of the pipeline never sees a
// vendor format.

pub mod common;
pub mod assemblyai;

use async_trait::async_trait;
use std::path::Path;

pub use common::*;
use crate::config::TranscriberConfig;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// Main trait for transcription operations
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into speaker-labelled segments
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_default(config: TranscriberConfig, retry: RetryPolicy) -> Result<Box<dyn Transcriber>> {
        Ok(Box::new(assemblyai::AssemblyAiTranscriber::new(config, retry)?))
    }
}
