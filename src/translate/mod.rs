// Segment translation through a local Ollama model
//
// Each segment is translated independently so that its timing stays
// attached to its own text.

pub mod common;
pub mod simple;

use async_trait::async_trait;

pub use common::*;
use crate::config::TranslateConfig;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::transcribe::Segment;

/// Main trait for translation operations
#[async_trait]
pub trait Translator: Send + Sync {
    /// Replace the text of each segment with its translation
    async fn translate_segments(&mut self, segments: &mut [Segment]) -> Result<()>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslateConfig, retry: RetryPolicy) -> Result<Box<dyn Translator>> {
        Ok(Box::new(simple::SegmentTranslator::new(config, retry)?))
    }
}
