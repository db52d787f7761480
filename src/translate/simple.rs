use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::TranslateConfig;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::transcribe::Segment;
use super::{Translator, common::{BaseTranslator, chunk_text}};

/// Translates each segment on its own; long segments are chunked first
pub struct SegmentTranslator {
    base: BaseTranslator,
    retry: RetryPolicy,
}

impl SegmentTranslator {
    pub fn new(config: TranslateConfig, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            base: BaseTranslator::new(config)?,
            retry,
        })
    }

    fn cache_key(&self, text: &str) -> String {
        format!(
            "{}|{}|{}|{}",
            self.base.config.model,
            self.base.config.source_language,
            self.base.config.target_language,
            text
        )
    }

    async fn translate_segment_text(&mut self, text: &str) -> Result<String> {
        let cache_key = self.cache_key(text);
        if let Some(cached) = self.base.cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let mut pieces = Vec::new();
        for chunk in chunk_text(text, self.base.config.max_chunk_chars) {
            let base = &self.base;
            let translated = self.retry
                .run("Translation", || base.translate_text(&chunk))
                .await?;
            pieces.push(translated);
        }

        let translation = pieces.join(" ");
        self.base.cache.insert(cache_key, translation.clone());
        Ok(translation)
    }
}

#[async_trait]
impl Translator for SegmentTranslator {
    async fn translate_segments(&mut self, segments: &mut [Segment]) -> Result<()> {
        info!(
            "Translating {} segments from {} to {}",
            segments.len(),
            self.base.config.source_language,
            self.base.config.target_language
        );

        let total_segments = segments.len();
        for (idx, segment) in segments.iter_mut().enumerate() {
            if segment.text.trim().is_empty() {
                continue;
            }

            info!("Translating segment {}/{} [{}]", idx + 1, total_segments, segment.speaker);
            info!("  Source: {}", segment.text);

            match self.translate_segment_text(&segment.text).await {
                Ok(translation) => {
                    info!("  Target: {}", translation);
                    segment.text = translation;
                }
                Err(e) => {
                    // Original text is kept so the segment still gets a voice
                    warn!("  Translation failed, keeping original text: {}", e);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_translation_keeps_original_text() {
        let mut config = crate::config::Config::default().translate;
        // Nothing listens on port 9 locally
        config.endpoint = "http://127.0.0.1:9".to_string();
        let mut translator = SegmentTranslator::new(config, RetryPolicy::none()).unwrap();

        let mut segments = vec![Segment {
            text: "Good morning".to_string(),
            start_ms: 0,
            end_ms: 900,
            speaker: "A".to_string(),
            confidence: None,
        }];

        translator.translate_segments(&mut segments).await.unwrap();
        assert_eq!(segments[0].text, "Good morning");
    }

    #[tokio::test]
    async fn test_cached_translation_is_reused() {
        let mut config = crate::config::Config::default().translate;
        config.endpoint = "http://127.0.0.1:9".to_string();
        let mut translator = SegmentTranslator::new(config, RetryPolicy::none()).unwrap();

        let key = translator.cache_key("Good morning");
        translator.base.cache.insert(key, "Guten Morgen".to_string());

        let translated = translator.translate_segment_text("Good morning").await.unwrap();
        assert_eq!(translated, "Guten Morgen");
    }
}
