use std::collections::HashMap;
use std::time::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, DubError, is_transient_request, is_transient_status};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Ollama client shared by translator implementations
pub struct BaseTranslator {
    pub client: Client,
    pub config: TranslateConfig,
    pub cache: HashMap<String, String>,
}

impl BaseTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            config,
            cache: HashMap::new(),
        })
    }

    /// Translate one piece of text with Ollama in JSON mode
    pub async fn translate_text(&self, text: &str) -> Result<String> {
        let request = TranslationRequest {
            model: self.config.model.clone(),
            prompt: self.build_translation_prompt(text),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!("Sending translation request to: {}", url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                DubError::translation(format!("HTTP request failed: {}", e))
                    .retryable(is_transient_request(&e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DubError::translation(format!(
                "Ollama API error {}: {}", status, error_text
            ))
            .retryable(is_transient_status(status)));
        }

        let translation_response: TranslationResponse = response.json().await
            .map_err(|e| DubError::translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = translation_response.response.trim();
        debug!("Raw Ollama response: {}", raw_response);

        if raw_response.is_empty() {
            return Err(DubError::translation("Empty translation received"));
        }

        if let Ok(result) = serde_json::from_str::<TranslationResult>(raw_response) {
            return Ok(result.text.trim().to_string());
        }

        Ok(clean_translation_response(raw_response))
    }

    fn build_translation_prompt(&self, text: &str) -> String {
        let source_name = language_code_to_name(&self.config.source_language);
        let target_name = language_code_to_name(&self.config.target_language);

        format!(
            "You are a professional translator for video dubbing.\n\
             \n\
             Translate the text from {} to {} ONLY. The result will be spoken aloud,\n\
             so keep it natural and close to the original length.\n\
             \n\
             Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
             Do not include any explanations, alternatives, or text in other languages.\n\
             \n\
             [Text to translate]\n\
             {}\n",
            source_name, target_name, target_name, text
        )
    }
}

/// Check that Ollama answers and serves `model`
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct Tags {
        models: Vec<TagModel>,
    }
    #[derive(Deserialize)]
    struct TagModel {
        name: String,
    }

    let response = reqwest::get(format!("{}/api/tags", endpoint))
        .await
        .map_err(|e| {
            DubError::translation(format!("Ollama not reachable at {}: {}", endpoint, e))
                .retryable(is_transient_request(&e))
        })?;

    let tags: Tags = response.json().await
        .map_err(|e| DubError::translation(format!("Unexpected Ollama tags response: {}", e)))?;

    if tags.models.iter().any(|m| m.name == model || m.name.starts_with(&format!("{}:", model))) {
        Ok(())
    } else {
        Err(DubError::translation(format!("Model {} is not available in Ollama", model)))
    }
}

pub fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "de" => "German".to_string(),
        "en" => "English".to_string(),
        "fr" => "French".to_string(),
        "es" => "Spanish".to_string(),
        "it" => "Italian".to_string(),
        "nl" => "Dutch".to_string(),
        "pt" => "Portuguese".to_string(),
        "pl" => "Polish".to_string(),
        "ru" => "Russian".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" => "Chinese".to_string(),
        _ => code.to_string(),
    }
}

/// Take the first line that looks like an actual translation
fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    for &line in &lines {
        if line.starts_with("Here is")
            || line.starts_with("Here are")
            || line.starts_with("Translation:")
            || line.starts_with("- ")
            || line.starts_with("* ")
            || (line.starts_with("**") && line.ends_with("**"))
        {
            continue;
        }
        if line.len() > 3 {
            return line.trim_matches('"').to_string();
        }
    }

    lines.first().map(|l| l.to_string()).unwrap_or_else(|| response.to_string())
}

/// Split text into chunks of at most `max_len` bytes, preferring sentence
/// boundaries and falling back to word boundaries for long sentences
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') && text[idx + 1..].starts_with(' ') {
            sentences.push(text[start..=idx].trim());
            start = idx + 1;
        }
    }
    sentences.push(text[start..].trim());

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences.into_iter().filter(|s| !s.is_empty()) {
        if sentence.len() > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut piece = String::new();
            for word in sentence.split_whitespace() {
                if !piece.is_empty() && piece.len() + 1 + word.len() > max_len {
                    chunks.push(std::mem::take(&mut piece));
                }
                if !piece.is_empty() {
                    piece.push(' ');
                }
                piece.push_str(word);
            }
            if !piece.is_empty() {
                chunks.push(piece);
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(sentence);
        } else if current.len() + 1 + sentence.len() <= max_len {
            current.push(' ');
            current.push_str(sentence);
        } else {
            chunks.push(std::mem::replace(&mut current, sentence.to_string()));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("Hello world. How are you?", 4500), vec!["Hello world. How are you?"]);
    }

    #[test]
    fn test_chunks_break_at_sentences() {
        let chunks = chunk_text("One two. Three four! Five six?", 12);
        assert_eq!(chunks, vec!["One two.", "Three four!", "Five six?"]);
        assert!(chunks.iter().all(|c| c.len() <= 12));
    }

    #[test]
    fn test_long_sentence_breaks_at_words() {
        let chunks = chunk_text("alpha beta gamma delta epsilon", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
    }

    #[test]
    fn test_clean_translation_skips_preamble() {
        let response = "Here is the translation:\n\"Guten Morgen, alle zusammen.\"";
        assert_eq!(clean_translation_response(response), "Guten Morgen, alle zusammen.");
    }

    #[test]
    fn test_prompt_names_languages() {
        let translator = BaseTranslator::new(crate::config::Config::default().translate).unwrap();
        let prompt = translator.build_translation_prompt("Good morning");
        assert!(prompt.contains("from English to German"));
        assert!(prompt.contains("Good morning"));
    }
}
