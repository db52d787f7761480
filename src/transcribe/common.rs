use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One utterance, carried from transcription through translation to TTS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub speaker: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl Segment {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Service-agnostic transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub language: String,
    pub segments: Vec<Segment>,
}

impl Transcript {
    /// Distinct speaker labels in order of first appearance
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if !speakers.contains(&segment.speaker.as_str()) {
                speakers.push(&segment.speaker);
            }
        }
        speakers
    }

    pub async fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Trait for converting service-specific transcription formats to `Transcript`
pub trait TranscriptionMapper<T> {
    fn to_transcript(service_result: T) -> Result<Transcript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(speaker: &str, start_ms: i64) -> Segment {
        Segment {
            text: "hello".to_string(),
            start_ms,
            end_ms: start_ms + 500,
            speaker: speaker.to_string(),
            confidence: None,
        }
    }

    #[test]
    fn test_speakers_in_first_appearance_order() {
        let transcript = Transcript {
            id: "t1".to_string(),
            language: "en".to_string(),
            segments: vec![segment("B", 0), segment("A", 500), segment("B", 1000)],
        };
        assert_eq!(transcript.speakers(), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let transcript = Transcript {
            id: "t1".to_string(),
            language: "en".to_string(),
            segments: vec![segment("A", 0)],
        };
        transcript.save(&path).await.unwrap();
        let loaded = Transcript::load(&path).await.unwrap();
        assert_eq!(loaded.segments, transcript.segments);
    }
}
