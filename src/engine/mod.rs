//! Recognition Engine Layer
//!
//! The boundary between the relay and whatever actually reads text out
//! of pixels. Engines take a raw RGBA buffer plus dimensions and return
//! a [`Recognition`]; everything above this module treats them as a
//! black box behind the [`RecognitionEngine`] trait.

pub mod tesseract_cli;

pub use tesseract_cli::TesseractCli;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete result of one recognition pass
///
/// Serialized into the cache store, so the field names are part of the
/// on-disk format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    /// All recognized words joined by single spaces
    pub full_text: String,
    /// Per-word bounding boxes, in reading order
    pub word_boxes: Vec<WordBox>,
}

/// One recognized word and its pixel-space bounding box
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBox {
    /// The recognized word
    pub word: String,
    /// Left edge in pixels
    pub x: i32,
    /// Top edge in pixels
    pub y: i32,
    /// Box width in pixels
    pub w: i32,
    /// Box height in pixels
    pub h: i32,
}

/// Errors surfaced by a recognition engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Recognition engine is not ready")]
    NotReady,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Recognition failed: {0}")]
    Failed(String),

    #[error("Recognition timed out after {0:?}")]
    TimedOut(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A pluggable text recognition backend
#[async_trait::async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Run recognition over a raw RGBA buffer
    async fn recognize(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Recognition, EngineError>;

    /// Whether the engine can currently accept requests
    fn is_ready(&self) -> bool;

    /// Short engine identifier for logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_serializes_with_camel_case_keys() {
        let recognition = Recognition {
            full_text: "HELLO WORLD".to_string(),
            word_boxes: vec![WordBox {
                word: "HELLO".to_string(),
                x: 10,
                y: 20,
                w: 100,
                h: 30,
            }],
        };

        let json = serde_json::to_string(&recognition).unwrap();
        assert!(json.contains("\"fullText\":\"HELLO WORLD\""));
        assert!(json.contains("\"wordBoxes\""));
        assert!(json.contains("\"word\":\"HELLO\""));
        assert!(json.contains("\"x\":10"));
        assert!(json.contains("\"h\":30"));
        assert!(!json.contains("full_text"));
    }

    #[test]
    fn test_recognition_deserializes_from_wire_form() {
        let json = r#"{
            "fullText": "SCORE 42",
            "wordBoxes": [
                {"word": "SCORE", "x": 5, "y": 8, "w": 60, "h": 14},
                {"word": "42", "x": 70, "y": 8, "w": 20, "h": 14}
            ]
        }"#;

        let recognition: Recognition = serde_json::from_str(json).unwrap();
        assert_eq!(recognition.full_text, "SCORE 42");
        assert_eq!(recognition.word_boxes.len(), 2);
        assert_eq!(recognition.word_boxes[1].word, "42");
        assert_eq!(recognition.word_boxes[1].x, 70);
    }

    #[test]
    fn test_default_recognition_is_empty() {
        let recognition = Recognition::default();
        assert!(recognition.full_text.is_empty());
        assert!(recognition.word_boxes.is_empty());
    }

    #[test]
    fn test_engine_error_messages() {
        assert_eq!(
            EngineError::NotReady.to_string(),
            "Recognition engine is not ready"
        );
        assert_eq!(
            EngineError::InvalidInput("empty frame".to_string()).to_string(),
            "Invalid input: empty frame"
        );
        assert!(
            EngineError::TimedOut(Duration::from_secs(30))
                .to_string()
                .contains("30s")
        );
    }
}
