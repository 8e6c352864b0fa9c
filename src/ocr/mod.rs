//! OCR boundary — text recognition is an external capability.
//!
//! The pipeline consumes an [`OcrReading`] and never cares which engine
//! produced it. Engines implement [`OcrEngine`]; the production
//! implementation ([`vision::HttpVisionOcr`]) posts frames to a vision-OCR
//! HTTP backend, and tests substitute mocks.

pub mod frame;
pub mod vision;

pub use frame::Frame;
pub use vision::HttpVisionOcr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One recognition attempt's output. Immutable; consumed by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrReading {
    pub text: String,
    /// Engine-reported (or heuristic) confidence in [0, 1].
    pub confidence: f32,
}

impl OcrReading {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A reading that carries no information (recognition produced nothing).
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }

    /// Whether this reading qualifies as "label detected" for the capture
    /// loop (anything non-whitespace counts; the validator decides quality).
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR backend rejected the request: {0}")]
    Backend(String),

    #[error("OCR backend returned an empty response")]
    EmptyResponse,

    #[error("Image decoding failed: {0}")]
    ImageDecode(String),
}

/// Recognition capability abstraction (allows mocking for tests).
///
/// Synchronous by design: the capture driver wraps calls in
/// `spawn_blocking` with a hard per-call timeout, so a stuck engine cannot
/// block a session.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<OcrReading, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(OcrReading::new("x", 1.7).confidence, 1.0);
        assert_eq!(OcrReading::new("x", -0.2).confidence, 0.0);
    }

    #[test]
    fn empty_reading_has_no_text() {
        assert!(!OcrReading::empty().has_text());
        assert!(!OcrReading::new("   \n\t ", 0.9).has_text());
        assert!(OcrReading::new("LISINOPRIL", 0.9).has_text());
    }
}
