//! Vision OCR engine — extracts label text via an HTTP vision backend.
//!
//! Posts base64-encoded frames to a vision-model endpoint and maps the
//! response to an [`OcrReading`]. Vision backends frequently omit a usable
//! confidence figure, so a label-shaped heuristic fills the gap: pouch
//! labels are short, line-oriented, and carry numeric dosage and time
//! tokens, which is what the heuristic rewards.

use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{OcrEngine, OcrError, OcrReading};

/// Transport-level timeout on a single recognition request. The capture
/// driver applies its own (configurable) cap on top of this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Extraction instruction sent with every frame. Kept deliberately narrow:
/// the backend transcribes, the pipeline interprets.
const LABEL_PROMPT: &str = "\
Transcribe ALL text printed on the medication label in this photo, one line \
of label text per output line. Include the patient name, medication name, \
dosage, times, and any instructions exactly as printed. Output the text only.";

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(alias = "response")]
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

// ──────────────────────────────────────────────
// HttpVisionOcr
// ──────────────────────────────────────────────

/// Production recognition engine backed by a vision-model HTTP endpoint.
pub struct HttpVisionOcr {
    client: reqwest::blocking::Client,
    endpoint: String,
    model_name: String,
}

impl HttpVisionOcr {
    pub fn new(endpoint: impl Into<String>, model_name: impl Into<String>) -> Result<Self, OcrError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model_name: model_name.into(),
        })
    }
}

impl OcrEngine for HttpVisionOcr {
    fn recognize(&self, image: &[u8]) -> Result<OcrReading, OcrError> {
        let _span = tracing::info_span!(
            "vision_ocr_recognize",
            model = %self.model_name,
            image_size = image.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let base64_image = base64::engine::general_purpose::STANDARD.encode(image);
        let request = RecognizeRequest {
            model: &self.model_name,
            prompt: LABEL_PROMPT,
            images: vec![base64_image],
            stream: false,
        };

        let response: RecognizeResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;

        if response.text.trim().is_empty() {
            return Err(OcrError::EmptyResponse);
        }

        let confidence = response
            .confidence
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or_else(|| label_confidence_heuristic(&response.text));

        tracing::info!(
            model = %self.model_name,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = response.text.len(),
            confidence,
            "Vision OCR recognition complete"
        );

        Ok(OcrReading::new(response.text, confidence))
    }
}

// ──────────────────────────────────────────────
// Confidence heuristic
// ──────────────────────────────────────────────

/// Estimate confidence from how label-shaped the transcription looks.
///
/// Pouch/bottle labels are short and line-oriented, so length alone is a
/// poor signal. Instead:
/// - base score from non-empty line count (1 line → 0.40, 2–3 → 0.60,
///   4+ → 0.70);
/// - +0.10 when a dosage-unit token is present (`mg`, `mcg`, `ml`, ...);
/// - +0.10 when a time-like token is present (`HH:MM`);
/// - +0.05 when any digit is present.
///
/// Capped at 0.95; heuristic scoring never claims certainty.
fn label_confidence_heuristic(text: &str) -> f32 {
    let lines = text.lines().filter(|l| !l.trim().is_empty()).count();
    if lines == 0 {
        return 0.0;
    }

    let base: f32 = match lines {
        1 => 0.40,
        2 | 3 => 0.60,
        _ => 0.70,
    };

    let lower = text.to_lowercase();
    let has_unit = ["mg", "mcg", "ml", "tablet", "capsule"]
        .iter()
        .any(|u| lower.contains(u));
    let has_time = lower
        .split(|c: char| c.is_whitespace())
        .any(|tok| tok.contains(':') && tok.chars().next().is_some_and(|c| c.is_ascii_digit()));
    let has_digit = lower.chars().any(|c| c.is_ascii_digit());

    let bonus = if has_unit { 0.10 } else { 0.0 }
        + if has_time { 0.10 } else { 0.0 }
        + if has_digit { 0.05 } else { 0.0 };

    (base + bonus).min(0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_empty_text_is_zero() {
        assert_eq!(label_confidence_heuristic(""), 0.0);
        assert_eq!(label_confidence_heuristic("  \n \n"), 0.0);
    }

    #[test]
    fn heuristic_single_bare_line_is_low() {
        let c = label_confidence_heuristic("LISINOPRIL");
        assert!((c - 0.40).abs() < f32::EPSILON, "got {c}");
    }

    #[test]
    fn heuristic_full_label_scores_high() {
        let c = label_confidence_heuristic("JOHN DOE\nLISINOPRIL 10MG\n9:00 AM TABLET");
        assert!(c >= 0.80, "full label should score high, got {c}");
        assert!(c <= 0.95);
    }

    #[test]
    fn heuristic_rewards_dosage_and_time_tokens() {
        let bare = label_confidence_heuristic("alpha\nbravo");
        let dosed = label_confidence_heuristic("alpha\n10 mg at 9:00");
        assert!(dosed > bare);
    }

    #[test]
    fn request_serializes_expected_shape() {
        let req = RecognizeRequest {
            model: "label-ocr",
            prompt: LABEL_PROMPT,
            images: vec!["QUJD".into()],
            stream: false,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "label-ocr");
        assert_eq!(value["stream"], false);
        assert_eq!(value["images"][0], "QUJD");
    }

    #[test]
    fn response_accepts_ollama_style_field_name() {
        let parsed: RecognizeResponse =
            serde_json::from_str(r#"{"response": "JOHN DOE", "done": true}"#).unwrap();
        assert_eq!(parsed.text, "JOHN DOE");
        assert!(parsed.confidence.is_none());
    }

    #[test]
    fn response_carries_explicit_confidence() {
        let parsed: RecognizeResponse =
            serde_json::from_str(r#"{"text": "JOHN DOE", "confidence": 0.87}"#).unwrap();
        assert_eq!(parsed.confidence, Some(0.87));
    }
}
