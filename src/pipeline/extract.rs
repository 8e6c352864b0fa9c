//! Structured field extraction from raw label text.
//!
//! The extractor splits sanitized OCR text into lines and applies an
//! ordered rule list per field; the first rule that matches wins, and a field
//! with no matching rule is simply absent. Rule priority per field:
//!
//! - patient name: explicit `Patient:`/`Name:` keyword line, then a
//!   "Last, First" comma-shaped line, then the first short all-alphabetic
//!   line that is not a medication/pharmacy/instruction line (pouch labels
//!   print the recipient name prominently).
//! - medication name: a lexicon hit anywhere on a line, then the words
//!   preceding the dosage token, then an `Rx:`/`Medication:` keyword line.
//! - dosage: first number adjacent to a dosage-unit suffix.
//! - printed time: `H:MM` with an am/pm marker, then bare `H:MM`, then the
//!   `H.MM` form some printers emit.
//! - instructions / pharmacy / prescriber: keyword-anchored whole lines.
//!
//! Extraction never fails; it degrades to absent fields.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::ExtractedLabel;
use crate::ocr::OcrReading;

use super::lexicon::{correct_medication_terms, find_known_medication};
use super::normalize::sanitize;

fn dosage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:mg|mcg|µg|g|ml|iu|units?)\b").expect("dosage regex")
    })
}

fn time_with_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\d{1,2}[:.]\d{2}\s*(?:a\.?m\.?|p\.?m\.?)").expect("time regex")
    })
}

fn time_colon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{1,2}:\d{2}\b").expect("time regex"))
}

fn time_dot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{1,2}\.\d{2}\b").expect("time regex"))
}

fn name_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:patient|name|for)\s*[:\-]\s*(.+)$").expect("name keyword regex")
    })
}

fn comma_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z'\-]+,\s*[A-Za-z][A-Za-z'\-]+(?:\s+[A-Za-z][A-Za-z'\-\.]+)*$")
            .expect("comma name regex")
    })
}

fn med_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:medication|med|rx|drug)\s*[:\-]\s*(.+)$").expect("med keyword regex")
    })
}

fn instruction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:take|with food|with water|by mouth|oral|daily|twice|every)\b")
            .expect("instruction regex")
    })
}

fn prescriber_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:dr\.?\s|prescriber|prescribed by)\b").expect("prescriber regex")
    })
}

/// Pull structured fields out of one OCR reading.
///
/// The whole-label confidence equals the reading confidence; extraction
/// does not discount further.
pub fn extract(reading: &OcrReading) -> ExtractedLabel {
    let text = correct_medication_terms(&sanitize(&reading.text));
    let lines: Vec<&str> = text.lines().collect();

    let dosage_hit = lines
        .iter()
        .find_map(|line| dosage_re().find(line).map(|m| (*line, m)));

    let label = ExtractedLabel {
        patient_name: extract_patient_name(&lines),
        medication_name: extract_medication_name(&lines, dosage_hit),
        dosage: dosage_hit.map(|(_, m)| m.as_str().to_string()),
        printed_time: extract_printed_time(&lines),
        instructions: extract_keyword_line(&lines, instruction_re()),
        pharmacy: lines
            .iter()
            .find(|l| l.to_lowercase().contains("pharmacy"))
            .map(|l| l.trim().to_string()),
        prescriber: extract_keyword_line(&lines, prescriber_re()),
        confidence: reading.confidence,
    };

    tracing::debug!(
        confidence = label.confidence,
        has_patient = label.patient_name.is_some(),
        has_medication = label.medication_name.is_some(),
        has_dosage = label.dosage.is_some(),
        has_time = label.printed_time.is_some(),
        "Label extraction complete"
    );

    label
}

// ──────────────────────────────────────────────
// Per-field rules
// ──────────────────────────────────────────────

fn extract_patient_name(lines: &[&str]) -> Option<String> {
    // Rule 1: explicit keyword
    if let Some(name) = lines
        .iter()
        .find_map(|l| name_keyword_re().captures(l).map(|c| c[1].trim().to_string()))
    {
        return Some(name);
    }

    // Rule 2: "Last, First" shaped line
    if let Some(line) = lines.iter().find(|l| comma_name_re().is_match(l.trim())) {
        return Some(line.trim().to_string());
    }

    // Rule 3: first short all-alphabetic line that is not claimed by
    // another field's vocabulary
    lines
        .iter()
        .map(|l| l.trim())
        .find(|l| looks_like_name(l))
        .map(|l| l.to_string())
}

fn looks_like_name(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    if !tokens
        .iter()
        .all(|t| t.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-'))
    {
        return false;
    }
    // A line naming a medication, a pharmacy, or an instruction is not the
    // patient, however name-shaped it looks.
    find_known_medication(line).is_none()
        && !line.to_lowercase().contains("pharmacy")
        && !instruction_re().is_match(line)
        && !prescriber_re().is_match(line)
}

fn extract_medication_name(
    lines: &[&str],
    dosage_hit: Option<(&str, regex::Match<'_>)>,
) -> Option<String> {
    // Rule 1: a dictionary drug name anywhere on a line
    if let Some(canonical) = lines.iter().find_map(|l| find_known_medication(l)) {
        return Some(canonical.to_string());
    }

    // Rule 2: the words immediately preceding the dosage token
    if let Some((line, m)) = dosage_hit {
        let prefix = line[..m.start()].trim();
        if prefix.chars().filter(|c| c.is_alphabetic()).count() >= 4 {
            return Some(prefix.to_string());
        }
    }

    // Rule 3: explicit keyword
    lines
        .iter()
        .find_map(|l| med_keyword_re().captures(l).map(|c| c[1].trim().to_string()))
}

fn extract_printed_time(lines: &[&str]) -> Option<String> {
    for re in [time_with_marker_re(), time_colon_re(), time_dot_re()] {
        if let Some(m) = lines.iter().find_map(|l| re.find(l)) {
            return Some(m.as_str().trim().to_string());
        }
    }
    None
}

fn extract_keyword_line(lines: &[&str], re: &Regex) -> Option<String> {
    lines
        .iter()
        .find(|l| re.is_match(l))
        .map(|l| l.trim().to_string())
}
