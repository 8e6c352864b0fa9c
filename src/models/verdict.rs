use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::label::LabelField;

/// Outcome of matching one expected field against the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldMatchResult {
    pub field: LabelField,
    pub passed: bool,
    /// Similarity in [0, 1]; reported even when the field did not pass.
    pub score: f32,
}

/// Aggregated pass/fail verdict for one validation attempt.
///
/// `is_valid` is true only when every required field passed; partial credit
/// never suffices. Invariant: `passed_checks <= required_checks <= 4`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    /// Per-field pass booleans, for display. Carries no extracted text so
    /// mismatch detail stays out of user-facing surfaces.
    pub matches: BTreeMap<LabelField, bool>,
    /// Count of all passed fields (required + optional), for display.
    pub score: u32,
    /// Mean of all field match scores.
    pub confidence: f32,
    pub required_checks: u32,
    pub passed_checks: u32,
}

impl ValidationVerdict {
    /// Required fields that failed this attempt, logged for operators,
    /// never shown to the end user.
    pub fn failed_required_fields(&self) -> Vec<LabelField> {
        LabelField::REQUIRED
            .into_iter()
            .filter(|f| !self.matches.get(f).copied().unwrap_or(false))
            .collect()
    }
}

/// Adherence drift classification for a verified dose. Independent of label
/// correctness: the matcher compares the printed time token, this classifies
/// when the dose actually happened relative to the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeliness {
    OnTime,
    Late,
    OutsideWindow,
}
