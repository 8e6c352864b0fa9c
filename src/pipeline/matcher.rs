//! Field similarity scoring.
//!
//! One expected value against one piece of extracted text, through a fixed
//! ladder; the first rule that succeeds wins and sets the score:
//!
//! 1. exact normalized equality → 1.0
//! 2. expected is a substring of the extracted text → 0.9
//! 3. token-set overlap (IoU) ≥ 0.6 → the overlap itself
//! 4. dosage/time only: numeric values agree after unit stripping → 0.8
//! 5. Levenshtein similarity, passing iff ≥ 0.75
//!
//! Patient names are scored across both orderings ("Doe, John" and
//! "John Doe") and the best variant wins. Drift/lateness policy for times
//! lives in the session layer; here the printed token is just text.

use std::collections::BTreeSet;

use crate::config::scoring;
use crate::models::{FieldMatchResult, LabelField};
use crate::schedule;

use super::normalize::normalize;

/// Score one expected field value against extracted text.
pub fn match_field(expected: &str, extracted: &str, field: LabelField) -> FieldMatchResult {
    let (score, passed) = if field == LabelField::PatientName {
        name_variants(expected)
            .iter()
            .map(|variant| ladder(&normalize(variant), &normalize(extracted), field, expected, extracted))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap_or((0.0, false))
    } else {
        ladder(&normalize(expected), &normalize(extracted), field, expected, extracted)
    };

    FieldMatchResult {
        field,
        passed,
        score,
    }
}

/// Both orderings of a "Last, First" name. Labels print either.
pub fn name_variants(name: &str) -> Vec<String> {
    match name.split_once(',') {
        Some((last, first)) => vec![
            name.to_string(),
            format!("{} {}", first.trim(), last.trim()),
        ],
        None => vec![name.to_string()],
    }
}

fn ladder(
    expected_norm: &str,
    extracted_norm: &str,
    field: LabelField,
    expected_raw: &str,
    extracted_raw: &str,
) -> (f32, bool) {
    if expected_norm.is_empty() || extracted_norm.is_empty() {
        return (0.0, false);
    }

    // 1. Exact
    if expected_norm == extracted_norm {
        return (1.0, true);
    }

    // 2. Substring (labels print extra words around the field)
    if extracted_norm.contains(expected_norm) {
        return (scoring::SUBSTRING_SCORE, true);
    }

    // 3. Token-set overlap
    let overlap = token_overlap(expected_norm, extracted_norm);
    if overlap >= scoring::TOKEN_OVERLAP_THRESHOLD {
        return (overlap, true);
    }

    // 4. Numeric agreement for short numeric fields. When both sides parse
    //    to a value, that value is authoritative: "10mg" vs "20mg" is a
    //    mismatch no matter how close the strings look.
    if matches!(field, LabelField::Dosage | LabelField::Time) {
        match numeric_values_agree(field, expected_raw, extracted_raw) {
            Some(true) => return (scoring::NUMERIC_SCORE, true),
            Some(false) => {
                return (levenshtein_similarity(expected_norm, extracted_norm), false)
            }
            None => {}
        }
    }

    // 5. Edit-distance fallback, the final gate
    let similarity = levenshtein_similarity(expected_norm, extracted_norm);
    (similarity, similarity >= scoring::PASS_THRESHOLD)
}

/// Intersection-over-union of the two strings' word sets.
fn token_overlap(a: &str, b: &str) -> f32 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

/// Numeric comparison after unit stripping. Times compare as minutes since
/// midnight (so "09:00" and "9:00 AM" agree but "9:30" does not); dosages
/// compare the leading numeric value ("10mg" vs "10 mg"). `None` when
/// either side has no parseable value.
fn numeric_values_agree(field: LabelField, expected: &str, extracted: &str) -> Option<bool> {
    match field {
        LabelField::Time => match (
            schedule::parse_display_time(expected),
            schedule::parse_display_time(extracted),
        ) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        },
        LabelField::Dosage => match (leading_number(expected), leading_number(extracted)) {
            (Some(a), Some(b)) => Some((a - b).abs() < f64::EPSILON),
            _ => None,
        },
        _ => None,
    }
}

/// First numeric token in the string ("10mg twice" → 10.0).
fn leading_number(s: &str) -> Option<f64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let tail = &s[start..];
    let end = tail
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(tail.len());
    tail[..end].trim_end_matches('.').parse().ok()
}

/// 1 − distance / max_len, in [0, 1].
fn levenshtein_similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f32 / max_len as f32
}

/// Levenshtein edit distance, two rolling rows.
pub(crate) fn edit_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n as u32;
    }
    if n == 0 {
        return m as u32;
    }

    let mut prev: Vec<u32> = (0..=n as u32).collect();
    let mut curr = vec![0u32; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = (i + 1) as u32;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = u32::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
