//! Post-OCR medication-name correction.
//!
//! Label fonts mangle drug names more than any other field, so mangled
//! words are fuzzy-matched against a dictionary of common medications and
//! repaired before extraction. Correction is conservative: edit distance
//! <= 2, word length >= 5, and a unique best match; anything ambiguous is
//! left untouched.

use super::matcher::edit_distance;

/// Common medication names. Sorted for binary search, lowercase for
/// case-insensitive matching.
const MEDICATION_TERMS: &[&str] = &[
    "albuterol", "alendronate", "allopurinol", "amlodipine", "amoxicillin",
    "apixaban", "aspirin", "atenolol", "atorvastatin", "azithromycin",
    "baclofen", "bisoprolol", "budesonide", "bupropion", "buspirone",
    "carvedilol", "celecoxib", "cephalexin", "citalopram", "clonazepam",
    "clopidogrel", "cyclobenzaprine", "diclofenac", "digoxin", "diltiazem",
    "donepezil", "doxycycline", "duloxetine", "enalapril", "escitalopram",
    "famotidine", "fluoxetine", "fluticasone", "furosemide", "gabapentin",
    "glipizide", "hydralazine", "hydrochlorothiazide", "ibuprofen", "insulin",
    "lamotrigine", "levetiracetam", "levothyroxine", "lisinopril", "loratadine",
    "losartan", "lovastatin", "meloxicam", "metformin", "methotrexate",
    "metoprolol", "mirtazapine", "montelukast", "naproxen", "nifedipine",
    "omeprazole", "ondansetron", "oxycodone", "pantoprazole", "paroxetine",
    "pravastatin", "prednisone", "propranolol", "quetiapine", "ramipril",
    "ranitidine", "rivaroxaban", "rosuvastatin", "sertraline", "simvastatin",
    "spironolactone", "tamsulosin", "tramadol", "trazodone", "venlafaxine",
    "warfarin",
];

/// Apply medication-name correction to a block of label text.
/// Only words that are close, unambiguous matches to a known medication are
/// rewritten; everything else passes through unchanged.
pub fn correct_medication_terms(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut word_buf = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            word_buf.push(ch);
        } else {
            if !word_buf.is_empty() {
                result.push_str(&try_correct_word(&word_buf));
                word_buf.clear();
            }
            result.push(ch);
        }
    }
    if !word_buf.is_empty() {
        result.push_str(&try_correct_word(&word_buf));
    }

    result
}

/// Find a known medication mentioned anywhere in a line, tolerating the
/// same OCR mangling as [`correct_medication_terms`]. Returns the canonical
/// dictionary form. The extractor uses this as its strongest
/// medication-name signal.
pub fn find_known_medication(line: &str) -> Option<&'static str> {
    line.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 5)
        .find_map(|word| {
            let lower = word.to_lowercase();
            if let Ok(idx) = MEDICATION_TERMS.binary_search(&lower.as_str()) {
                return Some(MEDICATION_TERMS[idx]);
            }
            closest_term(&lower).map(|(term, _)| term)
        })
}

fn try_correct_word(word: &str) -> String {
    if word.len() < 5 {
        return word.to_string();
    }

    let lower = word.to_lowercase();
    if MEDICATION_TERMS.binary_search(&lower.as_str()).is_ok() {
        return word.to_string();
    }

    match closest_term(&lower) {
        Some((term, _)) => preserve_case(word, term),
        None => word.to_string(),
    }
}

/// Unique best dictionary match within edit distance 2, or None.
fn closest_term(lower: &str) -> Option<(&'static str, u32)> {
    let mut best_term: Option<&'static str> = None;
    let mut best_distance = 3u32;
    let mut ambiguous = false;

    for &term in MEDICATION_TERMS {
        let len_diff = (lower.len() as i32 - term.len() as i32).unsigned_abs();
        if len_diff > 2 {
            continue;
        }

        let dist = edit_distance(lower, term);
        if dist < best_distance {
            best_distance = dist;
            best_term = Some(term);
            ambiguous = false;
        } else if dist == best_distance && best_term.is_some() {
            ambiguous = true;
        }
    }

    match (best_term, ambiguous) {
        (Some(term), false) => Some((term, best_distance)),
        _ => None,
    }
}

/// Preserve the original word's capitalization pattern when applying a
/// correction.
fn preserve_case(original: &str, correction: &str) -> String {
    if original.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        return correction.to_uppercase();
    }

    let first_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if first_upper {
        let mut chars = correction.chars();
        match chars.next() {
            Some(c) => {
                let mut s = c.to_uppercase().to_string();
                s.extend(chars);
                s
            }
            None => correction.to_string(),
        }
    } else {
        correction.to_string()
    }
}
