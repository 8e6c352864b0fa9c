//! Verdict aggregation across the four label fields.
//!
//! Patient name and time are required: those are the two failure modes with
//! real safety consequences (wrong person, wrong moment). Medication name
//! and dosage contribute to score and confidence but cannot block a pass;
//! stylized packaging fonts make them the noisiest OCR targets. Partial
//! credit on required fields never suffices.

use std::collections::BTreeMap;

use crate::models::{ExpectedLabel, ExtractedLabel, FieldMatchResult, LabelField, ValidationVerdict};

use super::matcher::match_field;

/// Score every field and fold the results into a verdict.
///
/// An absent extracted field degrades to matching against empty text, which
/// fails that field automatically; absence is never an error.
pub fn validate(extracted: &ExtractedLabel, expected: &ExpectedLabel) -> ValidationVerdict {
    let results: Vec<FieldMatchResult> = LabelField::ALL
        .into_iter()
        .map(|field| {
            match_field(
                expected.field_value(field),
                extracted.field_text(field).unwrap_or(""),
                field,
            )
        })
        .collect();

    let matches: BTreeMap<LabelField, bool> =
        results.iter().map(|r| (r.field, r.passed)).collect();

    let required_checks = LabelField::REQUIRED.len() as u32;
    let passed_checks = results
        .iter()
        .filter(|r| r.field.is_required() && r.passed)
        .count() as u32;
    let score = results.iter().filter(|r| r.passed).count() as u32;
    let confidence = results.iter().map(|r| r.score).sum::<f32>() / results.len() as f32;

    let verdict = ValidationVerdict {
        is_valid: passed_checks == required_checks,
        matches,
        score,
        confidence,
        required_checks,
        passed_checks,
    };

    // Field-level mismatch detail stays in operator logs; callers surface
    // only the generic verdict to end users.
    for r in &results {
        tracing::debug!(
            field = %r.field,
            passed = r.passed,
            score = r.score,
            required = r.field.is_required(),
            "Field match result"
        );
    }
    tracing::debug!(
        is_valid = verdict.is_valid,
        passed_checks,
        required_checks,
        score,
        confidence,
        "Label validation verdict"
    );

    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrReading;
    use crate::pipeline::extract::extract;

    fn expected() -> ExpectedLabel {
        ExpectedLabel {
            medication_name: "Lisinopril".into(),
            dosage: "10mg".into(),
            patient_name: "Doe, John".into(),
            scheduled_time: "9:00 AM".into(),
        }
    }

    #[test]
    fn matching_label_is_valid() {
        let reading = OcrReading::new("JOHN DOE\nLISINOPRIL 10MG\n9:00 AM TABLET", 0.9);
        let verdict = validate(&extract(&reading), &expected());

        assert!(verdict.is_valid);
        assert_eq!(verdict.passed_checks, 2);
        assert_eq!(verdict.required_checks, 2);
        assert_eq!(verdict.score, 4);
    }

    #[test]
    fn wrong_patient_invalidates_despite_matching_medication() {
        let reading = OcrReading::new("JANE SMITH\nLISINOPRIL 10MG\n9:00 AM", 0.9);
        let verdict = validate(&extract(&reading), &expected());

        assert!(!verdict.is_valid);
        assert_eq!(verdict.matches[&LabelField::PatientName], false);
        assert_eq!(verdict.matches[&LabelField::MedicationName], true);
        assert_eq!(verdict.matches[&LabelField::Time], true);
    }

    #[test]
    fn empty_reading_fails_with_zero_score() {
        let verdict = validate(&extract(&OcrReading::empty()), &expected());

        assert!(!verdict.is_valid);
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.passed_checks, 0);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn optional_failures_cannot_block_a_pass() {
        // Required fields present and correct, optional fields absent.
        let extracted = ExtractedLabel {
            patient_name: Some("John Doe".into()),
            printed_time: Some("9:00 AM".into()),
            ..Default::default()
        };
        let verdict = validate(&extracted, &expected());

        assert!(verdict.is_valid);
        assert_eq!(verdict.passed_checks, 2);
        assert_eq!(verdict.score, 2);
        assert_eq!(verdict.matches[&LabelField::MedicationName], false);
        assert_eq!(verdict.matches[&LabelField::Dosage], false);
    }

    #[test]
    fn optional_passes_cannot_rescue_a_required_failure() {
        // Medication and dosage correct, but no patient name on the label.
        let extracted = ExtractedLabel {
            medication_name: Some("lisinopril".into()),
            dosage: Some("10mg".into()),
            printed_time: Some("9:00 AM".into()),
            ..Default::default()
        };
        let verdict = validate(&extracted, &expected());

        assert!(!verdict.is_valid);
        assert_eq!(verdict.passed_checks, 1);
        assert_eq!(verdict.score, 3);
        assert_eq!(verdict.failed_required_fields(), vec![LabelField::PatientName]);
    }

    #[test]
    fn name_order_invariance_round_trip() {
        // The expected name is "Last, First"; the label prints "First Last".
        let printed_first_last =
            OcrReading::new("JOHN DOE\nLISINOPRIL 10MG\n9:00 AM", 0.9);
        assert!(validate(&extract(&printed_first_last), &expected()).is_valid);

        let printed_last_first =
            OcrReading::new("DOE, JOHN\nLISINOPRIL 10MG\n9:00 AM", 0.9);
        assert!(validate(&extract(&printed_last_first), &expected()).is_valid);
    }

    #[test]
    fn confidence_is_mean_of_field_scores() {
        let extracted = ExtractedLabel {
            patient_name: Some("John Doe".into()),
            printed_time: Some("9:00 AM".into()),
            ..Default::default()
        };
        let verdict = validate(&extracted, &expected());

        // Two exact matches (1.0) and two absent fields (0.0).
        assert!((verdict.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn invariant_passed_at_most_required_at_most_total() {
        for text in [
            "",
            "JOHN DOE",
            "JOHN DOE\nLISINOPRIL 10MG\n9:00 AM",
            "JANE SMITH\nMETFORMIN 500MG\n8:00 PM",
        ] {
            let verdict = validate(&extract(&OcrReading::new(text, 0.8)), &expected());
            assert!(verdict.passed_checks <= verdict.required_checks);
            assert!(verdict.required_checks <= LabelField::ALL.len() as u32);
            assert!(verdict.score as usize <= LabelField::ALL.len());
        }
    }
}
