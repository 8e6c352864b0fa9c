use std::fmt;

use serde::{Deserialize, Serialize};

/// The four fields a scan is verified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelField {
    MedicationName,
    Dosage,
    PatientName,
    Time,
}

impl LabelField {
    pub const ALL: [LabelField; 4] = [
        LabelField::MedicationName,
        LabelField::Dosage,
        LabelField::PatientName,
        LabelField::Time,
    ];

    /// Patient identity and dose timing are the two failure modes with real
    /// safety consequences; medication name and dosage are informational
    /// because stylized packaging fonts make them the noisiest OCR targets.
    pub const REQUIRED: [LabelField; 2] = [LabelField::PatientName, LabelField::Time];

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LabelField::MedicationName => "medication_name",
            LabelField::Dosage => "dosage",
            LabelField::PatientName => "patient_name",
            LabelField::Time => "time",
        }
    }
}

impl fmt::Display for LabelField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the label is supposed to say. Supplied by the caller before a scan
/// session starts and constant for the session's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedLabel {
    pub medication_name: String,
    pub dosage: String,
    /// Stored in "Last, First" order; printed labels may use either order.
    pub patient_name: String,
    /// Localized display string (e.g. "9:00 AM"), formatted in the patient's
    /// timezone to match what is printed on the physical label, not ISO.
    pub scheduled_time: String,
}

impl ExpectedLabel {
    /// The expected value the matcher compares a given field against.
    pub fn field_value(&self, field: LabelField) -> &str {
        match field {
            LabelField::MedicationName => &self.medication_name,
            LabelField::Dosage => &self.dosage,
            LabelField::PatientName => &self.patient_name,
            LabelField::Time => &self.scheduled_time,
        }
    }
}

/// Structured fields pulled out of one OCR reading. Any field may be absent
/// (pattern rules found nothing); absence is data, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedLabel {
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub patient_name: Option<String>,
    pub instructions: Option<String>,
    pub pharmacy: Option<String>,
    pub prescriber: Option<String>,
    pub printed_time: Option<String>,
    /// Equals the OCR reading confidence; extraction does not discount
    /// further (deliberate simplification, not a claim of accuracy).
    pub confidence: f32,
}

impl ExtractedLabel {
    /// True when no comparable field was found at all.
    pub fn is_empty(&self) -> bool {
        self.medication_name.is_none()
            && self.dosage.is_none()
            && self.patient_name.is_none()
            && self.printed_time.is_none()
    }

    /// Extracted text for one of the comparable fields, if present.
    pub fn field_text(&self, field: LabelField) -> Option<&str> {
        match field {
            LabelField::MedicationName => self.medication_name.as_deref(),
            LabelField::Dosage => self.dosage.as_deref(),
            LabelField::PatientName => self.patient_name.as_deref(),
            LabelField::Time => self.printed_time.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> ExpectedLabel {
        ExpectedLabel {
            medication_name: "Lisinopril".into(),
            dosage: "10mg".into(),
            patient_name: "Doe, John".into(),
            scheduled_time: "9:00 AM".into(),
        }
    }

    #[test]
    fn required_fields_are_patient_and_time() {
        assert!(LabelField::PatientName.is_required());
        assert!(LabelField::Time.is_required());
        assert!(!LabelField::MedicationName.is_required());
        assert!(!LabelField::Dosage.is_required());
    }

    #[test]
    fn expected_field_lookup_covers_all_fields() {
        let exp = expected();
        assert_eq!(exp.field_value(LabelField::MedicationName), "Lisinopril");
        assert_eq!(exp.field_value(LabelField::Dosage), "10mg");
        assert_eq!(exp.field_value(LabelField::PatientName), "Doe, John");
        assert_eq!(exp.field_value(LabelField::Time), "9:00 AM");
    }

    #[test]
    fn default_extraction_is_empty() {
        let ext = ExtractedLabel::default();
        assert!(ext.is_empty());
        for field in LabelField::ALL {
            assert!(ext.field_text(field).is_none());
        }
    }

    #[test]
    fn informational_fields_do_not_affect_is_empty() {
        let ext = ExtractedLabel {
            pharmacy: Some("Main Street Pharmacy".into()),
            instructions: Some("Take with food".into()),
            ..Default::default()
        };
        assert!(ext.is_empty());
    }

    #[test]
    fn field_serializes_as_camel_case() {
        let json = serde_json::to_string(&LabelField::MedicationName).unwrap();
        assert_eq!(json, "\"medicationName\"");
    }
}
