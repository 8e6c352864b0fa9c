//! Success-record emission — fire-and-forget.
//!
//! The record boundary is an external collaborator: the controller submits
//! a [`ScanRecord`] once per successful session and moves on. Delivery
//! failures are logged for operators and never retried by the core, and
//! never block or fail the session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Timeliness, ValidationVerdict};
use crate::schedule;

use super::state::CaptureSession;

/// Payload handed to the record collaborator on session success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub session_id: Uuid,
    pub medication_id: Uuid,
    pub patient_id: Uuid,
    /// The verdict that ended the session. Absent when the success came
    /// from manual self-report before any label was read.
    pub verdict: Option<ValidationVerdict>,
    pub raw_text: String,
    /// Drift classification against the scheduled dose time, when known.
    pub timeliness: Option<Timeliness>,
    /// True when the user affirmed the dose manually after automated
    /// verification was exhausted.
    pub via_manual: bool,
    pub timestamp: DateTime<Utc>,
}

/// Destination for success records.
pub trait RecordSink: Send + Sync {
    fn submit(&self, record: &ScanRecord);
}

/// Build and submit the success record for a session. Called exactly once
/// per session; the `EmitSuccessRecord` effect is only reachable once.
pub(crate) fn emit_success_record(
    sink: &dyn RecordSink,
    session: &CaptureSession,
    via_manual: bool,
) {
    let timestamp = Utc::now();
    let record = ScanRecord {
        session_id: session.id,
        medication_id: session.medication_id,
        patient_id: session.patient_id,
        verdict: session.last_verdict.clone(),
        raw_text: session.last_raw_text.clone().unwrap_or_default(),
        timeliness: session
            .scheduled_at
            .map(|scheduled| schedule::classify_timeliness(scheduled, timestamp)),
        via_manual,
        timestamp,
    };

    tracing::info!(
        session_id = %record.session_id,
        via_manual,
        timeliness = ?record.timeliness,
        "Dose verification succeeded"
    );
    sink.submit(&record);
}

// ──────────────────────────────────────────────
// Sinks
// ──────────────────────────────────────────────

/// Structured-log sink, the default when no record collaborator is wired.
pub struct TracingRecordSink;

impl RecordSink for TracingRecordSink {
    fn submit(&self, record: &ScanRecord) {
        tracing::info!(
            session_id = %record.session_id,
            medication_id = %record.medication_id,
            patient_id = %record.patient_id,
            via_manual = record.via_manual,
            timeliness = ?record.timeliness,
            "Scan record"
        );
    }
}

/// HTTP sink posting records to the session-record API.
pub struct HttpRecordSink {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpRecordSink {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl RecordSink for HttpRecordSink {
    fn submit(&self, record: &ScanRecord) {
        // Delivery happens off the caller's thread; the session does not
        // wait on the record API.
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let record = record.clone();
        std::thread::spawn(move || {
            match client.post(&endpoint).json(&record).send() {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(session_id = %record.session_id, "Scan record delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        session_id = %record.session_id,
                        status = %response.status(),
                        "Scan record rejected by record API (not retried)"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %record.session_id,
                        error = %e,
                        "Scan record delivery failed (not retried)"
                    );
                }
            }
        });
    }
}
