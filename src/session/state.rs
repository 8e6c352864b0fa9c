//! Pure capture state machine.
//!
//! [`transition`] is a function `(state, event) -> effects`: it mutates the
//! session value and returns the side effects the driver must execute, but
//! performs no I/O and reads no clock itself, so the three-strikes and
//! fallback logic is testable without cameras or timers.
//!
//! Two independent three-strike counters feed the manual fallback:
//! validation failures (label read, fields did not match) and no-label
//! strikes (no usable text within the capture window). `Success` and
//! `Abandoned` are absorbing; `EmitSuccessRecord` is only ever produced by
//! a transition *into* `Success`, which makes the success record at most
//! once per session by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::retries;
use crate::models::{ExpectedLabel, ValidationVerdict};
use crate::ocr::OcrReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Capturing,
    Validating,
    RetryPending,
    Success,
    ManualConfirmation,
    Abandoned,
}

impl CaptureState {
    /// States the session can never leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Success | CaptureState::Abandoned)
    }

    /// States where the automated capture loop has nothing left to do.
    /// `ManualConfirmation` is resolved externally (affirm/decline).
    pub fn automated_loop_done(self) -> bool {
        self.is_terminal() || self == CaptureState::ManualConfirmation
    }
}

/// How frames are acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Repeated automatic capture: throttled attempts inside a no-label
    /// window per strike.
    Continuous,
    /// One user-triggered frame per attempt; no elapsed-time window.
    SingleShot,
}

/// Why the session fell back to manual confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    RetriesExhausted,
    NoLabelDetected,
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    StartRequested,
    /// A frame produced non-empty recognized text.
    FrameRecognized(OcrReading),
    /// The capture window elapsed (or, in single-shot mode, the attempt
    /// produced no usable text). Recognition errors land here too; they
    /// are absorbed as "no text produced", never surfaced per attempt.
    NoLabelTimeout,
    Validated(ValidationVerdict),
    RetryDelayElapsed,
    ManualAffirmed,
    ManualDeclined,
    StopRequested,
}

/// Side effects for the driver to execute, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AcquireDevice,
    ReleaseDevice,
    BeginCapture,
    RunValidation(OcrReading),
    ScheduleRetry,
    EmitSuccessRecord { via_manual: bool },
    EnterManualFallback(FallbackReason),
}

/// One scan session's state. Owned by its driver task; nothing is shared
/// between sessions.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub id: Uuid,
    pub mode: CaptureMode,
    pub state: CaptureState,
    pub expected: ExpectedLabel,
    pub medication_id: Uuid,
    pub patient_id: Uuid,
    /// Scheduled dose instant, when known, used for adherence drift on the
    /// success record, never for pass/fail.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub validation_failures: u8,
    pub no_label_strikes: u8,
    pub started_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_raw_text: Option<String>,
    pub last_verdict: Option<ValidationVerdict>,
    pub fallback_reason: Option<FallbackReason>,
}

impl CaptureSession {
    pub fn new(
        mode: CaptureMode,
        expected: ExpectedLabel,
        medication_id: Uuid,
        patient_id: Uuid,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            state: CaptureState::Idle,
            expected,
            medication_id,
            patient_id,
            scheduled_at,
            validation_failures: 0,
            no_label_strikes: 0,
            started_at: Utc::now(),
            last_attempt_at: None,
            last_raw_text: None,
            last_verdict: None,
            fallback_reason: None,
        }
    }
}

/// Apply one event. Unexpected events in a given state (including anything
/// after a terminal state) are ignored with no effects.
pub fn transition(session: &mut CaptureSession, event: CaptureEvent) -> Vec<Effect> {
    use CaptureEvent as E;
    use CaptureState as S;

    match (session.state, event) {
        (S::Idle, E::StartRequested) => {
            session.state = S::Capturing;
            vec![Effect::AcquireDevice, Effect::BeginCapture]
        }

        (S::Capturing, E::FrameRecognized(reading)) => {
            session.state = S::Validating;
            session.last_raw_text = Some(reading.text.clone());
            vec![Effect::RunValidation(reading)]
        }

        (S::Capturing, E::NoLabelTimeout) => {
            session.no_label_strikes += 1;
            if session.no_label_strikes >= retries::MAX_NO_LABEL_STRIKES {
                session.state = S::ManualConfirmation;
                session.fallback_reason = Some(FallbackReason::NoLabelDetected);
                vec![
                    Effect::ReleaseDevice,
                    Effect::EnterManualFallback(FallbackReason::NoLabelDetected),
                ]
            } else {
                vec![Effect::BeginCapture]
            }
        }

        (S::Validating, E::Validated(verdict)) => {
            let is_valid = verdict.is_valid;
            session.last_verdict = Some(verdict);
            if is_valid {
                session.state = S::Success;
                vec![
                    Effect::EmitSuccessRecord { via_manual: false },
                    Effect::ReleaseDevice,
                ]
            } else {
                session.validation_failures += 1;
                if session.validation_failures >= retries::MAX_VALIDATION_ATTEMPTS {
                    session.state = S::ManualConfirmation;
                    session.fallback_reason = Some(FallbackReason::RetriesExhausted);
                    vec![
                        Effect::ReleaseDevice,
                        Effect::EnterManualFallback(FallbackReason::RetriesExhausted),
                    ]
                } else {
                    session.state = S::RetryPending;
                    vec![Effect::ScheduleRetry]
                }
            }
        }

        (S::RetryPending, E::RetryDelayElapsed) => {
            session.state = S::Capturing;
            vec![Effect::BeginCapture]
        }

        (S::ManualConfirmation, E::ManualAffirmed) => {
            session.state = S::Success;
            vec![Effect::EmitSuccessRecord { via_manual: true }]
        }

        (S::ManualConfirmation, E::ManualDeclined | E::StopRequested) => {
            session.state = S::Abandoned;
            vec![]
        }

        (S::Idle, E::StopRequested) => {
            session.state = S::Abandoned;
            vec![]
        }

        (S::Capturing | S::Validating | S::RetryPending, E::StopRequested) => {
            session.state = S::Abandoned;
            vec![Effect::ReleaseDevice]
        }

        (state, event) => {
            tracing::debug!(?state, event = ?event, "Event ignored in current state");
            vec![]
        }
    }
}
