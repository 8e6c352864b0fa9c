//! Per-session keyed state.
//!
//! One registry per deployment; sessions are keyed by id and share nothing
//! but the (stateless) controller. Stop is cooperative: the cancel flag is
//! set and the state machine is advanced immediately so status reflects
//! the abandonment without waiting for the driver to wake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{ExpectedLabel, ValidationVerdict};

use super::controller::{CaptureController, DeviceError};
use super::record;
use super::state::{
    transition, CaptureEvent, CaptureMode, CaptureSession, CaptureState, Effect, FallbackReason,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Read-only snapshot of a session, safe to hand to callers.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub id: Uuid,
    pub mode: CaptureMode,
    pub state: CaptureState,
    pub validation_failures: u8,
    pub no_label_strikes: u8,
    pub started_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub fallback_reason: Option<FallbackReason>,
    pub last_verdict: Option<ValidationVerdict>,
}

impl From<&CaptureSession> for CaptureStatus {
    fn from(session: &CaptureSession) -> Self {
        Self {
            id: session.id,
            mode: session.mode,
            state: session.state,
            validation_failures: session.validation_failures,
            no_label_strikes: session.no_label_strikes,
            started_at: session.started_at,
            last_attempt_at: session.last_attempt_at,
            fallback_reason: session.fallback_reason,
            last_verdict: session.last_verdict.clone(),
        }
    }
}

struct SessionHandle {
    session: Arc<Mutex<CaptureSession>>,
    cancel: Arc<AtomicBool>,
    task: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

/// Keyed registry of live and recently-finished sessions.
pub struct SessionRegistry {
    controller: Arc<CaptureController>,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(controller: Arc<CaptureController>) -> Self {
        Self {
            controller,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session and spawn its driver task.
    ///
    /// The device is opened here, before the session exists: a
    /// `DeviceUnavailable` failure surfaces immediately and no session is
    /// registered (the user gets an actionable message, nothing to retry).
    pub async fn start(
        &self,
        mode: CaptureMode,
        expected: ExpectedLabel,
        medication_id: Uuid,
        patient_id: Uuid,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid, SessionError> {
        let stream = self.controller.open_device()?;

        let session = CaptureSession::new(mode, expected, medication_id, patient_id, scheduled_at);
        let id = session.id;
        tracing::info!(session_id = %id, ?mode, "Capture session starting");

        let shared = Arc::new(Mutex::new(session));
        let cancel = Arc::new(AtomicBool::new(false));
        let controller = Arc::clone(&self.controller);
        let task = {
            let shared = Arc::clone(&shared);
            let cancel = Arc::clone(&cancel);
            tokio::spawn(async move {
                controller.run(stream, shared, cancel).await;
            })
        };

        self.sessions.write().await.insert(
            id,
            SessionHandle {
                session: shared,
                cancel,
                task: Arc::new(Mutex::new(Some(task))),
            },
        );
        Ok(id)
    }

    /// Current snapshot of a session.
    pub async fn status(&self, id: Uuid) -> Result<CaptureStatus, SessionError> {
        let session = self.session_arc(id).await?;
        let guard = session.lock().await;
        Ok(CaptureStatus::from(&*guard))
    }

    /// User-initiated stop: cancel the driver and abandon the session. No
    /// success record is emitted and no further captures occur.
    pub async fn stop(&self, id: Uuid) -> Result<CaptureStatus, SessionError> {
        let (session, cancel) = {
            let sessions = self.sessions.read().await;
            let handle = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
            (Arc::clone(&handle.session), Arc::clone(&handle.cancel))
        };

        cancel.store(true, Ordering::Relaxed);
        let mut guard = session.lock().await;
        // Device release is the driver's job (it owns the stream); stop
        // produces no other effects worth executing here.
        let _ = transition(&mut guard, CaptureEvent::StopRequested);
        tracing::info!(session_id = %id, "Capture session stopped by user");
        Ok(CaptureStatus::from(&*guard))
    }

    /// Resolve the manual-confirmation fallback. Affirming emits the
    /// success record (flagged as self-reported); declining abandons.
    pub async fn resolve_manual(
        &self,
        id: Uuid,
        affirmed: bool,
    ) -> Result<CaptureStatus, SessionError> {
        let session = self.session_arc(id).await?;
        let mut guard = session.lock().await;

        let event = if affirmed {
            CaptureEvent::ManualAffirmed
        } else {
            CaptureEvent::ManualDeclined
        };
        let effects = transition(&mut guard, event);
        for effect in effects {
            if let Effect::EmitSuccessRecord { via_manual } = effect {
                record::emit_success_record(self.controller.sink(), &guard, via_manual);
            }
        }
        Ok(CaptureStatus::from(&*guard))
    }

    /// Wait for the driver task to finish, then return the final snapshot.
    pub async fn wait(&self, id: Uuid) -> Result<CaptureStatus, SessionError> {
        let (session, task) = {
            let sessions = self.sessions.read().await;
            let handle = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
            (Arc::clone(&handle.session), Arc::clone(&handle.task))
        };

        if let Some(join) = task.lock().await.take() {
            if let Err(e) = join.await {
                tracing::error!(session_id = %id, error = %e, "Capture driver task failed");
            }
        }
        let guard = session.lock().await;
        Ok(CaptureStatus::from(&*guard))
    }

    /// Drop a finished session from the registry.
    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(handle) => {
                handle.cancel.store(true, Ordering::Relaxed);
                Ok(())
            }
            None => Err(SessionError::NotFound(id)),
        }
    }

    async fn session_arc(&self, id: Uuid) -> Result<Arc<Mutex<CaptureSession>>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(|h| Arc::clone(&h.session))
            .ok_or(SessionError::NotFound(id))
    }
}
