//! Async capture driver.
//!
//! Owns the acquisition/recognition/validation loop for one session and
//! executes the effects the pure state machine emits. The device stream is
//! held for the session lifetime and dropped on every exit path, including
//! recognition panics: scoped acquisition with guaranteed release.
//!
//! All per-attempt failures are absorbed here: recognition errors and
//! timeouts count as "no text produced" and feed the no-label counter.
//! Only device-open failure (surfaced before the session leaves `Idle`)
//! and the manual-confirmation fallback are user-visible.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::config::CaptureTiming;
use crate::ocr::{Frame, OcrEngine, OcrReading};
use crate::pipeline;

use super::record::{self, RecordSink};
use super::state::{transition, CaptureEvent, CaptureMode, CaptureSession, Effect};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    #[error("frame acquisition failed: {0}")]
    Frame(String),
}

/// The image-acquisition device. `open` grants exclusive access for one
/// session; dropping the returned stream releases the device.
pub trait FrameSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameStream>, DeviceError>;
}

/// An open, exclusively-held device stream.
pub trait FrameStream: Send {
    fn next_frame(&mut self) -> Result<Frame, DeviceError>;
}

/// Drives capture sessions. Stateless apart from configuration: one
/// controller is shared by all sessions; only [`CaptureSession`] values are
/// per-session.
pub struct CaptureController {
    source: Arc<dyn FrameSource>,
    engine: Arc<dyn OcrEngine>,
    sink: Arc<dyn RecordSink>,
    timing: CaptureTiming,
}

impl CaptureController {
    pub fn new(
        source: Arc<dyn FrameSource>,
        engine: Arc<dyn OcrEngine>,
        sink: Arc<dyn RecordSink>,
        timing: CaptureTiming,
    ) -> Self {
        Self {
            source,
            engine,
            sink,
            timing,
        }
    }

    pub(crate) fn open_device(&self) -> Result<Box<dyn FrameStream>, DeviceError> {
        self.source.open()
    }

    pub(crate) fn sink(&self) -> &dyn RecordSink {
        self.sink.as_ref()
    }

    /// Run one session to the end of its automated loop (`Success`,
    /// `ManualConfirmation`, or `Abandoned`). The stream must come from
    /// [`open_device`](Self::open_device); opening before the session is
    /// armed keeps a device failure from ever leaving `Idle`.
    pub async fn run(
        &self,
        stream: Box<dyn FrameStream>,
        session: Arc<Mutex<CaptureSession>>,
        cancel: Arc<AtomicBool>,
    ) {
        let mode = session.lock().await.mode;
        let mut stream = Some(stream);
        let mut prev_frame: Option<Frame> = None;
        let mut pending = VecDeque::from([CaptureEvent::StartRequested]);

        while let Some(event) = pending.pop_front() {
            if matches!(event, CaptureEvent::FrameRecognized(_)) {
                session.lock().await.last_attempt_at = Some(Utc::now());
            }

            let effects = {
                let mut guard = session.lock().await;
                transition(&mut guard, event)
            };

            for effect in effects {
                match effect {
                    Effect::AcquireDevice => {
                        // Stream already opened before arming; held until a
                        // ReleaseDevice effect or the end of this function.
                    }
                    Effect::ReleaseDevice => {
                        stream = None;
                        prev_frame = None;
                    }
                    Effect::BeginCapture => {
                        if cancel.load(Ordering::Relaxed) {
                            pending.push_back(CaptureEvent::StopRequested);
                            continue;
                        }
                        let event = match stream.as_deref_mut() {
                            Some(s) => {
                                self.capture_attempt(s, mode, &mut prev_frame, &cancel).await
                            }
                            None => CaptureEvent::StopRequested,
                        };
                        pending.push_back(event);
                    }
                    Effect::RunValidation(reading) => {
                        let expected = session.lock().await.expected.clone();
                        let extracted = pipeline::extract(&reading);
                        let verdict = pipeline::validate(&extracted, &expected);
                        pending.push_back(CaptureEvent::Validated(verdict));
                    }
                    Effect::ScheduleRetry => {
                        sleep(self.timing.retry_delay).await;
                        let event = if cancel.load(Ordering::Relaxed) {
                            CaptureEvent::StopRequested
                        } else {
                            CaptureEvent::RetryDelayElapsed
                        };
                        pending.push_back(event);
                    }
                    Effect::EmitSuccessRecord { via_manual } => {
                        let guard = session.lock().await;
                        record::emit_success_record(self.sink.as_ref(), &guard, via_manual);
                    }
                    Effect::EnterManualFallback(reason) => {
                        tracing::info!(
                            ?reason,
                            "Automated verification exhausted; awaiting manual confirmation"
                        );
                    }
                }
            }
        }
        // Any still-held stream drops here: device released on every path.
    }

    /// One capture attempt. Continuous mode keeps trying inside the
    /// no-label window with throttled, duplicate-suppressed frames;
    /// single-shot mode takes exactly one frame.
    async fn capture_attempt(
        &self,
        stream: &mut dyn FrameStream,
        mode: CaptureMode,
        prev_frame: &mut Option<Frame>,
        cancel: &AtomicBool,
    ) -> CaptureEvent {
        match mode {
            CaptureMode::SingleShot => {
                let frame = match stream.next_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "Frame acquisition failed");
                        return CaptureEvent::NoLabelTimeout;
                    }
                };
                match self.recognize(&frame).await {
                    Some(reading) if reading.has_text() => {
                        *prev_frame = Some(frame);
                        CaptureEvent::FrameRecognized(reading)
                    }
                    _ => CaptureEvent::NoLabelTimeout,
                }
            }
            CaptureMode::Continuous => {
                let deadline = Instant::now() + self.timing.no_label_window;
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        return CaptureEvent::StopRequested;
                    }

                    match stream.next_frame() {
                        Ok(frame) => {
                            let duplicate = prev_frame
                                .as_ref()
                                .is_some_and(|p| frame.is_duplicate_of(p));
                            if duplicate {
                                tracing::trace!("Unchanged scene; skipping recognition");
                            } else {
                                let reading = self.recognize(&frame).await;
                                *prev_frame = Some(frame);
                                if let Some(reading) = reading {
                                    if reading.has_text() {
                                        return CaptureEvent::FrameRecognized(reading);
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Frame acquisition failed; retrying within window");
                        }
                    }

                    if Instant::now() >= deadline {
                        return CaptureEvent::NoLabelTimeout;
                    }
                    sleep(self.timing.capture_throttle).await;
                }
            }
        }
    }

    /// Invoke the recognition engine off the async runtime with a hard cap.
    /// On timeout the blocked thread finishes in the background; the
    /// session moves on without it.
    async fn recognize(&self, frame: &Frame) -> Option<OcrReading> {
        let engine = Arc::clone(&self.engine);
        let bytes = frame.bytes().to_vec();
        let call = tokio::task::spawn_blocking(move || engine.recognize(&bytes));

        match tokio::time::timeout(self.timing.recognition_cap, call).await {
            Ok(Ok(Ok(reading))) => Some(reading),
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, "Recognition failed; treated as no text");
                None
            }
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "Recognition task aborted");
                None
            }
            Err(_) => {
                tracing::warn!(
                    cap_ms = self.timing.recognition_cap.as_millis() as u64,
                    "Recognition call exceeded cap; counted as no text"
                );
                None
            }
        }
    }
}
