//! Veridose — medication-label verification engine.
//!
//! Given noisy OCR text from a photograph of a pill-pouch or bottle label,
//! decide whether the label matches an expected patient/medication/time
//! tuple, with tolerance for OCR error, formatting variance, and timing
//! drift.
//!
//! The flow: a [`session::CaptureController`] pulls a frame from the
//! acquisition device, the recognition capability ([`ocr::OcrEngine`])
//! returns text plus confidence, [`pipeline::extract`] pulls structured
//! fields out of it, and [`pipeline::validate`] scores each field against
//! the expected values. The controller then finalizes success, schedules
//! another attempt, or falls back to manual confirmation after two
//! independent three-strike counters are exhausted.
//!
//! The camera, the OCR engine, and the record store are external
//! collaborators behind traits; everything in `pipeline` is pure and
//! shared safely across sessions.

pub mod config;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod schedule;
pub mod session;

pub use models::{ExpectedLabel, ExtractedLabel, LabelField, Timeliness, ValidationVerdict};
pub use ocr::{OcrEngine, OcrReading};
pub use session::{CaptureController, CaptureMode, CaptureState, SessionRegistry};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding the engine. `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} v{} tracing initialized", config::APP_NAME, config::APP_VERSION);
}
