//! Capture sessions — the stateful half of the crate.
//!
//! `state` is the pure machine, `controller` the async driver executing its
//! effects, `registry` the per-session keyed map, `record` the
//! fire-and-forget success-record boundary. Sessions are independent; the
//! pipeline and controller are stateless and shared.

pub mod controller;
pub mod record;
pub mod registry;
pub mod state;

pub use controller::{CaptureController, DeviceError, FrameSource, FrameStream};
pub use record::{HttpRecordSink, RecordSink, ScanRecord, TracingRecordSink};
pub use registry::{CaptureStatus, SessionError, SessionRegistry};
pub use state::{
    transition, CaptureEvent, CaptureMode, CaptureSession, CaptureState, Effect, FallbackReason,
};
