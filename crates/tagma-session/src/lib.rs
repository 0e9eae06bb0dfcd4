//! Runtime wiring for tagma detection sessions.
//!
//! Captured frames enter through the [`CaptureRouter`], which feeds hand
//! pose inference on every frame and the spatial ensemble on every nth one.
//! Merged ensemble sets and the newest hand outcome meet in the
//! [`DetectionSession`], which owns the temporal compiler and forwards
//! published results to the client.

pub mod config;
pub mod error;
pub mod logging;
pub mod replay;
pub mod router;
pub mod session;

pub use config::{LogFormat, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use logging::{init_metrics, init_tracing};
pub use replay::{replay, ReplayFrame, ReplayOutput};
pub use router::{CaptureDecision, CaptureRouter};
pub use session::{track_latest_hands, DetectionSession, SessionChannels, SessionCommand};
