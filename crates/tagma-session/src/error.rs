//! Session error types.

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Results receiver dropped")]
    ResultsClosed,

    #[error("Replay failed: {0}")]
    ReplayFailed(String),

    #[error("Vision error: {0}")]
    Vision(#[from] tagma_vision::VisionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn replay_failed(msg: impl Into<String>) -> Self {
        Self::ReplayFailed(msg.into())
    }
}
