//! Error types for CrewLink client operations.

use std::io;
use thiserror::Error;

/// Result type for CrewLink client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during CrewLink client operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Check if the operation may succeed when simply attempted again.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::Timeout | ClientError::Io(_)
        )
    }

    /// Check if this error means the session was invalidated and the
    /// user must authenticate again.
    #[inline]
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired(_))
    }
}
