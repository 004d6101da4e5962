use thiserror::Error;

use crate::api::ApiError;

/// Failures of the token persistence layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Token store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store contents could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Token store lock poisoned")]
    Poisoned,

    #[error("Invalid token record: {0}")]
    InvalidRecord(String),
}

/// Everything `ensure_logged_in` can fail with.
///
/// Auth errors mean the session is known-bad; `SessionCheck` means its
/// status is unknown.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The login exchange completed but the response carried no usable token.
    #[error("Authentication protocol error: {0}")]
    AuthProtocol(String),

    /// The login request itself failed (transport, timeout, non-2xx).
    #[error("Authentication request failed")]
    AuthRequest(#[source] ApiError),

    /// The identity probe failed with something other than a clean 401.
    #[error("User check failed")]
    SessionCheck(#[source] ApiError),

    #[error("Token storage unavailable")]
    Storage(#[from] StorageError),
}
