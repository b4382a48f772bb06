//! Shared error type across metrix crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Recognized request shape, unrecognized metric type.
    NotImplemented,
    /// Lookup miss.
    NotFound,
    /// Rejected by the trusted subnet guard.
    Forbidden,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::NotImplemented => "NOT_IMPLEMENTED",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::Forbidden => "FORBIDDEN",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetrixError>;

/// Unified error type used by core, server and agent.
#[derive(Debug, Error)]
pub enum MetrixError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),
    #[error("missing value for metric {0}")]
    MissingValue(String),
    #[error("invalid signature for metric {0}")]
    InvalidSignature(String),
    #[error("signing key is not initialized")]
    KeyNotInitialized,
    #[error("digest failed: {0}")]
    Digest(String),
    #[error("cannot parse {kind} value {raw:?}")]
    Parse { kind: String, raw: String },
    #[error("metric {name} is a {actual}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("metric not found: {kind}/{name}")]
    NotFound { kind: String, name: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("server url is empty")]
    EmptyUrl,
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("transport: {0}")]
    Transport(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetrixError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MetrixError::BadRequest(_)
            | MetrixError::MissingValue(_)
            | MetrixError::InvalidSignature(_)
            | MetrixError::Parse { .. }
            | MetrixError::KindMismatch { .. } => ClientCode::BadRequest,
            MetrixError::UnknownMetricType(_) => ClientCode::NotImplemented,
            MetrixError::NotFound { .. } => ClientCode::NotFound,
            MetrixError::Forbidden(_) => ClientCode::Forbidden,
            MetrixError::KeyNotInitialized
            | MetrixError::Digest(_)
            | MetrixError::EmptyUrl
            | MetrixError::UnexpectedStatus { .. }
            | MetrixError::Transport(_)
            | MetrixError::Storage(_)
            | MetrixError::Internal(_) => ClientCode::Internal,
        }
    }
}
