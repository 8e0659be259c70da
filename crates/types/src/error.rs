//! Normalized failure type for outbound stage calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classifies why a stage call failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The call did not finish within the per-stage deadline.
    Timeout,
    /// The downstream service could not be reached.
    Connection,
    /// The downstream service answered with a non-2xx status.
    HttpStatus,
    /// The response body could not be decoded into the stage contract.
    MalformedResponse,
    /// The call was abandoned because the orchestrator is shutting down.
    Interrupted,
}

impl RemoteErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::Connection => "connection",
            RemoteErrorKind::HttpStatus => "http_status",
            RemoteErrorKind::MalformedResponse => "malformed_response",
            RemoteErrorKind::Interrupted => "interrupted",
        }
    }
}

/// Failure of a single stage executor call.
///
/// Every transport, protocol, and decoding problem is folded into this one
/// shape so the engine can record it uniformly as `"<stage>: <message>"`.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl AsRef<str>, timeout_ms: u64) -> Self {
        Self::new(
            RemoteErrorKind::Timeout,
            format!("{} timed out after {}ms", operation.as_ref(), timeout_ms),
        )
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Connection, message)
    }

    /// Create an error for a non-success HTTP status.
    pub fn http_status(status_code: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref().trim();
        let message = if body.is_empty() {
            format!("HTTP {status_code}")
        } else {
            format!("HTTP {status_code}: {body}")
        };
        Self::new(RemoteErrorKind::HttpStatus, message)
    }

    /// Create a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::MalformedResponse, message)
    }

    /// Create an interruption error.
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Interrupted, message)
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Timeout | RemoteErrorKind::Connection | RemoteErrorKind::HttpStatus
        )
    }
}
