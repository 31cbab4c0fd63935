//! Error types for the Volume Attach Proxy
//!
//! Provides a single error type covering request validation, host device
//! discovery, mount handling, and the downstream/offload proxy clients.
//! Every error maps onto an [`ErrorCode`] which is what callers of the
//! protocol boundary observe.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Status code surfaced to callers of the protocol boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    Internal,
    Unavailable,
    DeadlineExceeded,
    Cancelled,
    Unimplemented,
    Unknown,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Unimplemented => "UNIMPLEMENTED",
            ErrorCode::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Unified error type for the proxy
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unimplemented(String),

    #[error("{0}")]
    Unavailable(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("{0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Host Device Errors
    // =========================================================================
    #[error("failed to get devpath for volume {uuid}: no namespace appeared within {waited:?}")]
    DevicePathNotFound { uuid: String, waited: Duration },

    #[error("mount of {source_path} at {target} failed after {attempts} attempts: {reason}")]
    MountFailed {
        source_path: String,
        target: String,
        attempts: u32,
        reason: String,
    },

    #[error("unmount of {target} failed: {reason}")]
    UnmountFailed { target: String, reason: String },

    // =========================================================================
    // Downstream / Offload Errors
    // =========================================================================
    /// Error reported by the backend or offload processor, surfaced as received
    #[error("{message}")]
    Downstream {
        service: String,
        code: ErrorCode,
        message: String,
    },

    #[error("{operation} exceeded its deadline of {timeout:?}")]
    DeadlineExceeded { operation: String, timeout: Duration },

    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Status code observed by callers for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::Unimplemented(_) => ErrorCode::Unimplemented,
            Error::Unavailable(_) | Error::Http(_) => ErrorCode::Unavailable,
            Error::Downstream { code, .. } => *code,
            Error::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            Error::Cancelled { .. } => ErrorCode::Cancelled,

            Error::Internal(_)
            | Error::Configuration(_)
            | Error::DevicePathNotFound { .. }
            | Error::MountFailed { .. }
            | Error::UnmountFailed { .. }
            | Error::JsonParse(_)
            | Error::YamlParse(_)
            | Error::Io(_) => ErrorCode::Internal,
        }
    }

    /// Check if re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Internal | ErrorCode::Unavailable | ErrorCode::DeadlineExceeded
        )
    }

    /// Shorthand for an internal error built from any displayable cause
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Error::Internal(e.to_string())
    }
}

/// Result type alias for the proxy
pub type Result<T> = std::result::Result<T, Error>;

/// Wire form of an error, shared by the REST server and the proxy clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
