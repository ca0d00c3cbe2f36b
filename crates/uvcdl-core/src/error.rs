// ── Core error types ──
//
// Run-level errors (`CoreError`) abort the pipeline before the download
// phase; per-segment errors (`TransferError`) are isolated to the segment
// that produced them. The `From<uvcdl_api::Error>` impls translate
// transport-layer errors into the matching class.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Unified run-level error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection / authentication ─────────────────────────────────
    #[error("Cannot connect to controller at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    #[error("Controller request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Camera resolution ────────────────────────────────────────────
    #[error("Camera not found: {name}")]
    CameraNotFound { name: String, available: Vec<String> },

    #[error("Camera name '{name}' is ambiguous ({} cameras share it)", ids.len())]
    AmbiguousCameraName { name: String, ids: Vec<String> },

    // ── Listing ──────────────────────────────────────────────────────
    #[error("Recording query failed: {message}")]
    Query { message: String },

    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    // ── Local filesystem ─────────────────────────────────────────────
    #[error("Output directory {path} is unusable: {reason}")]
    OutputDirectory { path: PathBuf, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Run cancelled")]
    Cancelled,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the controller rejected the session token.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

/// Failure of a single segment transfer attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network failure, timeout, 5xx, or truncated body. Retried.
    #[error("{0}")]
    Transient(String),

    /// 4xx (other than 401) or an undecodable response. Not retried.
    #[error("{message}")]
    Permanent { status: Option<u16>, message: String },

    /// The controller rejected the session token mid-download.
    #[error("session expired")]
    SessionExpired,

    /// Local filesystem failure while writing the segment.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<uvcdl_api::Error> for CoreError {
    fn from(err: uvcdl_api::Error) -> Self {
        match err {
            uvcdl_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            uvcdl_api::Error::SessionExpired => CoreError::SessionExpired,
            uvcdl_api::Error::Transport(ref e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            uvcdl_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            uvcdl_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            uvcdl_api::Error::InvalidProxy { proxy, message } => CoreError::Config {
                message: format!("invalid proxy {proxy}: {message}"),
            },
            uvcdl_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            uvcdl_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            uvcdl_api::Error::UnexpectedResponse(message) => CoreError::Query { message },
            uvcdl_api::Error::Deserialization { message, body: _ } => CoreError::Query {
                message: format!("malformed controller response: {message}"),
            },
        }
    }
}

impl From<uvcdl_api::Error> for TransferError {
    fn from(err: uvcdl_api::Error) -> Self {
        if err.is_auth_expired() {
            return TransferError::SessionExpired;
        }
        if err.is_transient() {
            return TransferError::Transient(err.to_string());
        }
        TransferError::Permanent {
            status: err.status(),
            message: err.to_string(),
        }
    }
}
