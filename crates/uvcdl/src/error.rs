//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use uvcdl_config::ConfigError;
use uvcdl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const AMBIGUOUS: i32 = 5;
    pub const PARTIAL: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const QUERY: i32 = 9;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to controller at {url}")]
    #[diagnostic(
        code(uvcdl::connection_failed),
        help(
            "{reason}\n\
             Check the host and port (default 7443), or pass --insecure (-k)\n\
             if the controller uses a self-signed certificate."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(uvcdl::timeout),
        help("Increase the timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(uvcdl::auth_failed),
        help(
            "Verify the username and password for profile '{profile}'.\n\
             Store a password with: uvcdl config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No password available for profile '{profile}'")]
    #[diagnostic(
        code(uvcdl::no_credentials),
        help(
            "Pass --password, set UVCDL_PASSWORD, or run:\n\
             uvcdl config set-password --profile {profile}"
        )
    )]
    NoCredentials { profile: String },

    // ── Camera resolution ────────────────────────────────────────────

    #[error("Camera '{name}' not found")]
    #[diagnostic(
        code(uvcdl::camera_not_found),
        help("Names match exactly (case-sensitive). Available cameras: {available}")
    )]
    CameraNotFound { name: String, available: String },

    #[error("Camera name '{name}' is ambiguous")]
    #[diagnostic(
        code(uvcdl::ambiguous_camera),
        help("Several cameras share this name: {ids}\nRename one of them on the controller.")
    )]
    AmbiguousCamera { name: String, ids: String },

    // ── Listing / download ───────────────────────────────────────────

    #[error("Recording query failed: {message}")]
    #[diagnostic(code(uvcdl::query_failed))]
    Query { message: String },

    #[error("{failed} of {total} recordings failed to download")]
    #[diagnostic(
        code(uvcdl::partial_failure),
        help("Re-run the same command to retry; completed files are skipped.")
    )]
    PartialFailure { failed: usize, total: usize },

    #[error("Cancelled")]
    #[diagnostic(code(uvcdl::cancelled))]
    Cancelled,

    #[error("Output directory {path} is unusable: {reason}")]
    #[diagnostic(code(uvcdl::output_dir))]
    OutputDirectory { path: String, reason: String },

    #[error("API error: {message}")]
    #[diagnostic(code(uvcdl::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(uvcdl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(uvcdl::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller host configured for profile '{profile}'")]
    #[diagnostic(
        code(uvcdl::no_host),
        help(
            "Pass --host (-d), set UVCDL_HOST, or add `host = \"...\"` to\n\
             [profiles.{profile}] in {path}"
        )
    )]
    NoHost { profile: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(uvcdl::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(uvcdl::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::CameraNotFound { .. } => exit_code::NOT_FOUND,
            Self::AmbiguousCamera { .. } => exit_code::AMBIGUOUS,
            Self::Query { .. } => exit_code::QUERY,
            Self::PartialFailure { .. } => exit_code::PARTIAL,
            Self::Cancelled => exit_code::CANCELLED,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoHost { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to authentication failures.
    pub fn for_profile(self, profile_name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: profile_name.into(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => Self::AuthFailed {
                profile: "default".into(),
                message,
            },

            CoreError::SessionExpired => Self::AuthFailed {
                profile: "default".into(),
                message: "session expired and could not be renewed".into(),
            },

            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },

            CoreError::CameraNotFound { name, available } => Self::CameraNotFound {
                name,
                available: join_or_none(&available),
            },

            CoreError::AmbiguousCameraName { name, ids } => Self::AmbiguousCamera {
                name,
                ids: ids.join(", "),
            },

            CoreError::Query { message } => Self::Query { message },

            CoreError::InvalidTimeRange { start, end } => Self::Validation {
                field: "time range".into(),
                reason: format!("start ({start}) is after end ({end})"),
            },

            CoreError::OutputDirectory { path, reason } => Self::OutputDirectory {
                path: path.display().to_string(),
                reason,
            },

            CoreError::Api { message, status } => Self::Api {
                message: match status {
                    Some(status) => format!("HTTP {status}: {message}"),
                    None => message,
                },
            },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Cancelled => Self::Cancelled,

            CoreError::Internal(message) => Self::Api { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::NoHost { profile } => Self::NoHost {
                profile,
                path: uvcdl_config::config_path().display().to_string(),
            },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

pub fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".into()
    } else {
        items.join(", ")
    }
}
