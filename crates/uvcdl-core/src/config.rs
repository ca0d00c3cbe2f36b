// ── Runtime run configuration ──
//
// These types describe *where* to connect and *how* to download.
// They carry credential data and tuning, but never touch disk.
// The CLI constructs them (via uvcdl-config) and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;
use crate::retry::RetryPolicy;

/// Username/password pair for the controller's login endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). Default for NVR appliances.
    #[default]
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for uvcdl_api::TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Configuration for connecting to a single controller.
///
/// Built by the CLI, passed to [`Pipeline`](crate::Pipeline) -- core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller root URL (e.g., `https://nvr.local:7443`).
    pub url: Url,
    pub credentials: Credentials,
    pub tls: TlsVerification,
    /// Connect/read timeout for individual requests.
    pub timeout: Duration,
    /// Optional HTTP(S) proxy.
    pub proxy: Option<Url>,
    /// Assumed session lifetime. `None` means the controller decides and
    /// expiry is only detected by a rejected request.
    pub session_ttl: Option<Duration>,
}

impl ControllerConfig {
    /// Default HTTPS port of the UniFi Video controller.
    pub const DEFAULT_PORT: u16 = 7443;

    /// Controller root URL from a host (optionally with scheme or port).
    pub fn controller_url(host: &str, port: u16) -> Result<Url, CoreError> {
        uvcdl_api::UvcClient::controller_url(host, port).map_err(|e| CoreError::Config {
            message: format!("invalid controller address '{host}': {e}"),
        })
    }

    /// Build the adapter transport settings for this controller.
    pub fn transport(&self) -> uvcdl_api::TransportConfig {
        uvcdl_api::TransportConfig {
            tls: (&self.tls).into(),
            timeout: self.timeout,
            proxy: self.proxy.clone(),
        }
    }
}

/// Download-phase tuning.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Root directory; segments land in `<output_dir>/<camera_slug>/`.
    pub output_dir: PathBuf,
    /// Maximum simultaneous segment transfers (at least 1).
    pub max_connections: usize,
    pub retry: RetryPolicy,
    /// Recordings requested per listing page (at least 1).
    pub page_size: u64,
    /// Upper bound on listing pages before the listing is abandoned.
    pub max_pages: u64,
}

impl DownloadConfig {
    pub const DEFAULT_MAX_CONNECTIONS: usize = 4;
    pub const DEFAULT_PAGE_SIZE: u64 = 100;
    pub const DEFAULT_MAX_PAGES: u64 = 10_000;

    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            retry: RetryPolicy::default(),
            page_size: Self::DEFAULT_PAGE_SIZE,
            max_pages: Self::DEFAULT_MAX_PAGES,
        }
    }
}
