//! Configuration for the uvcdl CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `uvcdl_core::ControllerConfig` / `DownloadConfig`.
//! The CLI adds flag-aware wrappers and the interactive prompt on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use uvcdl_core::{ControllerConfig, Credentials, DownloadConfig, TlsVerification};

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "uvcdl";

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "UVCDL_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no controller host configured for profile '{profile}'")]
    NoHost { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Simultaneous segment downloads.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// IANA zone (or a unique suffix such as `Denver`) for `--start`/`--end`.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Where segments are written when `--dir` is not given.
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_connections: default_max_connections(),
            timezone: default_timezone(),
            output_dir: None,
            insecure: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_max_connections() -> usize {
    DownloadConfig::DEFAULT_MAX_CONNECTIONS
}
fn default_timezone() -> String {
    "America/Denver".into()
}

/// A named controller profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller host, `host:port`, or full URL.
    pub host: Option<String>,

    /// Controller port when `host` carries none. Default: 7443.
    pub port: Option<u16>,

    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// HTTP(S) proxy URL.
    pub proxy: Option<String>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Assumed session lifetime, e.g. `"30m"`.
    pub session_ttl: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$UVCDL_CONFIG`, else the platform
/// config directory (`~/.config/uvcdl/config.toml` on Linux).
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "uvcdl", "uvcdl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("uvcdl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. Missing files yield the defaults.
///
/// `UVCDL_*` variables override file values; nested keys use `__`
/// (e.g. `UVCDL_DEFAULTS__TIMEOUT=60`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UVCDL_").split("__").only(&[
            "default_profile",
            "defaults.timeout",
            "defaults.max_connections",
            "defaults.timezone",
            "defaults.output_dir",
            "defaults.insecure",
        ]));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is bad.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Profiles ────────────────────────────────────────────────────────

impl Config {
    /// Look up a profile. A missing `default` profile is an empty one, so
    /// everything can come from flags and environment.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => Err(ConfigError::UnknownProfile {
                profile: name.into(),
            }),
        }
    }
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Resolve a password from the credential chain (no CLI flag or prompt
/// step): `password_env` -> system keyring -> plaintext in config.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |profile_name| keyring_entry(profile_name).ok()?.get_password().ok(),
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env -> env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. System keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok(SecretString::from(pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password.expose_secret())?;
    Ok(())
}

// ── Translation to core config ──────────────────────────────────────

/// Build a `ControllerConfig` from a profile and an already-resolved
/// username/password.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    credentials: Credentials,
) -> Result<ControllerConfig, ConfigError> {
    let host = profile.host.as_deref().ok_or_else(|| ConfigError::NoHost {
        profile: profile_name.into(),
    })?;
    let port = profile.port.unwrap_or(ControllerConfig::DEFAULT_PORT);
    let url = ControllerConfig::controller_url(host, port).map_err(|e| ConfigError::Validation {
        field: "host".into(),
        reason: e.to_string(),
    })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        // NVR appliances ship self-signed certificates.
        TlsVerification::DangerAcceptInvalid
    };

    let proxy = profile
        .proxy
        .as_deref()
        .map(|p| {
            p.parse::<url::Url>().map_err(|e| ConfigError::Validation {
                field: "proxy".into(),
                reason: format!("invalid URL '{p}': {e}"),
            })
        })
        .transpose()?;

    let session_ttl = profile
        .session_ttl
        .as_deref()
        .map(|ttl| {
            humantime::parse_duration(ttl).map_err(|e| ConfigError::Validation {
                field: "session_ttl".into(),
                reason: format!("'{ttl}': {e}"),
            })
        })
        .transpose()?;

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(ControllerConfig {
        url,
        credentials,
        tls,
        timeout,
        proxy,
        session_ttl,
    })
}
