//! Flag-aware configuration: profile selection, CLI overrides, and the
//! interactive password prompt layered over `uvcdl_config`.

use std::io::IsTerminal;
use std::path::PathBuf;

use secrecy::SecretString;

use uvcdl_config::{Config, ConfigError, Profile};
use uvcdl_core::{ControllerConfig, Credentials, DownloadConfig, RetryPolicy};

use crate::cli::{DownloadArgs, GlobalOpts};
use crate::error::{self, CliError};

/// Username used when neither flags nor the profile name one.
pub const DEFAULT_USERNAME: &str = "administrator";

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The named profile with CLI flags applied on top.
pub fn effective_profile(
    global: &GlobalOpts,
    config: &Config,
    profile_name: &str,
) -> Result<Profile, CliError> {
    let mut profile = config.profile(profile_name).map_err(|e| match e {
        ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
            name: profile,
            available: error::join_or_none(&config.profiles.keys().cloned().collect::<Vec<_>>()),
        },
        other => other.into(),
    })?;

    if let Some(ref host) = global.host {
        profile.host = Some(host.clone());
    }
    if let Some(port) = global.port {
        profile.port = Some(port);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    Ok(profile)
}

/// Build a `ControllerConfig` from the config file, profile, and CLI
/// overrides, prompting for a password when none is configured and stdin
/// is a terminal.
pub fn controller_config(
    global: &GlobalOpts,
    config: &Config,
) -> Result<(String, ControllerConfig), CliError> {
    let profile_name = active_profile_name(global, config);
    let profile = effective_profile(global, config, &profile_name)?;

    let host = profile.host.clone().ok_or_else(|| CliError::NoHost {
        profile: profile_name.clone(),
        path: uvcdl_config::config_path().display().to_string(),
    })?;
    let username = profile
        .username
        .clone()
        .unwrap_or_else(|| DEFAULT_USERNAME.into());

    let password = resolve_password(global, &profile, &profile_name, &username, &host)?;
    let credentials = Credentials { username, password };

    let controller = uvcdl_config::profile_to_controller_config(
        &profile,
        &profile_name,
        &config.defaults,
        credentials,
    )?;
    tracing::debug!(profile = %profile_name, url = %controller.url, "controller config resolved");
    Ok((profile_name, controller))
}

/// Password chain: `--password`/`UVCDL_PASSWORD` → profile chain
/// (`password_env`, keyring, plaintext) → interactive prompt.
fn resolve_password(
    global: &GlobalOpts,
    profile: &Profile,
    profile_name: &str,
    username: &str,
    host: &str,
) -> Result<SecretString, CliError> {
    if let Some(ref password) = global.password {
        return Ok(SecretString::from(password.clone()));
    }

    match uvcdl_config::resolve_password(profile, profile_name) {
        Ok(password) => Ok(password),
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            let password = rpassword::prompt_password(format!("Password for {username}@{host}: "))?;
            if password.is_empty() {
                return Err(CliError::NoCredentials {
                    profile: profile_name.into(),
                });
            }
            Ok(SecretString::from(password))
        }
        Err(e) => Err(e.into()),
    }
}

/// Download tuning from flags, falling back to `[defaults]`.
pub fn download_config(args: &DownloadArgs, config: &Config) -> DownloadConfig {
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| config.defaults.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let max_connections = args
        .max_connections
        .map_or(config.defaults.max_connections, usize::from)
        .max(1);

    DownloadConfig {
        output_dir,
        max_connections,
        retry: RetryPolicy {
            max_attempts: args.attempts,
            ..RetryPolicy::default()
        },
        ..DownloadConfig::default()
    }
}
