//! Clap derive structures for the `uvcdl` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this file may
//! only depend on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uvcdl -- download recorded video from a UniFi Video controller
#[derive(Debug, Parser)]
#[command(
    name = "uvcdl",
    version,
    about = "Download recorded video from a UniFi Video controller",
    long_about = "Logs in to a UniFi Video (NVR) controller, finds the recordings of one camera\n\
        that overlap a time range, and downloads them concurrently into a local directory.\n\n\
        Re-running the same command only fetches what is missing.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "UVCDL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller hostname, IP address, or URL (overrides profile)
    #[arg(long, short = 'd', env = "UVCDL_HOST", global = true)]
    pub host: Option<String>,

    /// Controller port [default: 7443]
    #[arg(long, env = "UVCDL_PORT", global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Controller username [default: administrator]
    #[arg(long, short = 'u', env = "UVCDL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Controller password (prompted for when not configured)
    #[arg(long, env = "UVCDL_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "UVCDL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "UVCDL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'f',
        env = "UVCDL_FORMAT",
        default_value = "table",
        global = true
    )]
    pub format: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a camera's recordings for a time range
    #[command(alias = "dl")]
    Download(DownloadArgs),

    /// List cameras known to the controller
    #[command(alias = "cams")]
    Cameras,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Download ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Camera display name (exact, case-sensitive match)
    pub camera: String,

    /// Range start as DD-MM-YYYY:HH:mm:ss in --timezone
    #[arg(long = "start-time", short = 's', value_name = "DD-MM-YYYY:HH:mm:ss")]
    pub start: String,

    /// Range end as DD-MM-YYYY:HH:mm:ss in --timezone
    #[arg(long = "end-time", short = 'e', value_name = "DD-MM-YYYY:HH:mm:ss")]
    pub end: String,

    /// IANA timezone of the start/end times, or a unique suffix (e.g. "Denver")
    /// [default: America/Denver]
    #[arg(long, short = 'z', env = "UVCDL_TIMEZONE")]
    pub timezone: Option<String>,

    /// Directory to save recordings into (per-camera subdirectories)
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum simultaneous downloads [default: 4]
    #[arg(long, short = 'm', value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub max_connections: Option<u16>,

    /// Attempts per recording on network or server errors
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub attempts: u32,

    /// List what would be downloaded without downloading
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,

    /// Show the effective configuration (passwords redacted)
    Show,

    /// List configured profiles
    Profiles,

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
