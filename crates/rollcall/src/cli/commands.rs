//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Submit one scan.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// The scanned payload: a URL carrying an id, or a bare identifier
    pub input: String,

    /// Volunteer session token (defaults to `volunteer.vtoken` from config)
    #[arg(short, long)]
    pub token: Option<String>,

    /// Treat the device as offline and queue without calling the remote
    #[arg(long)]
    pub offline: bool,

    /// Output the response as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Print the participant identifier a payload resolves to.
#[derive(Debug, Args)]
pub struct ExtractCommand {
    /// The scanned payload
    pub input: String,
}

/// Offline queue commands.
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List pending scans, oldest first
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print the number of pending scans
    Count,

    /// Discard one pending scan
    Remove {
        /// Queue id of the scan
        id: i64,
    },

    /// Retry one pending scan now
    Retry {
        /// Queue id of the scan
        id: i64,
    },

    /// Discard every pending scan
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Long-running scanning session.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Volunteer session token (defaults to `volunteer.vtoken` from config)
    #[arg(short, long)]
    pub token: Option<String>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Resolve the session token from a flag or the configured default.
///
/// A blank token is treated as missing. Otherwise the token is opaque and
/// returned exactly as given.
#[must_use]
pub fn resolve_token(flag: Option<&str>, configured: Option<&str>) -> Option<String> {
    flag.or(configured)
        .filter(|token| !token.trim().is_empty())
        .map(str::to_string)
}
