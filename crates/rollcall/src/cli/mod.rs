//! Command-line interface for rollcall.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    resolve_token, ConfigCommand, ExtractCommand, QueueCommand, RunCommand, ScanCommand,
    StatusCommand,
};

use crate::logging::Verbosity;

/// rollcall - Record event attendance, online or not
///
/// Submits scanned participant codes to the attendance ledger. Scans made
/// without connectivity are kept in a local queue and synced later.
#[derive(Debug, Parser)]
#[command(name = "rollcall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit one scan
    Scan(ScanCommand),

    /// Print the participant id a payload resolves to
    Extract(ExtractCommand),

    /// Inspect and manage the offline queue
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Sync all pending scans now
    Sync,

    /// Scan continuously from stdin, syncing in the background
    Run(RunCommand),

    /// Show connectivity and queue status
    Status(StatusCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "rollcall");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["rollcall", "sync"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["rollcall", "-v", "sync"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["rollcall", "-vv", "sync"]).verbosity(), Verbosity::Trace);
        assert_eq!(parse(&["rollcall", "-q", "sync"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_scan() {
        let cli = parse(&["rollcall", "scan", "https://x/exec?id=5", "-t", "abc", "--offline"]);
        let Command::Scan(cmd) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(cmd.input, "https://x/exec?id=5");
        assert_eq!(cmd.token.as_deref(), Some("abc"));
        assert!(cmd.offline);
        assert!(!cmd.json);
    }

    #[test]
    fn test_parse_queue_commands() {
        assert!(matches!(
            parse(&["rollcall", "queue", "list", "--json"]).command,
            Command::Queue(QueueCommand::List { json: true })
        ));
        assert!(matches!(
            parse(&["rollcall", "queue", "retry", "7"]).command,
            Command::Queue(QueueCommand::Retry { id: 7 })
        ));
        assert!(matches!(
            parse(&["rollcall", "queue", "clear", "--yes"]).command,
            Command::Queue(QueueCommand::Clear { yes: true })
        ));
        assert!(Cli::try_parse_from(["rollcall", "queue", "remove", "seven"]).is_err());
    }

    #[test]
    fn test_parse_run_and_sync() {
        assert!(matches!(parse(&["rollcall", "sync"]).command, Command::Sync));
        let Command::Run(cmd) = parse(&["rollcall", "run"]).command else {
            panic!("expected run command");
        };
        assert_eq!(cmd.token, None);
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["rollcall", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(cli.command, Command::Status(StatusCommand { json: false })));
    }

    #[test]
    fn test_parse_extract() {
        let Command::Extract(cmd) = parse(&["rollcall", "extract", "P-1"]).command else {
            panic!("expected extract command");
        };
        assert_eq!(cmd.input, "P-1");
    }
}
