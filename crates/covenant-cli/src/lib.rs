//! Covenant CLI - operator tooling for the governance engine
//!
//! Inspects configuration files and persisted engine snapshots:
//! - Print or validate a governance configuration
//! - Verify a snapshot's audit chain, decision trails and evidence packages
//! - List decisions and audit entries

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::config::{self, ConfigCommands};
use commands::snapshot;
pub use error::{CliError, CliResult};
pub use output::OutputFormat;

/// Covenant CLI application
#[derive(Parser, Debug)]
#[command(name = "covenant")]
#[command(about = "Covenant - governance engine operator CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Governance configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Verify a snapshot's audit chain and evidence packages
    Verify {
        /// Snapshot JSON file
        snapshot: PathBuf,
    },

    /// List decisions in a snapshot
    #[command(alias = "ls")]
    Decisions {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Show a single decision with its evidence package
        #[arg(long)]
        id: Option<String>,
    },

    /// Print audit entries from a snapshot
    Audit {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Only entries about this decision
        #[arg(short, long)]
        decision: Option<String>,
    },
}

/// Run using the current process arguments.
pub fn run() -> CliResult<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator, writing to stdout.
pub fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_output(args, &mut out)
}

/// Run using the provided argument iterator, writing command output to `out`.
pub fn run_with_output<I, T>(args: I, out: &mut dyn Write) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Initialize tracing; a second run in the same process keeps the first subscriber.
    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .try_init();

    match cli.command {
        Commands::Config { command } => config::execute(command, cli.output, out),
        Commands::Verify { snapshot } => snapshot::verify(&snapshot, cli.output, out),
        Commands::Decisions { snapshot, id } => {
            snapshot::decisions(&snapshot, id.as_deref(), cli.output, out)
        }
        Commands::Audit { snapshot, decision } => {
            snapshot::audit(&snapshot, decision.as_deref(), cli.output, out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verify_with_global_flags() {
        let cli = Cli::parse_from(["covenant", "verify", "state.json", "-o", "json", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Verify { ref snapshot } if snapshot == &PathBuf::from("state.json")));
    }

    #[test]
    fn parses_decision_filter() {
        let cli = Cli::parse_from(["covenant", "ls", "state.json", "--id", "abc"]);
        match cli.command {
            Commands::Decisions { id, .. } => assert_eq!(id.as_deref(), Some("abc")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_show_path_is_optional() {
        let cli = Cli::parse_from(["covenant", "config", "show"]);
        assert!(matches!(
            cli.command,
            Commands::Config { command: ConfigCommands::Show { path: None } }
        ));
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["covenant"]).is_err());
    }
}
