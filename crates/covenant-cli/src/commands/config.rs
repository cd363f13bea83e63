//! Configuration commands

use std::io::Write;
use std::path::PathBuf;

use clap::Subcommand;
use covenant_engine::GovernanceConfig;
use tracing::debug;

use crate::error::CliResult;
use crate::output::{self, OutputFormat};

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (defaults when no file is given)
    Show {
        /// Configuration file path
        #[arg(short, long, env = "COVENANT_CONFIG")]
        path: Option<PathBuf>,
    },

    /// Load and validate a configuration file
    Validate {
        /// Configuration file path
        path: PathBuf,
    },
}

pub fn execute(command: ConfigCommands, format: OutputFormat, out: &mut dyn Write) -> CliResult<()> {
    match command {
        ConfigCommands::Show { path } => {
            let config = match path {
                Some(path) => {
                    debug!(path = %path.display(), "Loading configuration");
                    GovernanceConfig::load(&path)?
                }
                None => GovernanceConfig::default(),
            };
            match format {
                OutputFormat::Text => write!(out, "{}", config.to_toml_string()?)?,
                OutputFormat::Json => output::print_json(out, &config)?,
            }
            Ok(())
        }
        ConfigCommands::Validate { path } => {
            GovernanceConfig::load(&path)?;
            output::print_success(out, &format!("{} is valid", path.display()))
        }
    }
}
