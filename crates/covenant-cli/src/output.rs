//! Output formatting utilities

use std::io::Write;

use serde::Serialize;

use crate::error::CliResult;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text lines
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Print a single value as pretty JSON.
pub fn print_json<T: Serialize>(out: &mut dyn Write, data: &T) -> CliResult<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(data)?)?;
    Ok(())
}

pub fn print_success(out: &mut dyn Write, message: &str) -> CliResult<()> {
    writeln!(out, "✓ {message}")?;
    Ok(())
}

pub fn print_failure(out: &mut dyn Write, message: &str) -> CliResult<()> {
    writeln!(out, "✗ {message}")?;
    Ok(())
}
