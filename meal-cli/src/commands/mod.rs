//! CLI Commands Module

pub mod score;

use clap::{Parser, Subcommand};

/// Meal program command line
#[derive(Parser, Debug)]
#[command(name = "meal")]
#[command(version)]
#[command(about = "School meal program command line tools")]
#[command(long_about = "Command line tools for the school meal program core.\n\n\
    Use this tool to run urgency scoring over an exported issue history.")]
pub struct Cli {
    /// Output format (json, table, plain)
    #[arg(short, long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
    /// Plain text
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score every school in an issue export
    Score(score::ScoreArgs),
}
