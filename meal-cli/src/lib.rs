//! Meal CLI - Command Line Interface
//!
//! Runs urgency scoring jobs outside the service, over a JSON export of
//! the ledger's issue history.
//!
//! # Usage
//!
//! ```text
//! meal [OPTIONS] <COMMAND>
//!
//! Commands:
//!   score     Score every school in an issue export
//!
//! Options:
//!   -f, --format <FORMAT>  Output format (json, table, plain) [default: table]
//!   -v, --verbose          Enable verbose output
//!   -h, --help             Print help
//!   -V, --version          Print version
//! ```
//!
//! # Examples
//!
//! ## Rule-based scores only
//! ```text
//! meal score --input issues.json --no-ai
//! ```
//!
//! ## Advisor scores against a local model, as JSON
//! ```text
//! MEAL_AI_URL=http://localhost:11434/v1 MEAL_AI_MODEL=llama3 \
//!   meal score --input issues.json --format json
//! ```
//!
//! The export is a JSON array of `{ "school_id": ..., "issues": [...] }`
//! records, each issue in the ledger's own serialized form.

pub mod commands;
pub mod error;
pub mod export;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};
pub use export::{IssueExport, SchoolIssues};
