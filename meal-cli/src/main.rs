//! `meal` binary
//!
//! Advisor settings fall back to `MEAL_AI_*` variables, which may also come
//! from a `.env` file in the working directory.
//!
//! Usage:
//!   meal score --input issues.json             - Rank schools by urgency
//!   meal score --input issues.json --no-ai     - Rule-based scores only

use clap::Parser;
use meal_cli::{handler, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates traced under `--verbose` when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "meal_cli=info,meal_scoring=info,meal_escrow=info,meal_store=warn";

#[tokio::main]
async fn main() {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if cli.verbose {
        init_tracing();
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("meal: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_library_crates() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        for target in ["meal_cli", "meal_scoring", "meal_escrow", "meal_store"] {
            assert!(DEFAULT_FILTER.contains(target));
        }
    }
}
