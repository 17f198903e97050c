//! Command Handlers

use crate::commands::{score::ScoreArgs, Cli, Commands, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::export::IssueExport;
use crate::output;
use meal_scoring::{AiAdvisor, BatchScoreReport, HttpAdvisor, ScoringConfig, UrgencyScoringEngine};
use std::sync::Arc;
use tracing::info;

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Score(args) => handle_score(&args, cli.format).await,
    }
}

/// Handle `meal score`
async fn handle_score(args: &ScoreArgs, format: OutputFormat) -> CliResult<()> {
    let export = Arc::new(IssueExport::load(&args.input).await?);
    if export.school_ids().is_empty() {
        return Err(CliError::invalid_arg(format!(
            "{} contains no school records",
            args.input.display()
        )));
    }

    let advisor: Option<Arc<dyn AiAdvisor>> = if args.no_ai {
        None
    } else {
        let config = args.advisor_config();
        if config.base_url.trim().is_empty() {
            return Err(CliError::config("Advisor URL must not be empty"));
        }
        Some(Arc::new(HttpAdvisor::new(config)?))
    };

    info!(
        schools = export.school_ids().len(),
        issues = export.issue_count(),
        use_ai = !args.no_ai,
        "Scoring issue export"
    );

    let report = score_export(export, advisor, args.scoring_config(), !args.no_ai).await;
    output::print_batch_report(&report, format);
    Ok(())
}

/// Batch-score every school of an export and write priorities back into it
pub async fn score_export(
    export: Arc<IssueExport>,
    advisor: Option<Arc<dyn AiAdvisor>>,
    config: ScoringConfig,
    use_ai: bool,
) -> BatchScoreReport {
    let school_ids = export.school_ids().to_vec();
    let engine = UrgencyScoringEngine::with_store(export, advisor, config);
    engine.batch_score_and_store(&school_ids, use_ai).await
}
