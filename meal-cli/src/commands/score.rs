//! Score Command
//!
//! Advisor settings come from the same `MEAL_AI_*` variables the library
//! reads; flags override them.

use clap::Args;
use meal_scoring::{AdvisorConfig, ScoringConfig};
use std::path::PathBuf;

/// Arguments of `meal score`
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// JSON export of `{ school_id, issues[] }` records
    #[arg(short, long)]
    pub input: PathBuf,

    /// Use the rule-based formula only, never call the advisor
    #[arg(long)]
    pub no_ai: bool,

    /// Advisor endpoint base URL (env: MEAL_AI_URL)
    #[arg(long, env = "MEAL_AI_URL", default_value = "https://api.openai.com/v1")]
    pub ai_url: String,

    /// Advisor bearer token (env: MEAL_AI_API_KEY)
    #[arg(long, env = "MEAL_AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,

    /// Advisor model (env: MEAL_AI_MODEL)
    #[arg(long, env = "MEAL_AI_MODEL", default_value = "gpt-4o-mini")]
    pub ai_model: String,

    /// Advisor deadline per school in seconds (env: MEAL_AI_TIMEOUT)
    #[arg(long, env = "MEAL_AI_TIMEOUT", default_value = "8")]
    pub ai_timeout: u64,

    /// Schools scored concurrently per group
    #[arg(long, default_value = "20")]
    pub group_size: usize,
}

impl ScoreArgs {
    pub fn advisor_config(&self) -> AdvisorConfig {
        AdvisorConfig {
            base_url: self.ai_url.clone(),
            api_key: self.ai_api_key.clone(),
            model: self.ai_model.clone(),
            timeout_secs: self.ai_timeout,
            ..AdvisorConfig::default()
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            group_size: self.group_size,
            advisor_timeout_ms: self.ai_timeout.saturating_mul(1_000),
            ..ScoringConfig::default()
        }
    }
}
