//! Scoring Configuration
//!
//! Supports loading from environment variables with the `MEAL_` prefix.

use serde::{Deserialize, Serialize};
use std::env;

/// AI advisor HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Chat-completions endpoint base URL
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Model name sent with each request
    pub model: String,
    /// Upper bound on completion tokens per request
    pub max_tokens: u32,
    /// Transport timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 300,
            timeout_secs: 8,
        }
    }
}

impl AdvisorConfig {
    /// Local OpenAI-compatible server, no key
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MEAL_AI_URL: Endpoint base URL
    /// - MEAL_AI_API_KEY: Bearer token
    /// - MEAL_AI_MODEL: Model name
    /// - MEAL_AI_TIMEOUT: Transport timeout in seconds
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("MEAL_AI_URL").unwrap_or(defaults.base_url),
            api_key: env::var("MEAL_AI_API_KEY").ok(),
            model: env::var("MEAL_AI_MODEL").unwrap_or(defaults.model),
            max_tokens: defaults.max_tokens,
            timeout_secs: env::var("MEAL_AI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Urgency scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Schools scored concurrently per group
    pub group_size: usize,
    /// Log progress every N completed schools
    pub progress_interval: usize,
    /// Issues created within this many days count as recent
    pub recent_window_days: i64,
    /// High/critical issues quoted in the advisor prompt
    pub max_prompt_issues: usize,
    /// Completion tokens requested from the advisor
    pub advisor_max_tokens: u32,
    /// Hard deadline on each advisor call, in milliseconds
    pub advisor_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            group_size: 20,
            progress_interval: 50,
            recent_window_days: 30,
            max_prompt_issues: 5,
            advisor_max_tokens: 300,
            advisor_timeout_ms: 8_000,
        }
    }
}

impl ScoringConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MEAL_AI_TIMEOUT: Advisor deadline in seconds
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            advisor_timeout_ms: env::var("MEAL_AI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1_000)
                .unwrap_or(defaults.advisor_timeout_ms),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let scoring = ScoringConfig::default();
        assert_eq!(scoring.group_size, 20);
        assert_eq!(scoring.progress_interval, 50);
        assert_eq!(scoring.recent_window_days, 30);
        assert_eq!(scoring.max_prompt_issues, 5);

        let advisor = AdvisorConfig::default();
        assert_eq!(advisor.max_tokens, 300);
        assert!(advisor.api_key.is_none());
    }

    #[test]
    fn test_local_preset() {
        let config = AdvisorConfig::local("http://localhost:11434/v1", "llama3");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout_secs, 8);
    }
}
