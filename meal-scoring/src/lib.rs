//! Meal Scoring - Per-School Urgency Scores
//!
//! Computes a 0-100 urgency score per school from its issue history,
//! consulting an injected AI advisor with a deterministic rule-based
//! fallback, and writes the result back as the school's priority.
//!
//! # Modules
//!
//! - [`engine`] - Scoring engine and batch runner
//! - [`factors`] - Issue history metrics
//! - [`prompt`] - Advisor prompt builder
//! - [`parser`] - Advisor reply parser
//! - [`fallback`] - Rule-based score
//! - [`advisor`] - Advisor contract, HTTP client and mock
//! - [`config`] - Configuration
//! - [`error`] - Error types
//!
//! # Usage Example
//!
//! ```ignore
//! use meal_scoring::{HttpAdvisor, AdvisorConfig, ScoringConfig, UrgencyScoringEngine};
//! use std::sync::Arc;
//!
//! let advisor = Arc::new(HttpAdvisor::new(AdvisorConfig::from_env())?);
//! let engine = UrgencyScoringEngine::with_store(ledger, Some(advisor), ScoringConfig::default());
//! let report = engine.batch_score_and_store(&school_ids, true).await;
//! ```

pub mod advisor;
pub mod config;
pub mod engine;
pub mod error;
pub mod factors;
pub mod fallback;
pub mod parser;
pub mod prompt;

pub use advisor::{AiAdvisor, HttpAdvisor, MockAdvisor, MockBehavior};
pub use config::{AdvisorConfig, ScoringConfig};
pub use engine::{BatchScoreReport, ScoreResult, UrgencyScoringEngine};
pub use error::{AdvisorError, AdvisorResult};
pub use factors::IssueFactors;
pub use fallback::rule_based_score;
pub use parser::{parse_reply, AdvisorReply};
