//! Scoring Error Types

use meal_core::MealError;
use thiserror::Error;

/// Advisor Result type
pub type AdvisorResult<T> = Result<T, AdvisorError>;

/// AI advisor failure
///
/// Every variant sends the engine down the rule-based path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdvisorError {
    /// No reply within the deadline
    #[error("[MEAL-EXT-002] Advisor timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection or protocol failure
    #[error("[MEAL-EXT-002] Advisor transport error: {0}")]
    Transport(String),

    /// Provider answered with an error status
    #[error("[MEAL-EXT-002] Advisor returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    /// Provider answered without any completion text
    #[error("[MEAL-EXT-002] Advisor returned no completion")]
    EmptyReply,
}

impl From<AdvisorError> for MealError {
    fn from(err: AdvisorError) -> Self {
        MealError::AiProvider(err.to_string())
    }
}
