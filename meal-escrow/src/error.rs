//! Escrow Layer Error Types
//!
//! Service operations return `MealResult`; this module holds the settlement
//! rail's own failure type, which gains its operation when converted.

use meal_core::{MealError, RailFailureKind, SettlementOperation};
use thiserror::Error;

/// Rail Result type
pub type RailResult<T> = Result<T, RailError>;

/// Rail call failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RailError {
    pub kind: RailFailureKind,
    pub message: String,
}

impl RailError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: RailFailureKind::Rejected,
            message: message.into(),
        }
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self {
            kind: RailFailureKind::Ambiguous,
            message: message.into(),
        }
    }

    /// Attach the operation and convert into the core error
    pub fn into_meal(self, operation: SettlementOperation) -> MealError {
        MealError::rail(operation, self.kind, self.message)
    }
}
