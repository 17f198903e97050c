//! Ledger Store Error Types

use meal_core::MealError;
use thiserror::Error;

/// Store Result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Ledger Store Error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Duplicate entity
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate { entity_type: String, id: String },

    /// Compare-and-set lost: stored status differs from the expected one
    #[error("Status conflict on {entity_type} {id}: expected {expected}, found {actual}")]
    StatusConflict {
        entity_type: String,
        id: String,
        expected: String,
        actual: String,
    },

    /// Backend failure
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a status conflict error
    pub fn conflict(
        entity_type: impl Into<String>,
        id: impl std::fmt::Display,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::StatusConflict {
            entity_type: entity_type.into(),
            id: id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<StoreError> for MealError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity_type, id } => MealError::NotFound {
                entity: entity_type,
                id,
            },
            StoreError::StatusConflict {
                entity_type,
                id,
                expected,
                actual,
            } => MealError::InvalidTransition {
                entity: entity_type,
                id,
                from: actual,
                to: format!("(expected {})", expected),
            },
            other @ (StoreError::Duplicate { .. } | StoreError::Database(_)) => {
                MealError::Storage(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_invalid_transition() {
        let err: MealError = StoreError::conflict("Delivery", "dlv:1", "pending", "scheduled").into();
        match err {
            MealError::InvalidTransition { from, .. } => assert_eq!(from, "scheduled"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_not_found_maps_through() {
        let err: MealError = StoreError::not_found("Issue", "iss:9").into();
        assert!(matches!(err, MealError::NotFound { .. }));
    }
}
