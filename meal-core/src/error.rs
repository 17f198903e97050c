//! Meal Program Error Codes
//!
//! Error code format: MEAL-{module}-{sequence}
//! - MEAL-VAL: Input validation
//! - MEAL-DELIVERY: Delivery lifecycle
//! - MEAL-ESCROW: Escrow custody
//! - MEAL-VERIFY: Receipt verification
//! - MEAL-EXT: External dependencies (settlement rail, AI advisor, storage)

use crate::types::{EscrowTransaction, IssueId, SettlementOperation};
use thiserror::Error;

/// Meal Result type
pub type MealResult<T> = Result<T, MealError>;

/// How a settlement rail call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RailFailureKind {
    /// The rail refused the call, no funds moved
    Rejected,
    /// Outcome unknown (timeout or transport loss after send)
    Ambiguous,
}

impl std::fmt::Display for RailFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RailFailureKind::Rejected => write!(f, "rejected"),
            RailFailureKind::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// Meal Error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MealError {
    // ============================================================
    // Validation Errors (MEAL-VAL-*)
    // ============================================================
    /// [MEAL-VAL-001] Bad input
    #[error("[MEAL-VAL-001] Validation failed: {reason}")]
    Validation { reason: String },

    // ============================================================
    // Delivery Errors (MEAL-DELIVERY-*)
    // ============================================================
    /// [MEAL-DELIVERY-001] State machine guard violation
    #[error("[MEAL-DELIVERY-001] Invalid {entity} transition for {id}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        id: String,
        from: String,
        to: String,
    },

    /// [MEAL-DELIVERY-002] Entity not found
    #[error("[MEAL-DELIVERY-002] {entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // ============================================================
    // Escrow Errors (MEAL-ESCROW-*)
    // ============================================================
    /// [MEAL-ESCROW-001] Escrow already exists for the delivery
    #[error("[MEAL-ESCROW-001] Escrow already locked for delivery {delivery_id}")]
    AlreadyLocked {
        delivery_id: String,
        existing: Box<EscrowTransaction>,
    },

    /// [MEAL-ESCROW-002] Escrow already released
    #[error("[MEAL-ESCROW-002] Escrow already released for delivery {delivery_id}")]
    AlreadyReleased {
        delivery_id: String,
        existing: Box<EscrowTransaction>,
    },

    /// [MEAL-ESCROW-003] No held escrow for the delivery
    #[error("[MEAL-ESCROW-003] No locked escrow for delivery {delivery_id}")]
    NotLocked { delivery_id: String },

    /// [MEAL-ESCROW-004] Release held by unresolved high-severity issues
    #[error("[MEAL-ESCROW-004] Release of delivery {delivery_id} blocked by {} unresolved issue(s)", .blocking_issues.len())]
    BlockedByDispute {
        delivery_id: String,
        blocking_issues: Vec<IssueId>,
    },

    /// [MEAL-ESCROW-005] Earlier rail outcome still unconfirmed
    #[error("[MEAL-ESCROW-005] Delivery {delivery_id} has an unreconciled rail {operation}")]
    PendingReconciliation {
        delivery_id: String,
        operation: SettlementOperation,
    },

    // ============================================================
    // Verification Errors (MEAL-VERIFY-*)
    // ============================================================
    /// [MEAL-VERIFY-001] Delivery not in a verifiable state
    #[error("[MEAL-VERIFY-001] Delivery {delivery_id} is {status}, cannot accept this operation")]
    InvalidDeliveryState { delivery_id: String, status: String },

    /// [MEAL-VERIFY-002] Approved verification already exists
    #[error("[MEAL-VERIFY-002] Delivery {delivery_id} already has an approved verification")]
    DuplicateVerification { delivery_id: String },

    // ============================================================
    // External Errors (MEAL-EXT-*)
    // ============================================================
    /// [MEAL-EXT-001] Settlement rail failure
    #[error("[MEAL-EXT-001] Settlement rail {operation} {kind}: {message}")]
    SettlementRail {
        operation: SettlementOperation,
        kind: RailFailureKind,
        message: String,
    },

    /// [MEAL-EXT-002] AI advisor failure
    #[error("[MEAL-EXT-002] AI provider error: {0}")]
    AiProvider(String),

    /// [MEAL-EXT-003] Ledger store failure
    #[error("[MEAL-EXT-003] Storage error: {0}")]
    Storage(String),
}

impl MealError {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a settlement rail error
    pub fn rail(
        operation: SettlementOperation,
        kind: RailFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self::SettlementRail {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Idempotency guards: safe to treat as a no-op
    pub fn is_idempotent_noop(&self) -> bool {
        matches!(
            self,
            MealError::AlreadyLocked { .. } | MealError::AlreadyReleased { .. }
        )
    }

    /// The existing escrow record carried by an idempotency guard
    pub fn existing_escrow(&self) -> Option<&EscrowTransaction> {
        match self {
            MealError::AlreadyLocked { existing, .. } | MealError::AlreadyReleased { existing, .. } => {
                Some(existing.as_ref())
            }
            _ => None,
        }
    }

    /// Ambiguous rail outcome needing out-of-band reconciliation
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            MealError::SettlementRail {
                kind: RailFailureKind::Ambiguous,
                ..
            } | MealError::PendingReconciliation { .. }
        )
    }

    /// External failures a caller may choose to retry; the core never does
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MealError::SettlementRail { .. } | MealError::AiProvider(_) | MealError::Storage(_)
        )
    }

    /// Conflict-class errors (guard violations) as opposed to bad input
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            MealError::InvalidTransition { .. }
                | MealError::InvalidDeliveryState { .. }
                | MealError::DuplicateVerification { .. }
                | MealError::NotLocked { .. }
        )
    }
}

impl From<serde_json::Error> for MealError {
    fn from(err: serde_json::Error) -> Self {
        MealError::validation(format!("Malformed JSON: {}", err))
    }
}
