//! Logging Standards and Conventions
//!
//! All meal crates log through `tracing` with structured fields.
//!
//! # Log Levels
//!
//! | Level | Usage | Examples |
//! |-------|-------|----------|
//! | ERROR | Money state we cannot confirm | Ambiguous rail outcome, failed compensation |
//! | WARN  | Degraded or held operation | AI fallback, release held by dispute, schedule rollback |
//! | INFO  | State changes | Escrow locked/released, delivery verified, batch finished |
//! | DEBUG | Operation flow | Guard checks, advisor prompts |
//!
//! # Examples
//!
//! ```ignore
//! use tracing::{info, warn};
//!
//! info!(
//!     delivery_id = %delivery.id,
//!     escrow_id = %tx.escrow_id,
//!     operation = operations::ESCROW_RELEASE,
//!     "Escrow released"
//! );
//!
//! warn!(
//!     school_id = %school_id,
//!     error = %e,
//!     "Advisor call failed, using rule-based score"
//! );
//! ```

/// Standard log field names
pub mod fields {
    pub const DELIVERY_ID: &str = "delivery_id";
    pub const ESCROW_ID: &str = "escrow_id";
    pub const SCHOOL_ID: &str = "school_id";
    pub const ISSUE_ID: &str = "issue_id";
    pub const ACTOR: &str = "actor";
    pub const OPERATION: &str = "operation";
    pub const STATUS: &str = "status";
    pub const ERROR: &str = "error";
    pub const DURATION_MS: &str = "duration_ms";
    pub const COUNT: &str = "count";
}

/// Operation names used in the `operation` field
pub mod operations {
    // Delivery lifecycle
    pub const DELIVERY_CREATE: &str = "delivery_create";
    pub const DELIVERY_SCHEDULE: &str = "delivery_schedule";
    pub const DELIVERY_DELIVER: &str = "delivery_deliver";
    pub const DELIVERY_VERIFY: &str = "delivery_verify";
    pub const DELIVERY_CANCEL: &str = "delivery_cancel";
    pub const DELIVERY_AMEND: &str = "delivery_amend";

    // Escrow custody
    pub const ESCROW_LOCK: &str = "escrow_lock";
    pub const ESCROW_RELEASE: &str = "escrow_release";
    pub const ESCROW_DISPUTE: &str = "escrow_dispute";
    pub const ESCROW_REFUND: &str = "escrow_refund";
    pub const ESCROW_RECONCILE: &str = "escrow_reconcile";

    // Verification and issues
    pub const VERIFICATION_SUBMIT: &str = "verification_submit";
    pub const ISSUE_REPORT: &str = "issue_report";
    pub const ISSUE_INVESTIGATE: &str = "issue_investigate";
    pub const ISSUE_ESCALATE: &str = "issue_escalate";
    pub const ISSUE_RESOLVE: &str = "issue_resolve";

    // Scoring
    pub const SCORE: &str = "score";
    pub const BATCH_SCORE: &str = "batch_score";
}
