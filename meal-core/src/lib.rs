//! Meal Program Core - Deliveries, Escrow, Verification and Issues
//!
//! Shared vocabulary for the meal-program fund flow between a government
//! payer, catering vendors and schools:
//! - **Deliveries**: promised transfer of portions from a catering to a school
//! - **Escrow**: fund custody locked per delivery, released after receipt
//! - **Verification**: a school's attestation of receipt
//! - **Issues**: reported problems that can hold a pending release
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 meal-cli (batch scoring job)                 │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  meal-escrow                 │  meal-scoring                │
//! │  (lifecycle, escrow,         │  (urgency engine, advisor,   │
//! │   verification, disputes)    │   rule-based fallback)       │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                 meal-store (LedgerStore)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 meal-core (this crate)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # State Machines
//!
//! | Record | Graph |
//! |--------|-------|
//! | Delivery | `pending → scheduled → delivered → verified`, `cancelled` from any non-terminal |
//! | EscrowTransaction | `locked → released`, `locked → disputed → {released, refunded}`, `locked → refunded` |
//! | Issue | `open → investigating → resolved`, forward only |

pub mod error;
pub mod logging;
pub mod types;

pub use error::{MealError, MealResult, RailFailureKind};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
