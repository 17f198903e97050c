//! Meal Store - Ledger Storage
//!
//! The ledger is the single source of truth for deliveries, escrow
//! transactions, verifications, issues and school priorities. No service
//! caches authoritative state across calls.
//!
//! # Contract
//!
//! - Row reads and inserts per record type
//! - Atomic compare-and-set on a single row's status (`update_*` take the
//!   expected current status and fail with `StatusConflict` otherwise)
//! - Escrow status writes carry their audit entry
//!
//! # Usage Example
//!
//! ```ignore
//! use meal_store::{InMemoryLedger, LedgerStore};
//! use std::sync::Arc;
//!
//! let ledger: Arc<dyn LedgerStore> = Arc::new(InMemoryLedger::new());
//! ```

pub mod error;
pub mod repos;

pub use error::{StoreError, StoreResult};
pub use repos::*;
