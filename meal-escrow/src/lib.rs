//! Meal Escrow - Delivery, Custody and Dispute Layer
//!
//! Coordinates the money-moving side of the meal program: deliveries are
//! scheduled against locked escrow, schools verify receipt, and funds are
//! released to the catering unless an unresolved issue holds them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     MealProgram                      │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐  │
//! │  │  Lifecycle   │ │ Verification │ │ IssueTracker │  │
//! │  └──────┬───────┘ └──────┬───────┘ └──────┬───────┘  │
//! │         └────────────────┼────────────────┘          │
//! │                          ▼                           │
//! │                ┌───────────────────┐                 │
//! │                │ EscrowCoordinator │──▶ SettlementRail│
//! │                └─────────┬─────────┘                 │
//! └──────────────────────────┼───────────────────────────┘
//!                            ▼
//!                       meal-store
//! ```
//!
//! # Modules
//!
//! - [`lifecycle`] - Delivery state machine
//! - [`escrow`] - Escrow custody and rail calls
//! - [`verification`] - Receipt verification and payment
//! - [`issues`] - Issue and dispute tracking
//! - [`rail`] - Settlement rail contract, HTTP client and mock
//! - [`guard`] - Per-delivery serialization
//! - [`config`] - Configuration
//! - [`error`] - Rail error types
//!
//! # Usage Example
//!
//! ```ignore
//! use meal_escrow::{MealProgram, MockSettlementRail, ProgramConfig};
//! use meal_store::InMemoryLedger;
//! use std::sync::Arc;
//!
//! let program = MealProgram::new(
//!     Arc::new(InMemoryLedger::new()),
//!     Arc::new(MockSettlementRail::new()),
//!     ProgramConfig::default(),
//! );
//! let delivery = program.lifecycle.create(request, &actor).await?;
//! program.lifecycle.schedule(&delivery.id, &actor).await?;
//! ```

pub mod config;
pub mod error;
pub mod escrow;
pub mod guard;
pub mod issues;
pub mod lifecycle;
pub mod rail;
pub mod verification;

pub use config::{EscrowConfig, LifecycleConfig, ProgramConfig, SettlementRailConfig};
pub use error::{RailError, RailResult};
pub use escrow::EscrowCoordinator;
pub use guard::{DeliveryGuards, DeliveryPermit};
pub use issues::{IssueResolution, IssueTracker};
pub use lifecycle::DeliveryLifecycleManager;
pub use rail::{HttpSettlementRail, MockSettlementRail, SettlementRail};
pub use verification::{PaymentHold, PaymentStatus, VerificationProcessor, VerificationReceipt};

use meal_store::LedgerStore;
use std::sync::Arc;

/// All escrow-layer services wired over one ledger and one rail
pub struct MealProgram {
    pub lifecycle: Arc<DeliveryLifecycleManager>,
    pub escrow: Arc<EscrowCoordinator>,
    pub verification: VerificationProcessor,
    pub issues: IssueTracker,
}

impl MealProgram {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rail: Arc<dyn SettlementRail>,
        config: ProgramConfig,
    ) -> Self {
        let escrow = Arc::new(EscrowCoordinator::new(store.clone(), rail, config.escrow));
        let lifecycle = Arc::new(DeliveryLifecycleManager::new(
            store.clone(),
            escrow.clone(),
            config.lifecycle,
        ));
        let verification =
            VerificationProcessor::new(store.clone(), lifecycle.clone(), escrow.clone());
        let issues = IssueTracker::new(store, escrow.clone());

        Self {
            lifecycle,
            escrow,
            verification,
            issues,
        }
    }
}
