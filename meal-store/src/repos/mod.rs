//! Ledger Repositories
//!
//! Data access contracts for the meal program ledger.

mod delivery_repo;
mod escrow_repo;
mod issue_repo;
mod priority_repo;
mod verification_repo;

// In-memory implementation
mod memory;

// Export repository traits
pub use delivery_repo::*;
pub use escrow_repo::*;
pub use issue_repo::*;
pub use priority_repo::*;
pub use verification_repo::*;

// Export in-memory implementation
pub use memory::*;

/// The full ledger: every repository behind one handle
pub trait LedgerStore:
    DeliveryRepository
    + EscrowRepository
    + VerificationRepository
    + IssueRepository
    + SchoolPriorityRepository
{
}

impl<T> LedgerStore for T where
    T: DeliveryRepository
        + EscrowRepository
        + VerificationRepository
        + IssueRepository
        + SchoolPriorityRepository
{
}
