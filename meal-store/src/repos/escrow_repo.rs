//! Escrow Repository
//!
//! Every status write carries its audit entry so both land together.

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meal_core::{
    ActorId, DeliveryId, EscrowAuditEntry, EscrowStatus, EscrowTransaction, ReconciliationFlag,
};

/// Escrow repository trait
#[async_trait]
pub trait EscrowRepository: Send + Sync {
    /// Insert the escrow row for a delivery; `Duplicate` if one exists
    async fn insert_escrow(
        &self,
        tx: EscrowTransaction,
        audit: EscrowAuditEntry,
    ) -> StoreResult<EscrowTransaction>;

    /// Get the escrow row of a delivery
    async fn find_escrow(&self, delivery_id: &DeliveryId) -> StoreResult<Option<EscrowTransaction>>;

    /// Replace the escrow row if its stored status still equals `expected`
    async fn update_escrow(
        &self,
        expected: EscrowStatus,
        tx: EscrowTransaction,
        audit: EscrowAuditEntry,
    ) -> StoreResult<EscrowTransaction>;

    /// Audit entries of a delivery's escrow, oldest first
    async fn audit_trail(&self, delivery_id: &DeliveryId) -> StoreResult<Vec<EscrowAuditEntry>>;

    /// Record an outcome that needs out-of-band reconciliation
    async fn raise_reconciliation_flag(&self, flag: ReconciliationFlag) -> StoreResult<()>;

    /// All raised reconciliation flags, oldest first
    async fn reconciliation_flags(&self) -> StoreResult<Vec<ReconciliationFlag>>;

    /// Uncleared flags of one delivery
    async fn open_reconciliation_flags(
        &self,
        delivery_id: &DeliveryId,
    ) -> StoreResult<Vec<ReconciliationFlag>> {
        Ok(self
            .reconciliation_flags()
            .await?
            .into_iter()
            .filter(|flag| flag.is_open() && &flag.delivery_id == delivery_id)
            .collect())
    }

    /// Clear every open flag of a delivery, returning the cleared flags
    async fn clear_reconciliation_flags(
        &self,
        delivery_id: &DeliveryId,
        cleared_by: &ActorId,
        resolution: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<ReconciliationFlag>>;
}
