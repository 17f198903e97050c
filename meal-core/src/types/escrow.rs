//! Escrow Custody
//!
//! One escrow transaction per delivery. Custody state is always the
//! persisted `status` field, never re-derived from the delivery.
//!
//! Allowed moves:
//! - `locked → released` (exactly once)
//! - `locked → disputed → released | refunded`
//! - `locked → refunded` (cancellation)

use super::ids::{ActorId, CateringId, DeliveryId, EscrowId, SchoolId};
use crate::error::{MealError, MealResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Escrow status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Locked,
    Released,
    Disputed,
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Locked => "locked",
            EscrowStatus::Released => "released",
            EscrowStatus::Disputed => "disputed",
            EscrowStatus::Refunded => "refunded",
        }
    }

    /// Check if status transition is valid
    pub fn can_transition_to(&self, next: EscrowStatus) -> bool {
        matches!(
            (self, next),
            (EscrowStatus::Locked, EscrowStatus::Released)
                | (EscrowStatus::Locked, EscrowStatus::Disputed)
                | (EscrowStatus::Locked, EscrowStatus::Refunded)
                | (EscrowStatus::Disputed, EscrowStatus::Released)
                | (EscrowStatus::Disputed, EscrowStatus::Refunded)
        )
    }

    /// Funds still held in custody
    pub fn is_held(&self) -> bool {
        matches!(self, EscrowStatus::Locked | EscrowStatus::Disputed)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Escrow transaction record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    /// Settlement rail reference
    pub escrow_id: EscrowId,
    pub delivery_id: DeliveryId,
    pub school_id: SchoolId,
    pub catering_id: CateringId,
    pub amount: Decimal,
    pub status: EscrowStatus,
    pub locked_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Rail transaction reference of the latest fund movement
    pub external_tx_ref: Option<String>,
    /// Rail block reference, set on release
    pub external_block_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowTransaction {
    /// Create a freshly locked transaction
    pub fn locked(
        escrow_id: EscrowId,
        delivery_id: DeliveryId,
        school_id: SchoolId,
        catering_id: CateringId,
        amount: Decimal,
        external_tx_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            escrow_id,
            delivery_id,
            school_id,
            catering_id,
            amount,
            status: EscrowStatus::Locked,
            locked_at: now,
            released_at: None,
            refunded_at: None,
            external_tx_ref,
            external_block_ref: None,
            updated_at: now,
        }
    }

    /// Move to a new status, stamping the matching timestamp
    pub fn transition(&mut self, next: EscrowStatus, now: DateTime<Utc>) -> MealResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MealError::InvalidTransition {
                entity: "EscrowTransaction".to_string(),
                id: self.escrow_id.to_string(),
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        self.status = next;
        self.updated_at = now;
        match next {
            EscrowStatus::Released => self.released_at = Some(now),
            EscrowStatus::Refunded => self.refunded_at = Some(now),
            EscrowStatus::Locked | EscrowStatus::Disputed => {}
        }
        Ok(())
    }

    /// Record the rail references of the latest movement
    pub fn with_settlement(mut self, settlement: &SettlementReference) -> Self {
        self.external_tx_ref = Some(settlement.tx_ref.clone());
        if settlement.block_ref.is_some() {
            self.external_block_ref = settlement.block_ref.clone();
        }
        self
    }

    /// Settlement reference for display, present once released
    pub fn settlement_reference(&self) -> Option<SettlementReference> {
        if self.status != EscrowStatus::Released {
            return None;
        }
        self.external_tx_ref.as_ref().map(|tx_ref| SettlementReference {
            tx_ref: tx_ref.clone(),
            block_ref: self.external_block_ref.clone(),
        })
    }
}

/// External settlement references (transaction hash / block number)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReference {
    pub tx_ref: String,
    pub block_ref: Option<String>,
}

/// Immutable audit entry, one per escrow state change
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowAuditEntry {
    pub escrow_id: EscrowId,
    pub delivery_id: DeliveryId,
    /// None for the creation entry
    pub old_status: Option<EscrowStatus>,
    pub new_status: EscrowStatus,
    pub actor: ActorId,
    pub external_tx_ref: Option<String>,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl EscrowAuditEntry {
    pub fn new(
        tx: &EscrowTransaction,
        old_status: Option<EscrowStatus>,
        actor: ActorId,
        note: Option<String>,
    ) -> Self {
        Self {
            escrow_id: tx.escrow_id.clone(),
            delivery_id: tx.delivery_id.clone(),
            old_status,
            new_status: tx.status,
            actor,
            external_tx_ref: tx.external_tx_ref.clone(),
            note,
            recorded_at: tx.updated_at,
        }
    }
}

/// Settlement rail operation kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOperation {
    Lock,
    Release,
    Refund,
}

impl SettlementOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementOperation::Lock => "lock",
            SettlementOperation::Release => "release",
            SettlementOperation::Refund => "refund",
        }
    }
}

impl std::fmt::Display for SettlementOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Out-of-band reconciliation marker for an outcome the core cannot resolve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationFlag {
    pub delivery_id: DeliveryId,
    pub escrow_id: EscrowId,
    pub operation: SettlementOperation,
    pub detail: String,
    pub raised_at: DateTime<Utc>,
    /// Set once an operator has settled the outcome with the rail
    #[serde(default)]
    pub cleared_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cleared_by: Option<ActorId>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl ReconciliationFlag {
    pub fn raise(
        delivery_id: DeliveryId,
        escrow_id: EscrowId,
        operation: SettlementOperation,
        detail: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            delivery_id,
            escrow_id,
            operation,
            detail,
            raised_at: now,
            cleared_at: None,
            cleared_by: None,
            resolution: None,
        }
    }

    /// Still blocking rail calls for its delivery
    pub fn is_open(&self) -> bool {
        self.cleared_at.is_none()
    }

    pub fn clear(&mut self, actor: ActorId, resolution: String, now: DateTime<Utc>) {
        self.cleared_at = Some(now);
        self.cleared_by = Some(actor);
        self.resolution = Some(resolution);
    }
}
