//! Escrow Coordinator
//!
//! Owns every escrow state change and every settlement rail call.
//!
//! Per delivery, operations are serialized through [`DeliveryGuards`] and
//! each status write is a compare-and-set against the ledger. Together these
//! give:
//!
//! - at most one escrow row per delivery
//! - at most one successful rail release per escrow
//! - no release while a blocking issue on the delivery is unresolved
//!
//! A rail outcome that cannot be confirmed is never papered over: the error
//! is returned and a [`ReconciliationFlag`] is written for operators. While
//! a delivery has an open flag no further lock, release or refund reaches
//! the rail; callers get `PendingReconciliation` until an operator clears
//! it with [`EscrowCoordinator::clear_reconciliation`].
//!
//! Each operation has a `*_within` form taking a [`DeliveryPermit`], for
//! callers that already hold the delivery across several steps.

use crate::config::EscrowConfig;
use crate::error::RailError;
use crate::guard::{DeliveryGuards, DeliveryPermit};
use crate::rail::SettlementRail;
use chrono::Utc;
use meal_core::logging::operations;
use meal_core::{
    ActorId, DeliveryId, EscrowAuditEntry, EscrowId, EscrowStatus, EscrowTransaction, IssueId,
    MealError, MealResult, ReconciliationFlag, SettlementOperation,
};
use meal_store::{LedgerStore, StoreResult};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Escrow Coordinator
pub struct EscrowCoordinator {
    store: Arc<dyn LedgerStore>,
    rail: Arc<dyn SettlementRail>,
    config: EscrowConfig,
    guards: DeliveryGuards,
}

impl EscrowCoordinator {
    /// Create a new coordinator
    pub fn new(
        store: Arc<dyn LedgerStore>,
        rail: Arc<dyn SettlementRail>,
        config: EscrowConfig,
    ) -> Self {
        Self {
            store,
            rail,
            config,
            guards: DeliveryGuards::new(),
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Wait for exclusive access to one delivery
    pub async fn permit(&self, delivery_id: &DeliveryId) -> DeliveryPermit {
        self.guards.acquire(delivery_id).await
    }

    /// Lock funds for a delivery
    ///
    /// Fails with `AlreadyLocked` (carrying the existing row) when an escrow
    /// already exists; the rail is not called again in that case.
    pub async fn lock(
        &self,
        delivery_id: &DeliveryId,
        amount: Decimal,
        actor: &ActorId,
    ) -> MealResult<EscrowTransaction> {
        let permit = self.permit(delivery_id).await;
        self.lock_within(&permit, amount, actor).await
    }

    pub async fn lock_within(
        &self,
        permit: &DeliveryPermit,
        amount: Decimal,
        actor: &ActorId,
    ) -> MealResult<EscrowTransaction> {
        if amount <= Decimal::ZERO {
            return Err(MealError::validation("Escrow amount must be positive"));
        }

        let delivery_id = permit.delivery_id();
        let delivery = self.store.get_delivery(delivery_id).await?;
        if let Some(existing) = self.store.find_escrow(delivery_id).await? {
            debug!(
                delivery_id = %delivery_id,
                escrow_id = %existing.escrow_id,
                status = existing.status.as_str(),
                "Escrow already exists"
            );
            return Err(MealError::AlreadyLocked {
                delivery_id: delivery_id.to_string(),
                existing: Box::new(existing),
            });
        }
        self.ensure_reconciled(delivery_id).await?;

        let escrow_id = EscrowId::generate();
        let movement = match self
            .rail
            .lock(
                &escrow_id,
                &self.config.payer_ref,
                delivery.catering_id.as_str(),
                amount,
            )
            .await
        {
            Ok(movement) => movement,
            Err(e) => {
                return Err(self
                    .rail_failure(delivery_id, &escrow_id, SettlementOperation::Lock, e)
                    .await)
            }
        };

        let tx = EscrowTransaction::locked(
            escrow_id,
            delivery_id.clone(),
            delivery.school_id,
            delivery.catering_id,
            amount,
            Some(movement.tx_ref),
            Utc::now(),
        );
        let audit = EscrowAuditEntry::new(&tx, None, actor.clone(), None);
        let result = self.store.insert_escrow(tx.clone(), audit).await;
        let tx = self
            .recorded_or_flag(result, &tx, SettlementOperation::Lock)
            .await?;

        info!(
            delivery_id = %delivery_id,
            escrow_id = %tx.escrow_id,
            amount = %tx.amount,
            actor = %actor,
            operation = operations::ESCROW_LOCK,
            "Escrow locked"
        );
        Ok(tx)
    }

    /// Release held funds to the catering
    ///
    /// Fails with `BlockedByDispute` while a blocking issue is unresolved,
    /// and with `AlreadyReleased` (carrying the row) after a release.
    pub async fn release(
        &self,
        delivery_id: &DeliveryId,
        actor: &ActorId,
    ) -> MealResult<EscrowTransaction> {
        let permit = self.permit(delivery_id).await;
        self.release_inner(&permit, actor, None).await
    }

    pub async fn release_within(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
    ) -> MealResult<EscrowTransaction> {
        self.release_inner(permit, actor, None).await
    }

    /// Release despite unresolved blocking issues, recording the reason
    pub async fn release_with_override(
        &self,
        delivery_id: &DeliveryId,
        actor: &ActorId,
        reason: &str,
    ) -> MealResult<EscrowTransaction> {
        if reason.trim().is_empty() {
            return Err(MealError::validation("Override reason must not be empty"));
        }
        let permit = self.permit(delivery_id).await;
        self.release_inner(&permit, actor, Some(reason)).await
    }

    async fn release_inner(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
        override_reason: Option<&str>,
    ) -> MealResult<EscrowTransaction> {
        let delivery_id = permit.delivery_id();
        let tx = self.held_escrow(delivery_id).await?;
        if tx.status == EscrowStatus::Released {
            return Err(MealError::AlreadyReleased {
                delivery_id: delivery_id.to_string(),
                existing: Box::new(tx),
            });
        }
        self.ensure_reconciled(delivery_id).await?;

        let blocking = self.blocking_issues(delivery_id).await?;
        if !blocking.is_empty() {
            match override_reason {
                None => {
                    warn!(
                        delivery_id = %delivery_id,
                        escrow_id = %tx.escrow_id,
                        count = blocking.len(),
                        "Release held by unresolved issues"
                    );
                    return Err(MealError::BlockedByDispute {
                        delivery_id: delivery_id.to_string(),
                        blocking_issues: blocking,
                    });
                }
                Some(reason) => {
                    warn!(
                        delivery_id = %delivery_id,
                        escrow_id = %tx.escrow_id,
                        actor = %actor,
                        reason = reason,
                        count = blocking.len(),
                        "Releasing over unresolved issues"
                    );
                }
            }
        }

        let old_status = tx.status;
        let mut next = tx.clone();
        next.transition(EscrowStatus::Released, Utc::now())?;

        let movement = match self.rail.release(&tx.escrow_id).await {
            Ok(movement) => movement,
            Err(e) => {
                return Err(self
                    .rail_failure(delivery_id, &tx.escrow_id, SettlementOperation::Release, e)
                    .await)
            }
        };

        let next = next.with_settlement(&movement);
        let note = override_reason.map(|reason| format!("override: {}", reason));
        let audit = EscrowAuditEntry::new(&next, Some(old_status), actor.clone(), note);
        let result = self.store.update_escrow(old_status, next.clone(), audit).await;
        let released = self
            .recorded_or_flag(result, &next, SettlementOperation::Release)
            .await?;

        info!(
            delivery_id = %delivery_id,
            escrow_id = %released.escrow_id,
            tx_ref = ?released.external_tx_ref,
            actor = %actor,
            operation = operations::ESCROW_RELEASE,
            "Escrow released"
        );
        Ok(released)
    }

    /// Hold a locked escrow pending issue resolution
    ///
    /// Disputing an already disputed escrow returns it unchanged.
    pub async fn dispute(
        &self,
        delivery_id: &DeliveryId,
        actor: &ActorId,
        note: Option<String>,
    ) -> MealResult<EscrowTransaction> {
        let permit = self.permit(delivery_id).await;
        self.dispute_within(&permit, actor, note).await
    }

    pub async fn dispute_within(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
        note: Option<String>,
    ) -> MealResult<EscrowTransaction> {
        let delivery_id = permit.delivery_id();
        let tx = self.held_escrow(delivery_id).await?;
        if tx.status == EscrowStatus::Disputed {
            return Ok(tx);
        }

        let old_status = tx.status;
        let mut next = tx;
        next.transition(EscrowStatus::Disputed, Utc::now())?;
        let audit = EscrowAuditEntry::new(&next, Some(old_status), actor.clone(), note);
        let disputed = self.store.update_escrow(old_status, next, audit).await?;

        info!(
            delivery_id = %delivery_id,
            escrow_id = %disputed.escrow_id,
            actor = %actor,
            operation = operations::ESCROW_DISPUTE,
            "Escrow disputed"
        );
        Ok(disputed)
    }

    /// Return held funds to the payer
    pub async fn refund(
        &self,
        delivery_id: &DeliveryId,
        actor: &ActorId,
        note: Option<String>,
    ) -> MealResult<EscrowTransaction> {
        let permit = self.permit(delivery_id).await;
        self.refund_within(&permit, actor, note).await
    }

    pub async fn refund_within(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
        note: Option<String>,
    ) -> MealResult<EscrowTransaction> {
        let delivery_id = permit.delivery_id();
        let tx = self.held_escrow(delivery_id).await?;
        let old_status = tx.status;
        let mut next = tx.clone();
        next.transition(EscrowStatus::Refunded, Utc::now())?;
        self.ensure_reconciled(delivery_id).await?;

        let movement = match self.rail.refund(&tx.escrow_id).await {
            Ok(movement) => movement,
            Err(e) => {
                return Err(self
                    .rail_failure(delivery_id, &tx.escrow_id, SettlementOperation::Refund, e)
                    .await)
            }
        };

        let next = next.with_settlement(&movement);
        let audit = EscrowAuditEntry::new(&next, Some(old_status), actor.clone(), note);
        let result = self.store.update_escrow(old_status, next.clone(), audit).await;
        let refunded = self
            .recorded_or_flag(result, &next, SettlementOperation::Refund)
            .await?;

        info!(
            delivery_id = %delivery_id,
            escrow_id = %refunded.escrow_id,
            actor = %actor,
            operation = operations::ESCROW_REFUND,
            "Escrow refunded"
        );
        Ok(refunded)
    }

    /// Current escrow row for a delivery, if any
    pub async fn find(&self, delivery_id: &DeliveryId) -> MealResult<Option<EscrowTransaction>> {
        Ok(self.store.find_escrow(delivery_id).await?)
    }

    /// Audit entries of a delivery's escrow, oldest first
    pub async fn audit_trail(&self, delivery_id: &DeliveryId) -> MealResult<Vec<EscrowAuditEntry>> {
        Ok(self.store.audit_trail(delivery_id).await?)
    }

    /// Unresolved issues on the delivery whose severity holds a release
    pub async fn blocking_issues(&self, delivery_id: &DeliveryId) -> MealResult<Vec<IssueId>> {
        let issues = self.store.issues_for_delivery(delivery_id).await?;
        Ok(issues
            .into_iter()
            .filter(|issue| issue.holds_release(&self.config.blocking_severities))
            .map(|issue| issue.id)
            .collect())
    }

    /// Operator flags raised so far, cleared ones included
    pub async fn reconciliation_flags(&self) -> MealResult<Vec<ReconciliationFlag>> {
        Ok(self.store.reconciliation_flags().await?)
    }

    /// Record that an operator settled a delivery's unconfirmed rail outcome
    ///
    /// The escrow row is left as is; rail calls for the delivery are
    /// allowed again afterwards.
    pub async fn clear_reconciliation(
        &self,
        delivery_id: &DeliveryId,
        actor: &ActorId,
        resolution: &str,
    ) -> MealResult<Vec<ReconciliationFlag>> {
        if resolution.trim().is_empty() {
            return Err(MealError::validation("Reconciliation resolution must not be empty"));
        }

        let _permit = self.permit(delivery_id).await;
        let cleared = self
            .store
            .clear_reconciliation_flags(delivery_id, actor, resolution, Utc::now())
            .await?;

        info!(
            delivery_id = %delivery_id,
            count = cleared.len(),
            actor = %actor,
            operation = operations::ESCROW_RECONCILE,
            "Reconciliation flags cleared"
        );
        Ok(cleared)
    }

    /// Refuse to call the rail again while an earlier outcome is unconfirmed
    async fn ensure_reconciled(&self, delivery_id: &DeliveryId) -> MealResult<()> {
        let open = self.store.open_reconciliation_flags(delivery_id).await?;
        match open.first() {
            None => Ok(()),
            Some(flag) => {
                warn!(
                    delivery_id = %delivery_id,
                    escrow_id = %flag.escrow_id,
                    operation = %flag.operation,
                    count = open.len(),
                    "Rail call refused until reconciliation"
                );
                Err(MealError::PendingReconciliation {
                    delivery_id: delivery_id.to_string(),
                    operation: flag.operation,
                })
            }
        }
    }

    async fn held_escrow(&self, delivery_id: &DeliveryId) -> MealResult<EscrowTransaction> {
        match self.store.find_escrow(delivery_id).await? {
            Some(tx) if tx.status != EscrowStatus::Refunded => Ok(tx),
            _ => Err(MealError::NotLocked {
                delivery_id: delivery_id.to_string(),
            }),
        }
    }

    async fn rail_failure(
        &self,
        delivery_id: &DeliveryId,
        escrow_id: &EscrowId,
        operation: SettlementOperation,
        failure: RailError,
    ) -> MealError {
        let err = failure.into_meal(operation);
        if err.is_ambiguous() {
            self.raise_flag(delivery_id, escrow_id, operation, err.to_string())
                .await;
        } else {
            warn!(
                delivery_id = %delivery_id,
                escrow_id = %escrow_id,
                operation = %operation,
                error = %err,
                "Settlement rail rejected the call"
            );
        }
        err
    }

    /// The rail moved funds; a failed ledger write leaves them unaccounted
    async fn recorded_or_flag(
        &self,
        result: StoreResult<EscrowTransaction>,
        attempted: &EscrowTransaction,
        operation: SettlementOperation,
    ) -> MealResult<EscrowTransaction> {
        match result {
            Ok(tx) => Ok(tx),
            Err(e) => {
                let detail = format!(
                    "rail {} succeeded (tx {}) but ledger write failed: {}",
                    operation,
                    attempted.external_tx_ref.as_deref().unwrap_or("-"),
                    e
                );
                self.raise_flag(&attempted.delivery_id, &attempted.escrow_id, operation, detail)
                    .await;
                Err(e.into())
            }
        }
    }

    async fn raise_flag(
        &self,
        delivery_id: &DeliveryId,
        escrow_id: &EscrowId,
        operation: SettlementOperation,
        detail: String,
    ) {
        error!(
            delivery_id = %delivery_id,
            escrow_id = %escrow_id,
            operation = %operation,
            detail = %detail,
            "Escrow needs reconciliation"
        );

        let flag = ReconciliationFlag::raise(
            delivery_id.clone(),
            escrow_id.clone(),
            operation,
            detail,
            Utc::now(),
        );
        if let Err(e) = self.store.raise_reconciliation_flag(flag).await {
            error!(
                delivery_id = %delivery_id,
                error = %e,
                "Failed to record reconciliation flag"
            );
        }
    }
}
