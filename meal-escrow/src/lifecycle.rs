//! Delivery Lifecycle Manager
//!
//! Drives deliveries through `pending → scheduled → delivered → verified`,
//! with `cancelled` reachable from any non-terminal status. Every transition
//! is a compare-and-set on the stored status, so two racing callers cannot
//! both win the same edge.
//!
//! Scheduling locks the escrow and cancelling refunds it. Both hold the
//! delivery's permit from the status write through the escrow step and any
//! compensation, so a cancel cannot slip in between a schedule's status
//! write and its lock. A delivery is never left scheduled without funds or
//! cancelled with funds still held.

use crate::config::LifecycleConfig;
use crate::escrow::EscrowCoordinator;
use crate::guard::DeliveryPermit;
use chrono::Utc;
use meal_core::logging::operations;
use meal_core::{
    validate_quantities, ActorId, Delivery, DeliveryId, DeliveryStatus, DeliveryTransition,
    MealError, MealResult, NewDelivery, SchoolId,
};
use meal_store::{LedgerStore, StoreError};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Delivery Lifecycle Manager
pub struct DeliveryLifecycleManager {
    store: Arc<dyn LedgerStore>,
    escrow: Arc<EscrowCoordinator>,
    config: LifecycleConfig,
}

impl DeliveryLifecycleManager {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        escrow: Arc<EscrowCoordinator>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            escrow,
            config,
        }
    }

    /// Record a new pending delivery
    pub async fn create(&self, request: NewDelivery, actor: &ActorId) -> MealResult<Delivery> {
        let now = Utc::now();
        request.validate(now.date_naive(), self.config.past_date_grace_days)?;

        let delivery = self
            .store
            .insert_delivery(Delivery::from_request(request, now))
            .await?;

        info!(
            delivery_id = %delivery.id,
            school_id = %delivery.school_id,
            catering_id = %delivery.catering_id,
            portions = delivery.portions,
            amount = %delivery.amount,
            actor = %actor,
            operation = operations::DELIVERY_CREATE,
            "Delivery created"
        );
        Ok(delivery)
    }

    pub async fn get(&self, id: &DeliveryId) -> MealResult<Delivery> {
        Ok(self.store.get_delivery(id).await?)
    }

    pub async fn list_for_school(&self, school_id: &SchoolId) -> MealResult<Vec<Delivery>> {
        Ok(self.store.deliveries_for_school(school_id).await?)
    }

    /// `pending → scheduled`, locking the escrow for the delivery amount
    ///
    /// If the lock fails the delivery is returned to `pending` and the lock
    /// error is surfaced.
    pub async fn schedule(&self, id: &DeliveryId, actor: &ActorId) -> MealResult<Delivery> {
        let permit = self.escrow.permit(id).await;
        let current = self.get(id).await?;
        let scheduled = self
            .advance(&current, DeliveryTransition::Schedule, |_| {})
            .await?;

        match self.escrow.lock_within(&permit, scheduled.amount, actor).await {
            Ok(tx) => {
                info!(
                    delivery_id = %id,
                    escrow_id = %tx.escrow_id,
                    actor = %actor,
                    operation = operations::DELIVERY_SCHEDULE,
                    "Delivery scheduled"
                );
                Ok(scheduled)
            }
            Err(e) => {
                warn!(
                    delivery_id = %id,
                    error = %e,
                    "Escrow lock failed, returning delivery to pending"
                );
                self.compensate(&current, DeliveryStatus::Scheduled).await;
                Err(e)
            }
        }
    }

    /// `scheduled → delivered`
    pub async fn mark_delivered(&self, id: &DeliveryId, actor: &ActorId) -> MealResult<Delivery> {
        let permit = self.escrow.permit(id).await;
        self.mark_delivered_within(&permit, actor).await
    }

    pub async fn mark_delivered_within(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
    ) -> MealResult<Delivery> {
        let id = permit.delivery_id();
        let current = self.get(id).await?;
        let delivered = self
            .advance(&current, DeliveryTransition::Deliver, |_| {})
            .await?;

        info!(
            delivery_id = %id,
            actor = %actor,
            operation = operations::DELIVERY_DELIVER,
            "Delivery marked delivered"
        );
        Ok(delivered)
    }

    /// `delivered → verified`; driven by the verification processor
    pub async fn mark_verified(&self, id: &DeliveryId, actor: &ActorId) -> MealResult<Delivery> {
        let permit = self.escrow.permit(id).await;
        self.mark_verified_within(&permit, actor).await
    }

    pub async fn mark_verified_within(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
    ) -> MealResult<Delivery> {
        let id = permit.delivery_id();
        let current = self.get(id).await?;
        let verified = self
            .advance(&current, DeliveryTransition::Verify, |_| {})
            .await?;

        info!(
            delivery_id = %id,
            actor = %actor,
            operation = operations::DELIVERY_VERIFY,
            "Delivery verified"
        );
        Ok(verified)
    }

    /// Cancel a non-terminal delivery, refunding any held escrow
    ///
    /// The cancellation is written first. If the refund then fails the
    /// previous status is restored and the refund error surfaced.
    pub async fn cancel(
        &self,
        id: &DeliveryId,
        reason: Option<String>,
        actor: &ActorId,
    ) -> MealResult<Delivery> {
        let permit = self.escrow.permit(id).await;
        let current = self.get(id).await?;
        let note = reason.clone();
        let cancelled = self
            .advance(&current, DeliveryTransition::Cancel, |d| {
                d.cancel_reason = reason
            })
            .await?;

        if let Err(e) = self.refund_if_held(&permit, actor, note).await {
            warn!(
                delivery_id = %id,
                error = %e,
                "Refund failed, restoring delivery status"
            );
            self.compensate(&current, DeliveryStatus::Cancelled).await;
            return Err(e);
        }

        info!(
            delivery_id = %id,
            from = current.status.as_str(),
            actor = %actor,
            operation = operations::DELIVERY_CANCEL,
            "Delivery cancelled"
        );
        Ok(cancelled)
    }

    /// Change portions and amount while the delivery is still pending
    pub async fn amend(
        &self,
        id: &DeliveryId,
        portions: u32,
        amount: Decimal,
        actor: &ActorId,
    ) -> MealResult<Delivery> {
        let _permit = self.escrow.permit(id).await;
        let current = self.get(id).await?;
        if !current.is_amendable() {
            return Err(MealError::InvalidDeliveryState {
                delivery_id: id.to_string(),
                status: current.status.as_str().to_string(),
            });
        }
        validate_quantities(portions, amount)?;

        let mut next = current.clone();
        next.portions = portions;
        next.amount = amount;
        next.updated_at = Utc::now();

        let amended = self
            .store
            .update_delivery(DeliveryStatus::Pending, next)
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict { id, actual, .. } => MealError::InvalidDeliveryState {
                    delivery_id: id,
                    status: actual,
                },
                other => other.into(),
            })?;

        info!(
            delivery_id = %id,
            portions = portions,
            amount = %amount,
            actor = %actor,
            operation = operations::DELIVERY_AMEND,
            "Delivery amended"
        );
        Ok(amended)
    }

    async fn refund_if_held(
        &self,
        permit: &DeliveryPermit,
        actor: &ActorId,
        note: Option<String>,
    ) -> MealResult<()> {
        match self.escrow.find(permit.delivery_id()).await? {
            Some(tx) if tx.status.is_held() => {
                self.escrow.refund_within(permit, actor, note).await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Compare-and-set `delivery` onto the target of `transition`
    async fn advance(
        &self,
        delivery: &Delivery,
        transition: DeliveryTransition,
        edit: impl FnOnce(&mut Delivery),
    ) -> MealResult<Delivery> {
        let target = delivery.target_of(transition)?;

        let mut next = delivery.clone();
        next.status = target;
        next.updated_at = Utc::now();
        edit(&mut next);

        self.store
            .update_delivery(delivery.status, next)
            .await
            .map_err(|e| match e {
                StoreError::StatusConflict {
                    entity_type,
                    id,
                    actual,
                    ..
                } => MealError::InvalidTransition {
                    entity: entity_type,
                    id,
                    from: actual,
                    to: transition.name().to_string(),
                },
                other => other.into(),
            })
    }

    /// Put `original` back over a row currently in `written`
    async fn compensate(&self, original: &Delivery, written: DeliveryStatus) {
        let mut restored = original.clone();
        restored.updated_at = Utc::now();

        if let Err(e) = self.store.update_delivery(written, restored).await {
            error!(
                delivery_id = %original.id,
                status = original.status.as_str(),
                error = %e,
                "Failed to restore delivery status"
            );
        }
    }
}
