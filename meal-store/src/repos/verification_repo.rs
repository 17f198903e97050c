//! Verification Repository

use crate::error::StoreResult;
use async_trait::async_trait;
use meal_core::{DeliveryId, Verification};

/// Verification repository trait
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Insert a verification; `Duplicate` if it is approved and an approved
    /// one already exists for the delivery
    async fn insert_verification(&self, verification: Verification) -> StoreResult<Verification>;

    /// The approved verification of a delivery, if any
    async fn approved_verification(
        &self,
        delivery_id: &DeliveryId,
    ) -> StoreResult<Option<Verification>>;

    /// All verifications of a delivery
    async fn verifications_for_delivery(
        &self,
        delivery_id: &DeliveryId,
    ) -> StoreResult<Vec<Verification>>;
}
