//! Delivery Repository

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use meal_core::{Delivery, DeliveryId, DeliveryStatus, SchoolId};

/// Delivery repository trait
#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    /// Insert a new delivery
    async fn insert_delivery(&self, delivery: Delivery) -> StoreResult<Delivery>;

    /// Get delivery by ID
    async fn find_delivery(&self, id: &DeliveryId) -> StoreResult<Option<Delivery>>;

    /// Get delivery by ID, error if not found
    async fn get_delivery(&self, id: &DeliveryId) -> StoreResult<Delivery> {
        self.find_delivery(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Delivery", id))
    }

    /// Replace the delivery row if its stored status still equals `expected`
    async fn update_delivery(
        &self,
        expected: DeliveryStatus,
        delivery: Delivery,
    ) -> StoreResult<Delivery>;

    /// Deliveries addressed to a school
    async fn deliveries_for_school(&self, school_id: &SchoolId) -> StoreResult<Vec<Delivery>>;
}
