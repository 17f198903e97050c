//! Per-Delivery Serialization
//!
//! Every state change of one delivery, whether lifecycle, verification,
//! issue or escrow, runs while holding that delivery's [`DeliveryPermit`].
//! Multi-step operations (status write, rail call, compensation) hold one
//! permit throughout. Different deliveries proceed in parallel.
//! Cross-process exclusion still rests on the ledger's compare-and-set.

use meal_core::DeliveryId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Prune idle entries once the map grows past this size
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusive access to one delivery until dropped
pub struct DeliveryPermit {
    delivery_id: DeliveryId,
    _slot: OwnedMutexGuard<()>,
}

impl DeliveryPermit {
    pub fn delivery_id(&self) -> &DeliveryId {
        &self.delivery_id
    }
}

/// Registry of per-delivery mutexes
#[derive(Default)]
pub struct DeliveryGuards {
    slots: Mutex<HashMap<DeliveryId, Arc<Mutex<()>>>>,
}

impl DeliveryGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one delivery
    pub async fn acquire(&self, delivery_id: &DeliveryId) -> DeliveryPermit {
        let slot = {
            let mut slots = self.slots.lock().await;
            if slots.len() >= PRUNE_THRESHOLD {
                // Only the map holds a reference to an idle slot
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots
                .entry(delivery_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        DeliveryPermit {
            delivery_id: delivery_id.clone(),
            _slot: slot.lock_owned().await,
        }
    }

    /// Number of tracked deliveries
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
