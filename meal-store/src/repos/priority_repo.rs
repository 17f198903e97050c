//! School Priority Repository

use crate::error::StoreResult;
use async_trait::async_trait;
use meal_core::{SchoolId, SchoolPriority};

/// School priority repository trait
#[async_trait]
pub trait SchoolPriorityRepository: Send + Sync {
    /// Replace a school's priority record as a whole
    async fn put_school_priority(&self, priority: SchoolPriority) -> StoreResult<()>;

    /// Get a school's priority record
    async fn get_school_priority(&self, school_id: &SchoolId)
        -> StoreResult<Option<SchoolPriority>>;
}
