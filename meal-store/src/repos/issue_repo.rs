//! Issue Repository

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use meal_core::{DeliveryId, Issue, IssueId, IssueStatus, SchoolId};

/// Issue repository trait
#[async_trait]
pub trait IssueRepository: Send + Sync {
    /// Insert a new issue
    async fn insert_issue(&self, issue: Issue) -> StoreResult<Issue>;

    /// Get issue by ID
    async fn find_issue(&self, id: &IssueId) -> StoreResult<Option<Issue>>;

    /// Get issue by ID, error if not found
    async fn get_issue(&self, id: &IssueId) -> StoreResult<Issue> {
        self.find_issue(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Issue", id))
    }

    /// Replace the issue row if its stored status still equals `expected`
    async fn update_issue(&self, expected: IssueStatus, issue: Issue) -> StoreResult<Issue>;

    /// Issues reported against a delivery, oldest first
    async fn issues_for_delivery(&self, delivery_id: &DeliveryId) -> StoreResult<Vec<Issue>>;

    /// Issue history of a school across all its deliveries, oldest first
    async fn issues_for_school(&self, school_id: &SchoolId) -> StoreResult<Vec<Issue>>;
}
