//! Issue / Dispute Tracker
//!
//! Issues move `open → investigating → resolved`, forward only. An
//! unresolved issue whose severity is in the blocking set holds the
//! delivery's escrow release. Reporting or escalating into the blocking set
//! disputes a locked escrow. Resolving the last blocker of a verified
//! delivery retries the held release.
//!
//! The dispute is a side effect of a committed issue: an escrow that is
//! already released or refunded is left alone, and a failed dispute is
//! logged rather than failing the report. Releases re-read the blocking
//! issues themselves, so an undisputed escrow is still held.

use crate::escrow::EscrowCoordinator;
use crate::guard::DeliveryPermit;
use chrono::Utc;
use meal_core::logging::operations;
use meal_core::{
    ActorId, DeliveryStatus, EscrowStatus, EscrowTransaction, Issue, IssueId, IssueSeverity,
    IssueStatus, MealError, MealResult, NewIssue, SchoolId,
};
use meal_store::{LedgerStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of resolving an issue
#[derive(Debug)]
pub struct IssueResolution {
    pub issue: Issue,
    /// Set when the resolution triggered a release retry
    pub release: Option<MealResult<EscrowTransaction>>,
}

impl IssueResolution {
    /// Whether the retry paid out
    pub fn released(&self) -> bool {
        matches!(self.release, Some(Ok(_)))
    }
}

/// Issue / Dispute Tracker
pub struct IssueTracker {
    store: Arc<dyn LedgerStore>,
    escrow: Arc<EscrowCoordinator>,
}

impl IssueTracker {
    pub fn new(store: Arc<dyn LedgerStore>, escrow: Arc<EscrowCoordinator>) -> Self {
        Self { store, escrow }
    }

    /// Open an issue against a delivery
    pub async fn report(&self, report: NewIssue) -> MealResult<Issue> {
        let permit = self.escrow.permit(&report.delivery_id).await;
        self.store.get_delivery(&report.delivery_id).await?;

        let issue = Issue::open(report, Utc::now())?;
        let issue = self.store.insert_issue(issue).await?;

        info!(
            issue_id = %issue.id,
            delivery_id = %issue.delivery_id,
            severity = issue.severity.as_str(),
            actor = %issue.reported_by,
            operation = operations::ISSUE_REPORT,
            "Issue reported"
        );

        self.hold_if_blocking(&permit, &issue, &issue.reported_by).await;
        Ok(issue)
    }

    pub async fn get(&self, id: &IssueId) -> MealResult<Issue> {
        Ok(self.store.get_issue(id).await?)
    }

    pub async fn list_for_school(&self, school_id: &SchoolId) -> MealResult<Vec<Issue>> {
        Ok(self.store.issues_for_school(school_id).await?)
    }

    /// `open → investigating`
    pub async fn start_investigation(&self, id: &IssueId, actor: &ActorId) -> MealResult<Issue> {
        let issue = self.advance(id, IssueStatus::Investigating, None).await?;

        info!(
            issue_id = %id,
            actor = %actor,
            operation = operations::ISSUE_INVESTIGATE,
            "Issue under investigation"
        );
        Ok(issue)
    }

    /// Raise an unresolved issue's severity
    pub async fn escalate(
        &self,
        id: &IssueId,
        severity: IssueSeverity,
        actor: &ActorId,
    ) -> MealResult<Issue> {
        let current = self.store.get_issue(id).await?;
        let permit = self.escrow.permit(&current.delivery_id).await;
        let mut next = current.clone();
        next.escalate(severity, Utc::now())?;

        let issue = self
            .store
            .update_issue(current.status, next)
            .await
            .map_err(|e| conflict_as_transition(e, severity.as_str()))?;

        info!(
            issue_id = %id,
            from = current.severity.as_str(),
            to = issue.severity.as_str(),
            actor = %actor,
            operation = operations::ISSUE_ESCALATE,
            "Issue escalated"
        );

        self.hold_if_blocking(&permit, &issue, actor).await;
        Ok(issue)
    }

    /// Resolve an issue and retry a held release if it was the last blocker
    ///
    /// A failed retry is returned inside the resolution, never as an error:
    /// the issue is resolved either way.
    pub async fn resolve(
        &self,
        id: &IssueId,
        resolution_notes: Option<String>,
        actor: &ActorId,
    ) -> MealResult<IssueResolution> {
        let issue = self
            .advance(id, IssueStatus::Resolved, resolution_notes)
            .await?;

        info!(
            issue_id = %id,
            delivery_id = %issue.delivery_id,
            actor = %actor,
            operation = operations::ISSUE_RESOLVE,
            "Issue resolved"
        );

        let release = self.retry_release(&issue, actor).await?;
        Ok(IssueResolution { issue, release })
    }

    async fn retry_release(
        &self,
        issue: &Issue,
        actor: &ActorId,
    ) -> MealResult<Option<MealResult<EscrowTransaction>>> {
        let permit = self.escrow.permit(&issue.delivery_id).await;
        let delivery = self.store.get_delivery(&issue.delivery_id).await?;
        if delivery.status != DeliveryStatus::Verified {
            return Ok(None);
        }
        match self.escrow.find(&delivery.id).await? {
            Some(tx) if tx.status.is_held() => {}
            _ => return Ok(None),
        }
        if !self.escrow.blocking_issues(&delivery.id).await?.is_empty() {
            debug!(delivery_id = %delivery.id, "Release still held by other issues");
            return Ok(None);
        }

        let result = self.escrow.release_within(&permit, actor).await;
        if let Err(e) = &result {
            warn!(
                delivery_id = %delivery.id,
                error = %e,
                "Deferred release failed"
            );
        }
        Ok(Some(result))
    }

    async fn hold_if_blocking(&self, permit: &DeliveryPermit, issue: &Issue, actor: &ActorId) {
        if !self.escrow.config().is_blocking(issue.severity) {
            return;
        }

        let result = match self.escrow.find(&issue.delivery_id).await {
            Ok(Some(tx)) if tx.status == EscrowStatus::Locked => {
                let note = format!("issue {} ({})", issue.id, issue.severity);
                self.escrow
                    .dispute_within(permit, actor, Some(note))
                    .await
                    .map(|_| ())
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(
                issue_id = %issue.id,
                delivery_id = %issue.delivery_id,
                error = %e,
                "Escrow not disputed for blocking issue"
            );
        }
    }

    async fn advance(
        &self,
        id: &IssueId,
        next_status: IssueStatus,
        resolution_notes: Option<String>,
    ) -> MealResult<Issue> {
        let current = self.store.get_issue(id).await?;
        let mut next = current.clone();
        next.advance(next_status, resolution_notes, Utc::now())?;

        self.store
            .update_issue(current.status, next)
            .await
            .map_err(|e| conflict_as_transition(e, next_status.as_str()))
    }
}

fn conflict_as_transition(err: StoreError, to: &str) -> MealError {
    match err {
        StoreError::StatusConflict {
            entity_type,
            id,
            actual,
            ..
        } => MealError::InvalidTransition {
            entity: entity_type,
            id,
            from: actual,
            to: to.to_string(),
        },
        other => other.into(),
    }
}
