//! Issues and Disputes
//!
//! Problems reported against a delivery. Status and severity only move
//! forward; there is no reopen path.

use super::ids::{ActorId, DeliveryId, IssueId};
use crate::error::{MealError, MealResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue severity, ordered from least to most severe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Low => "low",
            IssueSeverity::Medium => "medium",
            IssueSeverity::High => "high",
            IssueSeverity::Critical => "critical",
        }
    }

    /// High or critical
    pub fn is_high(&self) -> bool {
        matches!(self, IssueSeverity::High | IssueSeverity::Critical)
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IssueSeverity {
    type Err = MealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(IssueSeverity::Low),
            "medium" => Ok(IssueSeverity::Medium),
            "high" => Ok(IssueSeverity::High),
            "critical" => Ok(IssueSeverity::Critical),
            other => Err(MealError::validation(format!(
                "Invalid issue severity: '{}'. Expected one of: low, medium, high, critical",
                other
            ))),
        }
    }
}

/// Issue status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    Investigating,
    Resolved,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Investigating => "investigating",
            IssueStatus::Resolved => "resolved",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IssueStatus::Open => 0,
            IssueStatus::Investigating => 1,
            IssueStatus::Resolved => 2,
        }
    }

    /// Forward-only: a status may only advance
    pub fn can_advance_to(&self, next: IssueStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Issue record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub delivery_id: DeliveryId,
    pub reported_by: ActorId,
    pub issue_type: String,
    pub description: String,
    pub severity: IssueSeverity,
    pub status: IssueStatus,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Open a new issue
    pub fn open(report: NewIssue, now: DateTime<Utc>) -> MealResult<Self> {
        if report.issue_type.trim().is_empty() {
            return Err(MealError::validation("Issue type must not be empty"));
        }
        if report.description.trim().is_empty() {
            return Err(MealError::validation("Issue description must not be empty"));
        }

        Ok(Self {
            id: IssueId::generate(),
            delivery_id: report.delivery_id,
            reported_by: report.reported_by,
            issue_type: report.issue_type,
            description: report.description,
            severity: report.severity,
            status: IssueStatus::Open,
            resolution_notes: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        })
    }

    pub fn is_unresolved(&self) -> bool {
        self.status != IssueStatus::Resolved
    }

    /// Unresolved with a severity in the given hold set
    pub fn holds_release(&self, blocking: &[IssueSeverity]) -> bool {
        self.is_unresolved() && blocking.contains(&self.severity)
    }

    /// Advance status, stamping resolution details when resolving
    pub fn advance(
        &mut self,
        next: IssueStatus,
        resolution_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> MealResult<()> {
        if !self.status.can_advance_to(next) {
            return Err(MealError::InvalidTransition {
                entity: "Issue".to_string(),
                id: self.id.to_string(),
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        self.status = next;
        self.updated_at = now;
        if next == IssueStatus::Resolved {
            self.resolution_notes = resolution_notes;
            self.resolved_at = Some(now);
        }
        Ok(())
    }

    /// Raise severity; lowering is rejected
    pub fn escalate(&mut self, severity: IssueSeverity, now: DateTime<Utc>) -> MealResult<()> {
        if severity <= self.severity || !self.is_unresolved() {
            return Err(MealError::InvalidTransition {
                entity: "Issue".to_string(),
                id: self.id.to_string(),
                from: self.severity.as_str().to_string(),
                to: severity.as_str().to_string(),
            });
        }
        self.severity = severity;
        self.updated_at = now;
        Ok(())
    }
}

/// Issue report request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewIssue {
    pub delivery_id: DeliveryId,
    pub reported_by: ActorId,
    pub issue_type: String,
    pub description: String,
    pub severity: IssueSeverity,
}
