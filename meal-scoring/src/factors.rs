//! Issue Factors
//!
//! Deterministic metrics over a school's issue history. Both the advisor
//! prompt and the rule-based fallback are computed from these.

use chrono::{DateTime, Duration, Utc};
use meal_core::Issue;
use serde::{Deserialize, Serialize};

/// Issue history metrics for one school
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFactors {
    pub issue_count: u32,
    /// Severity high or critical
    pub high_severity_count: u32,
    /// Status other than resolved
    pub unresolved_count: u32,
    /// Created within the recent window
    pub recent_issues: u32,
    /// Mean days from creation to resolution, one decimal; 0 if none resolved
    pub avg_resolution_days: f64,
}

impl IssueFactors {
    /// Compute factors as of `now`
    pub fn compute(issues: &[Issue], now: DateTime<Utc>, recent_window_days: i64) -> Self {
        let recent_cutoff = now - Duration::days(recent_window_days);

        let mut factors = Self {
            issue_count: count(issues.len()),
            ..Self::default()
        };
        let mut resolution_days = Vec::new();

        for issue in issues {
            if issue.severity.is_high() {
                factors.high_severity_count += 1;
            }
            if issue.is_unresolved() {
                factors.unresolved_count += 1;
            }
            if issue.created_at >= recent_cutoff {
                factors.recent_issues += 1;
            }
            if let Some(resolved_at) = issue.resolved_at.filter(|_| !issue.is_unresolved()) {
                let seconds = (resolved_at - issue.created_at).num_seconds();
                resolution_days.push(seconds as f64 / 86_400.0);
            }
        }

        if !resolution_days.is_empty() {
            let mean = resolution_days.iter().sum::<f64>() / resolution_days.len() as f64;
            factors.avg_resolution_days = (mean * 10.0).round() / 10.0;
        }
        factors
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, Utc};
    use meal_core::{ActorId, DeliveryId, Issue, IssueId, IssueSeverity, IssueStatus};

    /// An issue created `age_days` ago, resolved after `resolved_after_days` if given
    pub fn issue(
        now: DateTime<Utc>,
        severity: IssueSeverity,
        age_days: i64,
        resolved_after_days: Option<i64>,
    ) -> Issue {
        let created_at = now - Duration::days(age_days);
        let resolved_at = resolved_after_days.map(|d| created_at + Duration::days(d));
        Issue {
            id: IssueId::generate(),
            delivery_id: DeliveryId::new("dlv:1"),
            reported_by: ActorId::new("school:1"),
            issue_type: "late_delivery".into(),
            description: format!("{} issue from {} days ago", severity, age_days),
            severity,
            status: if resolved_at.is_some() {
                IssueStatus::Resolved
            } else {
                IssueStatus::Open
            },
            resolution_notes: None,
            created_at,
            updated_at: resolved_at.unwrap_or(created_at),
            resolved_at,
        }
    }

    /// 6 issues: 2 critical, 3 unresolved, 4 recent, 2 days average resolution
    pub fn troubled_school(now: DateTime<Utc>) -> Vec<Issue> {
        vec![
            issue(now, IssueSeverity::Critical, 2, None),
            issue(now, IssueSeverity::Critical, 5, Some(2)),
            issue(now, IssueSeverity::Medium, 10, None),
            issue(now, IssueSeverity::Low, 20, None),
            issue(now, IssueSeverity::Low, 60, Some(1)),
            issue(now, IssueSeverity::Medium, 90, Some(3)),
        ]
    }
}
