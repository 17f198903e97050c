//! Issue Export
//!
//! A JSON export of `{ school_id, issues[] }` records, served through the
//! ledger repository traits so the scoring engine runs over it unchanged.
//! Issues are read-only; priorities written back are kept in memory.

use crate::error::{CliError, CliResult};
use async_trait::async_trait;
use meal_core::{DeliveryId, Issue, IssueId, IssueStatus, SchoolId, SchoolPriority};
use meal_store::{IssueRepository, SchoolPriorityRepository, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// One record of the export
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchoolIssues {
    pub school_id: SchoolId,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

/// Issue history loaded from an export
pub struct IssueExport {
    /// Schools in order of first appearance
    schools: Vec<SchoolId>,
    issues: HashMap<SchoolId, Vec<Issue>>,
    priorities: RwLock<HashMap<SchoolId, SchoolPriority>>,
}

impl IssueExport {
    /// Build from records; repeated schools are merged
    pub fn from_records(records: Vec<SchoolIssues>) -> Self {
        let mut schools = Vec::new();
        let mut issues: HashMap<SchoolId, Vec<Issue>> = HashMap::new();

        for record in records {
            let entry = issues.entry(record.school_id.clone()).or_insert_with(|| {
                schools.push(record.school_id.clone());
                Vec::new()
            });
            entry.extend(record.issues);
        }

        for history in issues.values_mut() {
            history.sort_by_key(|issue| issue.created_at);
        }

        Self {
            schools,
            issues,
            priorities: RwLock::new(HashMap::new()),
        }
    }

    /// Parse an export document
    pub fn from_json(json: &str) -> CliResult<Self> {
        let records: Vec<SchoolIssues> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    /// Read and parse an export file
    pub async fn load(path: &Path) -> CliResult<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        serde_json::from_str::<Vec<SchoolIssues>>(&json)
            .map(Self::from_records)
            .map_err(|e| CliError::input(path.display().to_string(), e.to_string()))
    }

    pub fn school_ids(&self) -> &[SchoolId] {
        &self.schools
    }

    pub fn issue_count(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }

    /// Priorities written back so far, most urgent first
    pub async fn priorities(&self) -> Vec<SchoolPriority> {
        let mut priorities: Vec<_> = self.priorities.read().await.values().cloned().collect();
        priorities.sort_by(|a, b| {
            b.priority_score
                .total_cmp(&a.priority_score)
                .then_with(|| a.school_id.cmp(&b.school_id))
        });
        priorities
    }

    fn read_only() -> StoreError {
        StoreError::Database("issue export is read-only".into())
    }
}

#[async_trait]
impl IssueRepository for IssueExport {
    async fn insert_issue(&self, _issue: Issue) -> StoreResult<Issue> {
        Err(Self::read_only())
    }

    async fn find_issue(&self, id: &IssueId) -> StoreResult<Option<Issue>> {
        Ok(self
            .issues
            .values()
            .flatten()
            .find(|issue| &issue.id == id)
            .cloned())
    }

    async fn update_issue(&self, _expected: IssueStatus, _issue: Issue) -> StoreResult<Issue> {
        Err(Self::read_only())
    }

    async fn issues_for_delivery(&self, delivery_id: &DeliveryId) -> StoreResult<Vec<Issue>> {
        let mut found: Vec<Issue> = self
            .issues
            .values()
            .flatten()
            .filter(|issue| &issue.delivery_id == delivery_id)
            .cloned()
            .collect();
        found.sort_by_key(|issue| issue.created_at);
        Ok(found)
    }

    async fn issues_for_school(&self, school_id: &SchoolId) -> StoreResult<Vec<Issue>> {
        Ok(self.issues.get(school_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SchoolPriorityRepository for IssueExport {
    async fn put_school_priority(&self, priority: SchoolPriority) -> StoreResult<()> {
        self.priorities
            .write()
            .await
            .insert(priority.school_id.clone(), priority);
        Ok(())
    }

    async fn get_school_priority(
        &self,
        school_id: &SchoolId,
    ) -> StoreResult<Option<SchoolPriority>> {
        Ok(self.priorities.read().await.get(school_id).cloned())
    }
}
