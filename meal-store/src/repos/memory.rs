//! In-Memory Ledger
//!
//! A single-writer ledger held behind one `RwLock`: every compare-and-set
//! checks and writes under the same write guard, so a status check and
//! its update cannot interleave with another writer.

use super::{
    DeliveryRepository, EscrowRepository, IssueRepository, SchoolPriorityRepository,
    VerificationRepository,
};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meal_core::{
    ActorId, Delivery, DeliveryId, DeliveryStatus, EscrowAuditEntry, EscrowStatus,
    EscrowTransaction, Issue, IssueId, IssueStatus, ReconciliationFlag, SchoolId, SchoolPriority,
    Verification,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    deliveries: HashMap<DeliveryId, Delivery>,
    /// Keyed by delivery: at most one escrow row per delivery
    escrows: HashMap<DeliveryId, EscrowTransaction>,
    audit: Vec<EscrowAuditEntry>,
    flags: Vec<ReconciliationFlag>,
    verifications: Vec<Verification>,
    issues: HashMap<IssueId, Issue>,
    priorities: HashMap<SchoolId, SchoolPriority>,
}

/// In-memory ledger store
#[derive(Default)]
pub struct InMemoryLedger {
    tables: RwLock<Tables>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of escrow rows
    pub async fn escrow_count(&self) -> usize {
        self.tables.read().await.escrows.len()
    }

    /// Number of deliveries
    pub async fn delivery_count(&self) -> usize {
        self.tables.read().await.deliveries.len()
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryLedger {
    async fn insert_delivery(&self, delivery: Delivery) -> StoreResult<Delivery> {
        let mut tables = self.tables.write().await;
        if tables.deliveries.contains_key(&delivery.id) {
            return Err(StoreError::duplicate("Delivery", &delivery.id));
        }
        tables.deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(delivery)
    }

    async fn find_delivery(&self, id: &DeliveryId) -> StoreResult<Option<Delivery>> {
        Ok(self.tables.read().await.deliveries.get(id).cloned())
    }

    async fn update_delivery(
        &self,
        expected: DeliveryStatus,
        delivery: Delivery,
    ) -> StoreResult<Delivery> {
        let mut tables = self.tables.write().await;
        let current = tables
            .deliveries
            .get_mut(&delivery.id)
            .ok_or_else(|| StoreError::not_found("Delivery", &delivery.id))?;

        if current.status != expected {
            return Err(StoreError::conflict(
                "Delivery",
                &delivery.id,
                expected.as_str(),
                current.status.as_str(),
            ));
        }

        debug!(
            delivery_id = %delivery.id,
            from = %expected,
            to = %delivery.status,
            "Delivery row updated"
        );
        *current = delivery.clone();
        Ok(delivery)
    }

    async fn deliveries_for_school(&self, school_id: &SchoolId) -> StoreResult<Vec<Delivery>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Delivery> = tables
            .deliveries
            .values()
            .filter(|d| &d.school_id == school_id)
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl EscrowRepository for InMemoryLedger {
    async fn insert_escrow(
        &self,
        tx: EscrowTransaction,
        audit: EscrowAuditEntry,
    ) -> StoreResult<EscrowTransaction> {
        let mut tables = self.tables.write().await;
        if tables.escrows.contains_key(&tx.delivery_id) {
            return Err(StoreError::duplicate("EscrowTransaction", &tx.delivery_id));
        }
        tables.escrows.insert(tx.delivery_id.clone(), tx.clone());
        tables.audit.push(audit);
        Ok(tx)
    }

    async fn find_escrow(&self, delivery_id: &DeliveryId) -> StoreResult<Option<EscrowTransaction>> {
        Ok(self.tables.read().await.escrows.get(delivery_id).cloned())
    }

    async fn update_escrow(
        &self,
        expected: EscrowStatus,
        tx: EscrowTransaction,
        audit: EscrowAuditEntry,
    ) -> StoreResult<EscrowTransaction> {
        let mut tables = self.tables.write().await;
        let current = tables
            .escrows
            .get_mut(&tx.delivery_id)
            .ok_or_else(|| StoreError::not_found("EscrowTransaction", &tx.delivery_id))?;

        if current.status != expected {
            return Err(StoreError::conflict(
                "EscrowTransaction",
                &tx.escrow_id,
                expected.as_str(),
                current.status.as_str(),
            ));
        }

        *current = tx.clone();
        tables.audit.push(audit);
        Ok(tx)
    }

    async fn audit_trail(&self, delivery_id: &DeliveryId) -> StoreResult<Vec<EscrowAuditEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .iter()
            .filter(|entry| &entry.delivery_id == delivery_id)
            .cloned()
            .collect())
    }

    async fn raise_reconciliation_flag(&self, flag: ReconciliationFlag) -> StoreResult<()> {
        self.tables.write().await.flags.push(flag);
        Ok(())
    }

    async fn reconciliation_flags(&self) -> StoreResult<Vec<ReconciliationFlag>> {
        Ok(self.tables.read().await.flags.clone())
    }

    async fn clear_reconciliation_flags(
        &self,
        delivery_id: &DeliveryId,
        cleared_by: &ActorId,
        resolution: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Vec<ReconciliationFlag>> {
        let mut tables = self.tables.write().await;
        let mut cleared = Vec::new();
        for flag in tables
            .flags
            .iter_mut()
            .filter(|flag| flag.is_open() && &flag.delivery_id == delivery_id)
        {
            flag.clear(cleared_by.clone(), resolution.to_string(), at);
            cleared.push(flag.clone());
        }
        debug!(delivery_id = %delivery_id, count = cleared.len(), "Reconciliation flags cleared");
        Ok(cleared)
    }
}

#[async_trait]
impl VerificationRepository for InMemoryLedger {
    async fn insert_verification(&self, verification: Verification) -> StoreResult<Verification> {
        let mut tables = self.tables.write().await;
        if verification.is_approved()
            && tables
                .verifications
                .iter()
                .any(|v| v.delivery_id == verification.delivery_id && v.is_approved())
        {
            return Err(StoreError::duplicate(
                "Verification",
                &verification.delivery_id,
            ));
        }
        tables.verifications.push(verification.clone());
        Ok(verification)
    }

    async fn approved_verification(
        &self,
        delivery_id: &DeliveryId,
    ) -> StoreResult<Option<Verification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .verifications
            .iter()
            .find(|v| &v.delivery_id == delivery_id && v.is_approved())
            .cloned())
    }

    async fn verifications_for_delivery(
        &self,
        delivery_id: &DeliveryId,
    ) -> StoreResult<Vec<Verification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .verifications
            .iter()
            .filter(|v| &v.delivery_id == delivery_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IssueRepository for InMemoryLedger {
    async fn insert_issue(&self, issue: Issue) -> StoreResult<Issue> {
        let mut tables = self.tables.write().await;
        if tables.issues.contains_key(&issue.id) {
            return Err(StoreError::duplicate("Issue", &issue.id));
        }
        tables.issues.insert(issue.id.clone(), issue.clone());
        Ok(issue)
    }

    async fn find_issue(&self, id: &IssueId) -> StoreResult<Option<Issue>> {
        Ok(self.tables.read().await.issues.get(id).cloned())
    }

    async fn update_issue(&self, expected: IssueStatus, issue: Issue) -> StoreResult<Issue> {
        let mut tables = self.tables.write().await;
        let current = tables
            .issues
            .get_mut(&issue.id)
            .ok_or_else(|| StoreError::not_found("Issue", &issue.id))?;

        if current.status != expected {
            return Err(StoreError::conflict(
                "Issue",
                &issue.id,
                expected.as_str(),
                current.status.as_str(),
            ));
        }

        *current = issue.clone();
        Ok(issue)
    }

    async fn issues_for_delivery(&self, delivery_id: &DeliveryId) -> StoreResult<Vec<Issue>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Issue> = tables
            .issues
            .values()
            .filter(|i| &i.delivery_id == delivery_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.created_at);
        Ok(rows)
    }

    async fn issues_for_school(&self, school_id: &SchoolId) -> StoreResult<Vec<Issue>> {
        let tables = self.tables.read().await;
        let deliveries: HashSet<&DeliveryId> = tables
            .deliveries
            .values()
            .filter(|d| &d.school_id == school_id)
            .map(|d| &d.id)
            .collect();

        let mut rows: Vec<Issue> = tables
            .issues
            .values()
            .filter(|i| deliveries.contains(&i.delivery_id))
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl SchoolPriorityRepository for InMemoryLedger {
    async fn put_school_priority(&self, priority: SchoolPriority) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .priorities
            .insert(priority.school_id.clone(), priority);
        Ok(())
    }

    async fn get_school_priority(
        &self,
        school_id: &SchoolId,
    ) -> StoreResult<Option<SchoolPriority>> {
        Ok(self.tables.read().await.priorities.get(school_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use meal_core::{
        ActorId, CateringId, EscrowId, IssueSeverity, NewDelivery, NewIssue, QualityRating,
        ScoreSource, VerificationId, VerificationStatus,
    };
    use rust_decimal::Decimal;

    fn delivery(school: &str) -> Delivery {
        Delivery::from_request(
            NewDelivery {
                school_id: SchoolId::new(school),
                catering_id: CateringId::new("catering:1"),
                delivery_date: Utc::now().date_naive(),
                portions: 100,
                amount: Decimal::new(1_500_000, 0),
                notes: None,
            },
            Utc::now(),
        )
    }

    fn locked(d: &Delivery) -> EscrowTransaction {
        EscrowTransaction::locked(
            EscrowId::generate(),
            d.id.clone(),
            d.school_id.clone(),
            d.catering_id.clone(),
            d.amount,
            None,
            Utc::now(),
        )
    }

    fn verification(d: &Delivery) -> Verification {
        Verification {
            id: VerificationId::generate(),
            delivery_id: d.id.clone(),
            school_id: d.school_id.clone(),
            verified_by: ActorId::new("staff:1"),
            status: VerificationStatus::Approved,
            portions_received: 100,
            quality_rating: QualityRating::new(4).unwrap(),
            notes: None,
            photo_ref: None,
            verified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_delivery_compare_and_set() {
        let ledger = InMemoryLedger::new();
        let d = ledger.insert_delivery(delivery("school:1")).await.unwrap();

        let mut scheduled = d.clone();
        scheduled.status = DeliveryStatus::Scheduled;
        ledger
            .update_delivery(DeliveryStatus::Pending, scheduled.clone())
            .await
            .unwrap();

        // Second writer still expecting pending loses
        let err = ledger
            .update_delivery(DeliveryStatus::Pending, scheduled)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { .. }));

        let stored = ledger.get_delivery(&d.id).await.unwrap();
        assert_eq!(stored.status, DeliveryStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_get_missing_delivery() {
        let ledger = InMemoryLedger::new();
        let err = ledger.get_delivery(&DeliveryId::new("nope")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_one_escrow_per_delivery() {
        let ledger = InMemoryLedger::new();
        let d = ledger.insert_delivery(delivery("school:1")).await.unwrap();

        let tx = locked(&d);
        let audit = EscrowAuditEntry::new(&tx, None, ActorId::system(), None);
        ledger.insert_escrow(tx.clone(), audit.clone()).await.unwrap();

        let again = locked(&d);
        let err = ledger.insert_escrow(again, audit).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(ledger.escrow_count().await, 1);
        assert_eq!(ledger.audit_trail(&d.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_escrow_update_writes_audit() {
        let ledger = InMemoryLedger::new();
        let d = ledger.insert_delivery(delivery("school:1")).await.unwrap();
        let tx = locked(&d);
        ledger
            .insert_escrow(tx.clone(), EscrowAuditEntry::new(&tx, None, ActorId::system(), None))
            .await
            .unwrap();

        let mut released = tx.clone();
        released.transition(EscrowStatus::Released, Utc::now()).unwrap();
        let audit = EscrowAuditEntry::new(&released, Some(EscrowStatus::Locked), ActorId::system(), None);
        ledger
            .update_escrow(EscrowStatus::Locked, released.clone(), audit.clone())
            .await
            .unwrap();

        let err = ledger
            .update_escrow(EscrowStatus::Locked, released, audit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { .. }));

        let trail = ledger.audit_trail(&d.id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[1].new_status, EscrowStatus::Released);
    }

    #[tokio::test]
    async fn test_single_approved_verification() {
        let ledger = InMemoryLedger::new();
        let d = ledger.insert_delivery(delivery("school:1")).await.unwrap();

        ledger.insert_verification(verification(&d)).await.unwrap();
        let err = ledger.insert_verification(verification(&d)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let mut pending = verification(&d);
        pending.status = VerificationStatus::Pending;
        ledger.insert_verification(pending).await.unwrap();

        assert!(ledger.approved_verification(&d.id).await.unwrap().is_some());
        assert_eq!(ledger.verifications_for_delivery(&d.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_issues_for_school_joins_deliveries() {
        let ledger = InMemoryLedger::new();
        let a = ledger.insert_delivery(delivery("school:a")).await.unwrap();
        let b = ledger.insert_delivery(delivery("school:b")).await.unwrap();

        for (d, days_ago) in [(&a, 3), (&a, 1), (&b, 2)] {
            let issue = Issue::open(
                NewIssue {
                    delivery_id: d.id.clone(),
                    reported_by: ActorId::new("staff:1"),
                    issue_type: "late".to_string(),
                    description: "Late by two hours".to_string(),
                    severity: IssueSeverity::Low,
                },
                Utc::now() - Duration::days(days_ago),
            )
            .unwrap();
            ledger.insert_issue(issue).await.unwrap();
        }

        let issues = ledger.issues_for_school(&SchoolId::new("school:a")).await.unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].created_at < issues[1].created_at);
        assert!(ledger
            .issues_for_school(&SchoolId::new("school:none"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_priority_replaced_whole() {
        let ledger = InMemoryLedger::new();
        let school = SchoolId::new("school:1");
        for score in [40.0, 72.0] {
            ledger
                .put_school_priority(SchoolPriority {
                    school_id: school.clone(),
                    priority_score: score,
                    source: ScoreSource::RuleBased,
                    reasoning: format!("score {score}"),
                    last_scored_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let stored = ledger.get_school_priority(&school).await.unwrap().unwrap();
        assert_eq!(stored.priority_score, 72.0);
        assert_eq!(stored.reasoning, "score 72");
    }

    #[tokio::test]
    async fn test_clearing_flags_is_per_delivery() {
        let ledger = InMemoryLedger::new();
        let a = delivery("school:1");
        let b = delivery("school:2");
        for d in [&a, &b] {
            ledger
                .raise_reconciliation_flag(ReconciliationFlag::raise(
                    d.id.clone(),
                    EscrowId::generate(),
                    meal_core::SettlementOperation::Release,
                    "read timeout".into(),
                    Utc::now(),
                ))
                .await
                .unwrap();
        }

        let cleared = ledger
            .clear_reconciliation_flags(&a.id, &ActorId::new("ops:1"), "no transfer", Utc::now())
            .await
            .unwrap();
        assert_eq!(cleared.len(), 1);

        assert!(ledger.open_reconciliation_flags(&a.id).await.unwrap().is_empty());
        assert_eq!(ledger.open_reconciliation_flags(&b.id).await.unwrap().len(), 1);
        // Cleared flags stay on record
        assert_eq!(ledger.reconciliation_flags().await.unwrap().len(), 2);
    }
}
