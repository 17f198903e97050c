//! Batch scoring against ledgers with failing lookups and misbehaving advisors

use async_trait::async_trait;
use chrono::{Duration, Utc};
use meal_core::{
    ActorId, CateringId, Delivery, DeliveryId, Issue, IssueId, IssueSeverity, IssueStatus,
    NewDelivery, SchoolId, ScoreSource,
};
use meal_scoring::{AiAdvisor, MockAdvisor, ScoringConfig, UrgencyScoringEngine};
use meal_store::{
    DeliveryRepository, InMemoryLedger, IssueRepository, SchoolPriorityRepository, StoreError,
    StoreResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Issue repository that delegates to the ledger but fails for one school
struct FlakyIssues {
    inner: Arc<InMemoryLedger>,
    broken: SchoolId,
}

#[async_trait]
impl IssueRepository for FlakyIssues {
    async fn insert_issue(&self, issue: Issue) -> StoreResult<Issue> {
        self.inner.insert_issue(issue).await
    }

    async fn find_issue(&self, id: &IssueId) -> StoreResult<Option<Issue>> {
        self.inner.find_issue(id).await
    }

    async fn update_issue(&self, expected: IssueStatus, issue: Issue) -> StoreResult<Issue> {
        self.inner.update_issue(expected, issue).await
    }

    async fn issues_for_delivery(&self, delivery_id: &DeliveryId) -> StoreResult<Vec<Issue>> {
        self.inner.issues_for_delivery(delivery_id).await
    }

    async fn issues_for_school(&self, school_id: &SchoolId) -> StoreResult<Vec<Issue>> {
        if school_id == &self.broken {
            return Err(StoreError::Database("connection reset".into()));
        }
        self.inner.issues_for_school(school_id).await
    }
}

fn school(n: usize) -> SchoolId {
    SchoolId::new(format!("school:{:02}", n))
}

/// Give a school one delivery carrying `severities.len()` open issues
async fn seed_issues(ledger: &InMemoryLedger, school_id: &SchoolId, severities: &[IssueSeverity]) {
    let now = Utc::now();
    let delivery = ledger
        .insert_delivery(Delivery::from_request(
            NewDelivery {
                school_id: school_id.clone(),
                catering_id: CateringId::new("catering:1"),
                delivery_date: now.date_naive(),
                portions: 80,
                amount: Decimal::new(1_200_000, 0),
                notes: None,
            },
            now,
        ))
        .await
        .unwrap();

    for (i, severity) in severities.iter().enumerate() {
        let created_at = now - Duration::days(i as i64);
        ledger
            .insert_issue(Issue {
                id: IssueId::generate(),
                delivery_id: delivery.id.clone(),
                reported_by: ActorId::new("teacher:1"),
                issue_type: "missing_portions".into(),
                description: "Fewer boxes than ordered".into(),
                severity: *severity,
                status: IssueStatus::Open,
                resolution_notes: None,
                created_at,
                updated_at: created_at,
                resolved_at: None,
            })
            .await
            .unwrap();
    }
}

fn fast_config() -> ScoringConfig {
    ScoringConfig {
        advisor_timeout_ms: 50,
        ..ScoringConfig::default()
    }
}

#[tokio::test]
async fn batch_of_25_survives_one_failed_lookup() {
    let ledger = Arc::new(InMemoryLedger::new());
    for n in 0..25 {
        seed_issues(&ledger, &school(n), &[IssueSeverity::Low, IssueSeverity::High]).await;
    }

    let issues = Arc::new(FlakyIssues {
        inner: ledger.clone(),
        broken: school(7),
    });
    let engine = UrgencyScoringEngine::new(issues, ledger.clone(), None, fast_config());

    let ids: Vec<_> = (0..25).map(school).collect();
    let report = engine.batch_score(&ids, false).await;

    assert_eq!(report.len(), 25);
    assert_eq!(report.lookup_failed, vec![school(7)]);
    assert_eq!(report.fallback_scored, 25);

    let failed = report.get(&school(7)).unwrap();
    assert_eq!(failed.score, 0);
    assert_eq!(failed.factors.issue_count, 0);

    // 2 issues, 1 high, 2 unresolved, 2 recent: 6 + 10 + 10 + 10
    let healthy = report.get(&school(8)).unwrap();
    assert_eq!(healthy.score, 36);
}

#[tokio::test]
async fn batch_store_skips_failed_lookups() {
    let ledger = Arc::new(InMemoryLedger::new());
    for n in 0..3 {
        seed_issues(&ledger, &school(n), &[IssueSeverity::Critical]).await;
    }

    let issues = Arc::new(FlakyIssues {
        inner: ledger.clone(),
        broken: school(1),
    });
    let engine = UrgencyScoringEngine::new(issues, ledger.clone(), None, fast_config());

    let ids: Vec<_> = (0..3).map(school).collect();
    let report = engine.batch_score_and_store(&ids, true).await;

    assert_eq!(report.len(), 3);
    assert_eq!(report.stored, 2);
    assert!(ledger.get_school_priority(&school(0)).await.unwrap().is_some());
    assert!(ledger.get_school_priority(&school(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn hanging_advisor_in_batch_falls_back_per_school() {
    let ledger = Arc::new(InMemoryLedger::new());
    // 6 issues: 2 critical; the helper makes every issue open and recent
    seed_issues(
        &ledger,
        &school(0),
        &[
            IssueSeverity::Critical,
            IssueSeverity::Critical,
            IssueSeverity::Low,
            IssueSeverity::Low,
            IssueSeverity::Medium,
            IssueSeverity::Medium,
        ],
    )
    .await;

    let advisor: Arc<dyn AiAdvisor> = Arc::new(MockAdvisor::hanging());
    let engine = UrgencyScoringEngine::with_store(ledger.clone(), Some(advisor), fast_config());

    let report = engine.batch_score(&[school(0), school(1)], true).await;
    assert_eq!(report.len(), 2);
    assert_eq!(report.advisor_scored, 0);

    // min(30,18) + min(30,20) + min(25,30) + min(15,30)
    let scored = report.get(&school(0)).unwrap();
    assert_eq!(scored.source, ScoreSource::RuleBased);
    assert_eq!(scored.score, 78);
    assert_eq!(report.get(&school(1)).unwrap().score, 0);
}

#[tokio::test]
async fn batch_groups_all_run_with_small_group_size() {
    let ledger = Arc::new(InMemoryLedger::new());
    let advisor = Arc::new(MockAdvisor::replying("SCORE: 55\nREASONING: Moderate."));
    let engine = UrgencyScoringEngine::with_store(
        ledger,
        Some(advisor.clone() as Arc<dyn AiAdvisor>),
        ScoringConfig {
            group_size: 4,
            progress_interval: 5,
            ..fast_config()
        },
    );

    let ids: Vec<_> = (0..11).map(school).collect();
    let report = engine.batch_score(&ids, true).await;

    assert_eq!(report.len(), 11);
    assert_eq!(report.advisor_scored, 11);
    assert_eq!(advisor.call_count(), 11);
    assert!(report.results.values().all(|r| r.score == 55));
}
