//! End-to-end delivery and escrow flows over the in-memory ledger

use chrono::Utc;
use futures::future::join_all;
use meal_core::{
    ActorId, CateringId, Delivery, DeliveryStatus, EscrowStatus, IssueSeverity, MealError,
    NewDelivery, NewIssue, ReceiptReport, SchoolId, SettlementOperation,
};
use meal_escrow::{
    MealProgram, MockSettlementRail, PaymentHold, PaymentStatus, ProgramConfig, RailError,
};
use meal_store::{InMemoryLedger, VerificationRepository};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<InMemoryLedger>,
    rail: Arc<MockSettlementRail>,
    program: Arc<MealProgram>,
}

fn harness_with(rail: MockSettlementRail) -> Harness {
    let store = Arc::new(InMemoryLedger::new());
    let rail = Arc::new(rail);
    let program = Arc::new(MealProgram::new(
        store.clone(),
        rail.clone(),
        ProgramConfig::default(),
    ));
    Harness {
        store,
        rail,
        program,
    }
}

fn harness() -> Harness {
    harness_with(MockSettlementRail::new())
}

fn admin() -> ActorId {
    ActorId::new("admin:dinas")
}

fn school() -> SchoolId {
    SchoolId::new("school:sdn-01")
}

fn new_delivery() -> NewDelivery {
    NewDelivery {
        school_id: school(),
        catering_id: CateringId::new("catering:dapur-01"),
        delivery_date: Utc::now().date_naive() + chrono::Duration::days(1),
        portions: 100,
        amount: Decimal::new(1_500_000, 0),
        notes: None,
    }
}

fn receipt(delivery: &Delivery, portions_received: u32, quality_rating: u8) -> ReceiptReport {
    ReceiptReport {
        delivery_id: delivery.id.clone(),
        school_id: delivery.school_id.clone(),
        verified_by: ActorId::new("teacher:siti"),
        portions_received,
        quality_rating,
        notes: None,
        photo_ref: Some("photos/receipt-01.jpg".into()),
    }
}

fn critical_issue(delivery: &Delivery) -> NewIssue {
    NewIssue {
        delivery_id: delivery.id.clone(),
        reported_by: ActorId::new("teacher:siti"),
        issue_type: "food_quality".into(),
        description: "Rice was spoiled on arrival".into(),
        severity: IssueSeverity::Critical,
    }
}

async fn scheduled_delivery(h: &Harness) -> Delivery {
    let delivery = h
        .program
        .lifecycle
        .create(new_delivery(), &admin())
        .await
        .unwrap();
    h.program
        .lifecycle
        .schedule(&delivery.id, &admin())
        .await
        .unwrap()
}

#[tokio::test]
async fn happy_path_verification_releases_escrow() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;

    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Locked);
    assert_eq!(tx.amount, Decimal::new(1_500_000, 0));

    h.program
        .lifecycle
        .mark_delivered(&delivery.id, &admin())
        .await
        .unwrap();

    let result = h
        .program
        .verification
        .submit(receipt(&delivery, 98, 4))
        .await
        .unwrap();
    assert_eq!(result.delivery.status, DeliveryStatus::Verified);
    assert!(result.payment.is_released());
    assert!(result.settlement_reference().is_some());

    let anomaly = result.anomaly.unwrap();
    assert_eq!(anomaly.promised, 100);
    assert_eq!(anomaly.received, 98);
    assert_eq!(anomaly.shortfall, 2);

    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Released);
    assert!(tx.released_at.is_some());
    assert_eq!(h.rail.calls(SettlementOperation::Release, &tx.escrow_id).await, 1);
}

#[tokio::test]
async fn critical_issue_holds_release_then_resolution_pays_out() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;
    h.program
        .lifecycle
        .mark_delivered(&delivery.id, &admin())
        .await
        .unwrap();

    let issue = h.program.issues.report(critical_issue(&delivery)).await.unwrap();
    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Disputed);

    let result = h
        .program
        .verification
        .submit(receipt(&delivery, 100, 2))
        .await
        .unwrap();
    assert_eq!(result.delivery.status, DeliveryStatus::Verified);
    assert!(result.anomaly.is_none());
    match &result.payment {
        PaymentStatus::Pending {
            reason: PaymentHold::Disputed { blocking_issues },
        } => assert_eq!(blocking_issues, &vec![issue.id.clone()]),
        other => panic!("unexpected payment {other:?}"),
    }

    assert!(matches!(
        h.program.escrow.release(&delivery.id, &admin()).await,
        Err(MealError::BlockedByDispute { .. })
    ));
    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Disputed);
    assert_eq!(h.rail.total_calls(SettlementOperation::Release).await, 0);

    // Resolving the only blocker retries the held release
    let resolution = h
        .program
        .issues
        .resolve(&issue.id, Some("Replacement meals delivered".into()), &admin())
        .await
        .unwrap();
    assert!(resolution.released());

    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Released);
    assert_eq!(h.rail.total_calls(SettlementOperation::Release).await, 1);

    let trail = h.program.escrow.audit_trail(&delivery.id).await.unwrap();
    let statuses: Vec<_> = trail.iter().map(|entry| entry.new_status).collect();
    assert_eq!(
        statuses,
        vec![
            EscrowStatus::Locked,
            EscrowStatus::Disputed,
            EscrowStatus::Released
        ]
    );
}

#[tokio::test]
async fn release_waits_for_every_blocker() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;

    let first = h.program.issues.report(critical_issue(&delivery)).await.unwrap();
    let second = h.program.issues.report(critical_issue(&delivery)).await.unwrap();
    h.program
        .verification
        .submit(receipt(&delivery, 100, 3))
        .await
        .unwrap();

    let resolution = h
        .program
        .issues
        .resolve(&first.id, None, &admin())
        .await
        .unwrap();
    assert!(resolution.release.is_none());

    let resolution = h
        .program
        .issues
        .resolve(&second.id, None, &admin())
        .await
        .unwrap();
    assert!(resolution.released());
}

#[tokio::test]
async fn cancel_refunds_and_blocks_rescheduling() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;

    let cancelled = h
        .program
        .lifecycle
        .cancel(&delivery.id, Some("School holiday".into()), &admin())
        .await
        .unwrap();
    assert_eq!(cancelled.status, DeliveryStatus::Cancelled);

    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Refunded);

    assert!(matches!(
        h.program.lifecycle.schedule(&delivery.id, &admin()).await,
        Err(MealError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn verification_from_scheduled_walks_through_delivered() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;

    let result = h
        .program
        .verification
        .submit(receipt(&delivery, 100, 5))
        .await
        .unwrap();
    assert_eq!(result.delivery.status, DeliveryStatus::Verified);
    assert!(result.payment.is_released());
}

#[tokio::test]
async fn verification_guards() {
    let h = harness();
    let pending = h
        .program
        .lifecycle
        .create(new_delivery(), &admin())
        .await
        .unwrap();

    assert!(matches!(
        h.program.verification.submit(receipt(&pending, 100, 4)).await,
        Err(MealError::InvalidDeliveryState { .. })
    ));

    let delivery = scheduled_delivery(&h).await;
    assert!(matches!(
        h.program.verification.submit(receipt(&delivery, 100, 0)).await,
        Err(MealError::Validation { .. })
    ));

    let mut wrong_school = receipt(&delivery, 100, 4);
    wrong_school.school_id = SchoolId::new("school:other");
    assert!(matches!(
        h.program.verification.submit(wrong_school).await,
        Err(MealError::Validation { .. })
    ));

    h.program
        .verification
        .submit(receipt(&delivery, 100, 4))
        .await
        .unwrap();
    // Delivery is verified now, so a second report fails on state first
    assert!(matches!(
        h.program.verification.submit(receipt(&delivery, 100, 4)).await,
        Err(MealError::InvalidDeliveryState { .. })
    ));
}

#[tokio::test]
async fn ambiguous_release_keeps_verification_and_raises_flag() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;
    h.rail
        .fail_next(
            SettlementOperation::Release,
            RailError::ambiguous("connection reset after send"),
        )
        .await;

    let result = h
        .program
        .verification
        .submit(receipt(&delivery, 100, 4))
        .await
        .unwrap();
    assert_eq!(result.delivery.status, DeliveryStatus::Verified);
    assert!(matches!(
        result.payment,
        PaymentStatus::Pending {
            reason: PaymentHold::SettlementFailed {
                needs_reconciliation: true,
                ..
            }
        }
    ));

    let flags = h.program.escrow.reconciliation_flags().await.unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].delivery_id, delivery.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_releases_call_rail_once() {
    let h = harness_with(MockSettlementRail::new().with_latency(Duration::from_millis(10)));
    let delivery = scheduled_delivery(&h).await;
    h.program
        .lifecycle
        .mark_delivered(&delivery.id, &admin())
        .await
        .unwrap();
    h.program
        .lifecycle
        .mark_verified(&delivery.id, &admin())
        .await
        .unwrap();

    let tasks = (0..8).map(|_| {
        let program = h.program.clone();
        let id = delivery.id.clone();
        tokio::spawn(async move { program.escrow.release(&id, &admin()).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let released = results.iter().filter(|r| r.is_ok()).count();
    let already = results
        .iter()
        .filter(|r| matches!(r, Err(MealError::AlreadyReleased { .. })))
        .count();
    assert_eq!(released, 1);
    assert_eq!(already, 7);
    assert_eq!(h.rail.total_calls(SettlementOperation::Release).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_locks_create_one_escrow() {
    let h = harness_with(MockSettlementRail::new().with_latency(Duration::from_millis(10)));
    let delivery = h
        .program
        .lifecycle
        .create(new_delivery(), &admin())
        .await
        .unwrap();

    let tasks = (0..2).map(|_| {
        let program = h.program.clone();
        let id = delivery.id.clone();
        let amount = delivery.amount;
        tokio::spawn(async move { program.escrow.lock(&id, amount, &admin()).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(MealError::AlreadyLocked { .. }))));
    assert_eq!(h.store.escrow_count().await, 1);
    assert_eq!(h.rail.total_calls(SettlementOperation::Lock).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_schedules_have_one_winner() {
    let h = harness_with(MockSettlementRail::new().with_latency(Duration::from_millis(10)));
    let delivery = h
        .program
        .lifecycle
        .create(new_delivery(), &admin())
        .await
        .unwrap();

    let tasks = (0..2).map(|_| {
        let program = h.program.clone();
        let id = delivery.id.clone();
        tokio::spawn(async move { program.lifecycle.schedule(&id, &admin()).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(MealError::InvalidTransition { .. })))
            .count(),
        1
    );
    assert_eq!(h.store.escrow_count().await, 1);

    let current = h.program.lifecycle.get(&delivery.id).await.unwrap();
    assert_eq!(current.status, DeliveryStatus::Scheduled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_during_schedule_refunds_the_lock() {
    let h = harness_with(MockSettlementRail::new().with_latency(Duration::from_millis(100)));
    let delivery = h
        .program
        .lifecycle
        .create(new_delivery(), &admin())
        .await
        .unwrap();

    let schedule = {
        let program = h.program.clone();
        let id = delivery.id.clone();
        tokio::spawn(async move { program.lifecycle.schedule(&id, &admin()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let cancel = h
        .program
        .lifecycle
        .cancel(&delivery.id, Some("Kitchen closed".into()), &admin())
        .await;
    let schedule = schedule.await.unwrap();

    assert!(schedule.is_ok());
    assert!(cancel.is_ok());

    let current = h.program.lifecycle.get(&delivery.id).await.unwrap();
    assert_eq!(current.status, DeliveryStatus::Cancelled);
    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Refunded);
    assert_eq!(h.rail.total_calls(SettlementOperation::Refund).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submit_and_cancel_have_one_winner() {
    let h = harness_with(MockSettlementRail::new().with_latency(Duration::from_millis(30)));
    let delivery = scheduled_delivery(&h).await;

    let submit = {
        let program = h.program.clone();
        let report = receipt(&delivery, 100, 4);
        tokio::spawn(async move { program.verification.submit(report).await })
    };
    let cancel = {
        let program = h.program.clone();
        let id = delivery.id.clone();
        tokio::spawn(async move { program.lifecycle.cancel(&id, None, &admin()).await })
    };
    let submit = submit.await.unwrap();
    let cancel = cancel.await.unwrap();

    let current = h.program.lifecycle.get(&delivery.id).await.unwrap();
    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    let approved = h.store.approved_verification(&delivery.id).await.unwrap();

    match (submit, cancel) {
        (Ok(receipt), Err(MealError::InvalidTransition { .. })) => {
            assert!(receipt.payment.is_released());
            assert_eq!(current.status, DeliveryStatus::Verified);
            assert_eq!(tx.status, EscrowStatus::Released);
            assert!(approved.is_some());
        }
        (Err(MealError::InvalidDeliveryState { .. }), Ok(_)) => {
            assert_eq!(current.status, DeliveryStatus::Cancelled);
            assert_eq!(tx.status, EscrowStatus::Refunded);
            assert!(approved.is_none());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn critical_report_during_release_is_recorded() {
    let h = harness_with(MockSettlementRail::new().with_latency(Duration::from_millis(50)));
    let delivery = scheduled_delivery(&h).await;

    let release = {
        let program = h.program.clone();
        let id = delivery.id.clone();
        tokio::spawn(async move { program.escrow.release(&id, &admin()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let issue = h.program.issues.report(critical_issue(&delivery)).await;

    assert!(release.await.unwrap().is_ok());
    let issue = issue.unwrap();
    assert_eq!(h.program.issues.get(&issue.id).await.unwrap().id, issue.id);

    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Released);
}

#[tokio::test]
async fn ambiguous_release_is_not_retried_by_resolution() {
    let h = harness();
    let delivery = scheduled_delivery(&h).await;
    h.rail
        .fail_next(
            SettlementOperation::Release,
            RailError::ambiguous("gateway timeout"),
        )
        .await;
    let result = h
        .program
        .verification
        .submit(receipt(&delivery, 100, 4))
        .await
        .unwrap();
    assert!(!result.payment.is_released());

    // A blocker raised and resolved afterwards triggers the deferred retry
    let issue = h.program.issues.report(critical_issue(&delivery)).await.unwrap();
    let resolution = h
        .program
        .issues
        .resolve(&issue.id, None, &admin())
        .await
        .unwrap();
    assert!(matches!(
        resolution.release,
        Some(Err(MealError::PendingReconciliation { .. }))
    ));
    assert_eq!(h.rail.total_calls(SettlementOperation::Release).await, 1);

    let tx = h.program.escrow.find(&delivery.id).await.unwrap().unwrap();
    assert_eq!(tx.status, EscrowStatus::Disputed);
}
