//! Verification Processor
//!
//! Turns a school's receipt report into an approved verification, moves the
//! delivery to `verified` and attempts the escrow release. The state check,
//! the verification insert and the status writes all happen under the
//! delivery's permit, so a concurrent cancel lands either before (and the
//! submission is refused) or after (and finds a verified delivery).
//!
//! A held or failed release never fails the verification itself: the
//! receipt carries `PaymentStatus::Pending` with the reason, and the release
//! is retried when the blocking issues are resolved.

use crate::escrow::EscrowCoordinator;
use crate::lifecycle::DeliveryLifecycleManager;
use chrono::Utc;
use meal_core::logging::operations;
use meal_core::{
    Delivery, DeliveryStatus, IssueId, MealError, MealResult, PortionAnomaly, QualityRating,
    ReceiptReport, SettlementReference, Verification, VerificationId, VerificationStatus,
};
use meal_store::{LedgerStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Why a verified delivery has not been paid yet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentHold {
    /// Unresolved blocking issues on the delivery
    Disputed { blocking_issues: Vec<IssueId> },
    /// The rail refused or did not confirm the release
    SettlementFailed {
        message: String,
        needs_reconciliation: bool,
    },
    /// No held escrow exists for the delivery
    NoEscrow,
    Other { message: String },
}

impl From<MealError> for PaymentHold {
    fn from(err: MealError) -> Self {
        match err {
            MealError::BlockedByDispute {
                blocking_issues, ..
            } => PaymentHold::Disputed { blocking_issues },
            MealError::NotLocked { .. } => PaymentHold::NoEscrow,
            e @ (MealError::SettlementRail { .. } | MealError::PendingReconciliation { .. }) => {
                PaymentHold::SettlementFailed {
                    needs_reconciliation: e.is_ambiguous(),
                    message: e.to_string(),
                }
            }
            other => PaymentHold::Other {
                message: other.to_string(),
            },
        }
    }
}

/// Payment outcome attached to a verification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentStatus {
    Released { settlement: Option<SettlementReference> },
    Pending { reason: PaymentHold },
}

impl PaymentStatus {
    pub fn is_released(&self) -> bool {
        matches!(self, PaymentStatus::Released { .. })
    }
}

/// Result of a successful submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationReceipt {
    pub verification: Verification,
    pub delivery: Delivery,
    pub payment: PaymentStatus,
    /// Present when received portions differ from the promised count
    pub anomaly: Option<PortionAnomaly>,
}

impl VerificationReceipt {
    /// Settlement reference, once released
    pub fn settlement_reference(&self) -> Option<&SettlementReference> {
        match &self.payment {
            PaymentStatus::Released { settlement } => settlement.as_ref(),
            PaymentStatus::Pending { .. } => None,
        }
    }
}

/// Verification Processor
pub struct VerificationProcessor {
    store: Arc<dyn LedgerStore>,
    lifecycle: Arc<DeliveryLifecycleManager>,
    escrow: Arc<EscrowCoordinator>,
}

impl VerificationProcessor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        lifecycle: Arc<DeliveryLifecycleManager>,
        escrow: Arc<EscrowCoordinator>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            escrow,
        }
    }

    /// Record a school's receipt and attempt payment
    pub async fn submit(&self, report: ReceiptReport) -> MealResult<VerificationReceipt> {
        let quality_rating = QualityRating::new(report.quality_rating)?;

        let permit = self.escrow.permit(&report.delivery_id).await;
        let delivery = self.store.get_delivery(&report.delivery_id).await?;
        if !matches!(
            delivery.status,
            DeliveryStatus::Scheduled | DeliveryStatus::Delivered
        ) {
            return Err(MealError::InvalidDeliveryState {
                delivery_id: delivery.id.to_string(),
                status: delivery.status.as_str().to_string(),
            });
        }
        if self
            .store
            .approved_verification(&delivery.id)
            .await?
            .is_some()
        {
            return Err(MealError::DuplicateVerification {
                delivery_id: delivery.id.to_string(),
            });
        }
        if report.school_id != delivery.school_id {
            return Err(MealError::validation(format!(
                "School {} is not the recipient of delivery {}",
                report.school_id, delivery.id
            )));
        }

        let verification = Verification {
            id: VerificationId::generate(),
            delivery_id: delivery.id.clone(),
            school_id: report.school_id,
            verified_by: report.verified_by.clone(),
            status: VerificationStatus::Approved,
            portions_received: report.portions_received,
            quality_rating,
            notes: report.notes,
            photo_ref: report.photo_ref,
            verified_at: Utc::now(),
        };
        let verification = self
            .store
            .insert_verification(verification)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => MealError::DuplicateVerification {
                    delivery_id: delivery.id.to_string(),
                },
                other => other.into(),
            })?;

        let actor = &report.verified_by;
        if delivery.status == DeliveryStatus::Scheduled {
            self.lifecycle.mark_delivered_within(&permit, actor).await?;
        }
        let verified = self.lifecycle.mark_verified_within(&permit, actor).await?;

        let anomaly = PortionAnomaly::detect(delivery.portions, verification.portions_received);
        if let Some(anomaly) = &anomaly {
            warn!(
                delivery_id = %delivery.id,
                promised = anomaly.promised,
                received = anomaly.received,
                "Received portions differ from promised"
            );
        }

        let payment = match self.escrow.release_within(&permit, actor).await {
            Ok(tx) => PaymentStatus::Released {
                settlement: tx.settlement_reference(),
            },
            Err(MealError::AlreadyReleased { existing, .. }) => PaymentStatus::Released {
                settlement: existing.settlement_reference(),
            },
            Err(e) => {
                warn!(
                    delivery_id = %delivery.id,
                    error = %e,
                    "Delivery verified, payment held"
                );
                PaymentStatus::Pending { reason: e.into() }
            }
        };

        info!(
            delivery_id = %delivery.id,
            verification_id = %verification.id,
            released = payment.is_released(),
            operation = operations::VERIFICATION_SUBMIT,
            "Verification recorded"
        );

        Ok(VerificationReceipt {
            verification,
            delivery: verified,
            payment,
            anomaly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_hold_from_errors() {
        let held: PaymentHold = MealError::BlockedByDispute {
            delivery_id: "dlv:1".into(),
            blocking_issues: vec![IssueId::new("iss:1")],
        }
        .into();
        assert_eq!(
            held,
            PaymentHold::Disputed {
                blocking_issues: vec![IssueId::new("iss:1")]
            }
        );

        let ambiguous: PaymentHold = MealError::rail(
            meal_core::SettlementOperation::Release,
            meal_core::RailFailureKind::Ambiguous,
            "timeout",
        )
        .into();
        assert!(matches!(
            ambiguous,
            PaymentHold::SettlementFailed {
                needs_reconciliation: true,
                ..
            }
        ));
    }

    #[test]
    fn test_payment_status_serializes_tagged() {
        let status = PaymentStatus::Pending {
            reason: PaymentHold::NoEscrow,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["reason"]["kind"], "no_escrow");
    }
}
