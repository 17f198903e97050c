//! Deliveries
//!
//! A delivery is a promised transfer of N portions from one catering to one
//! school on a date, with a monetary amount.
//!
//! Core invariants:
//! - Status only walks the lifecycle graph; `verified` and `cancelled` are terminal
//! - Amount and portions are frozen once escrow has locked funds
//! - Never physically deleted, cancellation is a status

use super::ids::{CateringId, DeliveryId, SchoolId};
use crate::error::{MealError, MealResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Delivery status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Scheduled,
    Delivered,
    Verified,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Scheduled => "scheduled",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Verified => "verified",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Verified | DeliveryStatus::Cancelled)
    }

    /// Apply a transition, returning the target status if the graph allows it
    pub fn apply(&self, transition: DeliveryTransition) -> Option<DeliveryStatus> {
        match (self, transition) {
            (DeliveryStatus::Pending, DeliveryTransition::Schedule) => Some(DeliveryStatus::Scheduled),
            (DeliveryStatus::Scheduled, DeliveryTransition::Deliver) => Some(DeliveryStatus::Delivered),
            (DeliveryStatus::Delivered, DeliveryTransition::Verify) => Some(DeliveryStatus::Verified),
            (
                DeliveryStatus::Pending | DeliveryStatus::Scheduled | DeliveryStatus::Delivered,
                DeliveryTransition::Cancel,
            ) => Some(DeliveryStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery lifecycle transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTransition {
    Schedule,
    Deliver,
    Verify,
    Cancel,
}

impl DeliveryTransition {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryTransition::Schedule => "schedule",
            DeliveryTransition::Deliver => "deliver",
            DeliveryTransition::Verify => "verify",
            DeliveryTransition::Cancel => "cancel",
        }
    }
}

/// Delivery record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub school_id: SchoolId,
    pub catering_id: CateringId,
    pub delivery_date: NaiveDate,
    pub portions: u32,
    pub amount: Decimal,
    pub status: DeliveryStatus,
    pub notes: Option<String>,
    /// Reason recorded when the delivery was cancelled
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Build a pending delivery from a validated request
    pub fn from_request(request: NewDelivery, now: DateTime<Utc>) -> Self {
        Self {
            id: DeliveryId::generate(),
            school_id: request.school_id,
            catering_id: request.catering_id,
            delivery_date: request.delivery_date,
            portions: request.portions,
            amount: request.amount,
            status: DeliveryStatus::Pending,
            notes: request.notes,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve the target status of a transition or fail with `InvalidTransition`
    pub fn target_of(&self, transition: DeliveryTransition) -> MealResult<DeliveryStatus> {
        self.status
            .apply(transition)
            .ok_or_else(|| MealError::InvalidTransition {
                entity: "Delivery".to_string(),
                id: self.id.to_string(),
                from: self.status.as_str().to_string(),
                to: transition.name().to_string(),
            })
    }

    /// Whether amount and portions may still be edited
    pub fn is_amendable(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }
}

/// Request to create a delivery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDelivery {
    pub school_id: SchoolId,
    pub catering_id: CateringId,
    pub delivery_date: NaiveDate,
    pub portions: u32,
    pub amount: Decimal,
    pub notes: Option<String>,
}

impl NewDelivery {
    /// Validate the request against today's date and a grace window in days
    pub fn validate(&self, today: NaiveDate, grace_days: i64) -> MealResult<()> {
        validate_quantities(self.portions, self.amount)?;

        let earliest = today - chrono::Duration::days(grace_days.max(0));
        if self.delivery_date < earliest {
            return Err(MealError::validation(format!(
                "Delivery date {} is before the earliest accepted date {}",
                self.delivery_date, earliest
            )));
        }

        Ok(())
    }
}

/// Shared portions/amount checks
pub fn validate_quantities(portions: u32, amount: Decimal) -> MealResult<()> {
    if portions == 0 {
        return Err(MealError::validation("Portions must be greater than zero"));
    }
    if amount <= Decimal::ZERO {
        return Err(MealError::validation("Amount must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(date: NaiveDate) -> NewDelivery {
        NewDelivery {
            school_id: SchoolId::new("school:1"),
            catering_id: CateringId::new("catering:1"),
            delivery_date: date,
            portions: 100,
            amount: Decimal::new(1_500_000, 0),
            notes: None,
        }
    }

    #[test]
    fn test_lifecycle_graph() {
        use DeliveryStatus::*;
        use DeliveryTransition::*;

        assert_eq!(Pending.apply(Schedule), Some(Scheduled));
        assert_eq!(Scheduled.apply(Deliver), Some(Delivered));
        assert_eq!(Delivered.apply(Verify), Some(Verified));
        assert_eq!(Pending.apply(Cancel), Some(Cancelled));
        assert_eq!(Scheduled.apply(Cancel), Some(Cancelled));
        assert_eq!(Delivered.apply(Cancel), Some(Cancelled));

        assert_eq!(Pending.apply(Deliver), None);
        assert_eq!(Pending.apply(Verify), None);
        assert_eq!(Scheduled.apply(Schedule), None);
        assert_eq!(Scheduled.apply(Verify), None);
        assert_eq!(Verified.apply(Cancel), None);
        assert_eq!(Cancelled.apply(Schedule), None);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for status in [DeliveryStatus::Verified, DeliveryStatus::Cancelled] {
            assert!(status.is_terminal());
            for t in [
                DeliveryTransition::Schedule,
                DeliveryTransition::Deliver,
                DeliveryTransition::Verify,
                DeliveryTransition::Cancel,
            ] {
                assert_eq!(status.apply(t), None);
            }
        }
    }

    #[test]
    fn test_target_of_reports_invalid_transition() {
        let today = Utc::now().date_naive();
        let delivery = Delivery::from_request(request(today), Utc::now());
        let err = delivery.target_of(DeliveryTransition::Verify).unwrap_err();
        assert!(matches!(err, MealError::InvalidTransition { .. }));
        assert!(err.to_string().contains("pending"));
    }

    #[test]
    fn test_validation() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(request(today).validate(today, 1).is_ok());
        assert!(request(today.pred_opt().unwrap()).validate(today, 1).is_ok());

        let too_old = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(matches!(
            request(too_old).validate(today, 1),
            Err(MealError::Validation { .. })
        ));

        let mut zero_portions = request(today);
        zero_portions.portions = 0;
        assert!(zero_portions.validate(today, 1).is_err());

        let mut negative_amount = request(today);
        negative_amount.amount = Decimal::new(-5, 0);
        assert!(negative_amount.validate(today, 1).is_err());
    }
}
