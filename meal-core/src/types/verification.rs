//! Receipt Verification
//!
//! A school's attestation that a delivery arrived. At most one approved
//! verification exists per delivery.

use super::ids::{ActorId, DeliveryId, SchoolId, VerificationId};
use crate::error::{MealError, MealResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verification status
///
/// Only `Approved` is produced today; `Pending` and `Rejected` exist for a
/// human review path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// Quality rating, 1 to 5 inclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QualityRating(u8);

impl QualityRating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> MealResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(MealError::validation(format!(
                "Quality rating {} outside {}..={}",
                value,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for QualityRating {
    type Error = MealError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QualityRating> for u8 {
    fn from(rating: QualityRating) -> Self {
        rating.0
    }
}

/// Verification record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub id: VerificationId,
    pub delivery_id: DeliveryId,
    pub school_id: SchoolId,
    pub verified_by: ActorId,
    pub status: VerificationStatus,
    pub portions_received: u32,
    pub quality_rating: QualityRating,
    pub notes: Option<String>,
    pub photo_ref: Option<String>,
    pub verified_at: DateTime<Utc>,
}

impl Verification {
    pub fn is_approved(&self) -> bool {
        self.status == VerificationStatus::Approved
    }
}

/// Receipt report submitted by a school
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceiptReport {
    pub delivery_id: DeliveryId,
    pub school_id: SchoolId,
    pub verified_by: ActorId,
    pub portions_received: u32,
    pub quality_rating: u8,
    pub notes: Option<String>,
    pub photo_ref: Option<String>,
}

/// Mismatch between promised and received portions
///
/// Signalled for review, never blocks the verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortionAnomaly {
    pub promised: u32,
    pub received: u32,
    /// Positive when fewer portions arrived than promised
    pub shortfall: i64,
}

impl PortionAnomaly {
    pub fn detect(promised: u32, received: u32) -> Option<Self> {
        if promised == received {
            return None;
        }
        Some(Self {
            promised,
            received,
            shortfall: i64::from(promised) - i64::from(received),
        })
    }
}
