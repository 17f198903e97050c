//! Identifier Types
//!
//! Newtype identifiers, non-interchangeable by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Delivery ID
    DeliveryId,
    "dlv"
);
string_id!(
    /// School ID
    SchoolId,
    "sch"
);
string_id!(
    /// Catering vendor ID
    CateringId,
    "cat"
);
string_id!(
    /// Escrow ID, also the reference handed to the settlement rail
    EscrowId,
    "esc"
);
string_id!(
    /// Verification ID
    VerificationId,
    "ver"
);
string_id!(
    /// Issue ID
    IssueId,
    "iss"
);
string_id!(
    /// Actor reference (school staff, catering staff, administrator, system job)
    ActorId,
    "act"
);

impl ActorId {
    /// The system actor used by automated paths such as deferred releases
    pub fn system() -> Self {
        Self("system".to_string())
    }
}
