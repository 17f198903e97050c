//! Meal Program Types
//!
//! Naming conventions:
//! - `_id` suffix: Primary key identifiers
//! - `_ref` suffix: External references (settlement rail, photo storage)
//! - `_at` suffix: UTC timestamps

pub mod delivery;
pub mod escrow;
pub mod ids;
pub mod issue;
pub mod school;
pub mod verification;

pub use delivery::*;
pub use escrow::*;
pub use ids::*;
pub use issue::*;
pub use school::*;
pub use verification::*;
