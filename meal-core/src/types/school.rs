//! School Priority
//!
//! The persisted output of the last successful urgency scoring run.

use super::ids::SchoolId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which path produced a score
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Advisor,
    RuleBased,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Advisor => "advisor",
            ScoreSource::RuleBased => "rule_based",
        }
    }
}

/// Priority record, always replaced as a whole
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchoolPriority {
    pub school_id: SchoolId,
    /// 0 to 100
    pub priority_score: f64,
    pub source: ScoreSource,
    pub reasoning: String,
    pub last_scored_at: DateTime<Utc>,
}
