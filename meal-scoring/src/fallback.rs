//! Rule-Based Fallback Score
//!
//! ```text
//! score = min(30, issues·3) + min(30, high·10) + min(25, unresolved·5) + min(15, recent·5)
//! ```

use crate::factors::IssueFactors;

/// Deterministic urgency score in 0..=100
pub fn rule_based_score(factors: &IssueFactors) -> u8 {
    let total = component(factors.issue_count, 3, 30)
        + component(factors.high_severity_count, 10, 30)
        + component(factors.unresolved_count, 5, 25)
        + component(factors.recent_issues, 5, 15);
    // Components cap at 100 in total
    total.min(100) as u8
}

/// Human-readable breakdown recorded with a fallback score
pub fn rule_based_reasoning(factors: &IssueFactors) -> String {
    format!(
        "Rule-based score: {} issues, {} high/critical, {} unresolved, {} recent",
        factors.issue_count,
        factors.high_severity_count,
        factors.unresolved_count,
        factors.recent_issues
    )
}

fn component(count: u32, weight: u32, cap: u32) -> u32 {
    count.saturating_mul(weight).min(cap)
}
