//! Advisor Prompt Builder

use crate::factors::IssueFactors;
use meal_core::{Issue, SchoolId};
use std::fmt::Write;

/// Longest description quoted per issue, in characters
const DESCRIPTION_LIMIT: usize = 200;

/// Build the bounded advisor prompt for one school
///
/// Quotes at most `max_issues` high/critical issues, most recent first.
pub fn build_prompt(
    school_id: &SchoolId,
    factors: &IssueFactors,
    issues: &[Issue],
    max_issues: usize,
) -> String {
    let mut severe: Vec<&Issue> = issues.iter().filter(|i| i.severity.is_high()).collect();
    severe.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    severe.truncate(max_issues);

    let mut prompt = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(
        prompt,
        "Rate the urgency of meal delivery problems at school {} on a scale of 0 to 100.",
        school_id
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Issue metrics:");
    let _ = writeln!(prompt, "- Total issues: {}", factors.issue_count);
    let _ = writeln!(
        prompt,
        "- High/critical issues: {}",
        factors.high_severity_count
    );
    let _ = writeln!(prompt, "- Unresolved issues: {}", factors.unresolved_count);
    let _ = writeln!(prompt, "- Recent issues: {}", factors.recent_issues);
    let _ = writeln!(
        prompt,
        "- Average resolution time: {:.1} days",
        factors.avg_resolution_days
    );

    if !severe.is_empty() {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Recent high-severity issues:");
        for issue in severe {
            let _ = writeln!(
                prompt,
                "- [{}] {} ({}, {}): {}",
                issue.created_at.format("%Y-%m-%d"),
                issue.issue_type,
                issue.severity,
                issue.status.as_str(),
                truncate(&issue.description, DESCRIPTION_LIMIT)
            );
        }
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Respond in exactly this format:");
    let _ = writeln!(prompt, "SCORE: <integer 0-100>");
    let _ = write!(prompt, "REASONING: <one or two sentences>");
    prompt
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
