//! Output Formatting

use crate::commands::OutputFormat;
use meal_core::SchoolId;
use meal_scoring::{BatchScoreReport, ScoreResult};
use serde::Serialize;
use std::fmt::Write;

/// Batch report with results ranked most urgent first
#[derive(Debug, Serialize)]
pub struct RankedReport<'a> {
    pub schools: Vec<&'a ScoreResult>,
    pub advisor_scored: usize,
    pub fallback_scored: usize,
    pub lookup_failed: &'a [SchoolId],
    pub stored: usize,
    pub duration_ms: u64,
}

impl<'a> RankedReport<'a> {
    pub fn new(report: &'a BatchScoreReport) -> Self {
        let mut schools: Vec<_> = report.results.values().collect();
        schools.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.school_id.cmp(&b.school_id))
        });
        Self {
            schools,
            advisor_scored: report.advisor_scored,
            fallback_scored: report.fallback_scored,
            lookup_failed: &report.lookup_failed,
            stored: report.stored,
            duration_ms: report.duration_ms,
        }
    }
}

/// Print a batch report
pub fn print_batch_report(report: &BatchScoreReport, format: OutputFormat) {
    let ranked = RankedReport::new(report);
    match format {
        OutputFormat::Json => print_json(&ranked),
        OutputFormat::Table => print!("{}", render_table(&ranked)),
        OutputFormat::Plain => print!("{}", render_plain(&ranked)),
    }
}

/// Print as JSON
fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// One aligned row per school, then a summary
pub fn render_table(report: &RankedReport<'_>) -> String {
    let width = report
        .schools
        .iter()
        .map(|r| r.school_id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("SCHOOL".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>5}  {:<10}  {:>6}  {:>4}  {:>4}  {:>6}",
        "SCHOOL", "SCORE", "SOURCE", "ISSUES", "HIGH", "OPEN", "RECENT"
    );
    let _ = writeln!(out, "{}", "-".repeat(width + 47));
    for r in &report.schools {
        let _ = writeln!(
            out,
            "{:<width$}  {:>5}  {:<10}  {:>6}  {:>4}  {:>4}  {:>6}",
            r.school_id.as_str(),
            r.score,
            r.source.as_str(),
            r.factors.issue_count,
            r.factors.high_severity_count,
            r.factors.unresolved_count,
            r.factors.recent_issues
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Scored {} schools ({} advisor, {} rule-based) in {}ms, {} priorities stored",
        report.schools.len(),
        report.advisor_scored,
        report.fallback_scored,
        report.duration_ms,
        report.stored
    );
    if !report.lookup_failed.is_empty() {
        let failed: Vec<_> = report.lookup_failed.iter().map(SchoolId::as_str).collect();
        let _ = writeln!(out, "Lookup failed: {}", failed.join(", "));
    }
    out
}

/// `school score source reasoning`, one line each
pub fn render_plain(report: &RankedReport<'_>) -> String {
    let mut out = String::new();
    for r in &report.schools {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            r.school_id,
            r.score,
            r.source.as_str(),
            r.reasoning.replace('\n', " ")
        );
    }
    out
}
