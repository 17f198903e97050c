//! Advisor Reply Parser
//!
//! The advisor is asked for `SCORE: <int>\nREASONING: <text>`. Parsing is
//! isolated here so the fallback decision depends only on [`AdvisorReply`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Score used when a marker is present but no number follows it
pub const DEFAULT_SCORE: u8 = 50;

static SCORE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSCORE\s*:").expect("Invalid score marker regex"));

static SCORE_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSCORE\s*:\s*(-?\d+)").expect("Invalid score value regex"));

static REASONING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bREASONING\s*:\s*(.*)").expect("Invalid reasoning regex"));

/// Parsed advisor reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvisorReply {
    Parsed { score: u8, reasoning: String },
    /// Free text without either marker
    Unparseable,
}

/// Parse an advisor reply
pub fn parse_reply(text: &str) -> AdvisorReply {
    let reasoning = REASONING
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty());

    if !SCORE_MARKER.is_match(text) && !REASONING.is_match(text) {
        return AdvisorReply::Unparseable;
    }

    let score = SCORE_VALUE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| parse_clamped(m.as_str()))
        .unwrap_or(DEFAULT_SCORE);

    AdvisorReply::Parsed {
        score,
        reasoning: reasoning.unwrap_or_else(|| text.trim()).to_string(),
    }
}

fn parse_clamped(token: &str) -> u8 {
    let value = token.parse::<i64>().unwrap_or(if token.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    });
    // Clamped into 0..=100, so the cast is lossless
    value.clamp(0, 100) as u8
}
