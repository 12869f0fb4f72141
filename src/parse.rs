//! Best-effort extraction of a score and improvement list from free-form
//! oracle text.
//!
//! There is no schema to rely on. The score is the first `score` token
//! followed by a short integer. Improvements are the lines after the first
//! `improvement(s)` anchor; without an anchor, the lines after the first
//! non-empty line are used instead.

use crate::types::summary::{QualitySummary, MAX_IMPROVEMENTS, MAX_SCORE};
use regex::Regex;
use std::sync::OnceLock;

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)score\s*[:\-]?\s*(\d{1,3})").expect("score pattern is valid")
    })
}

fn improvement_anchor() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)improvements?[:\-]?").expect("improvement pattern is valid")
    })
}

pub fn extract(raw_text: &str) -> QualitySummary {
    QualitySummary {
        score: extract_score(raw_text),
        improvements: extract_improvements(raw_text),
    }
}

/// Scores above 100 are clamped.
pub fn extract_score(raw_text: &str) -> Option<u8> {
    let captures = score_pattern().captures(raw_text)?;
    let value = captures.get(1)?.as_str().parse::<u16>().ok()?;
    let clamped = value.min(u16::from(MAX_SCORE));
    if clamped != value {
        tracing::debug!(value, "clamping out-of-range score");
    }
    u8::try_from(clamped).ok()
}

pub fn extract_improvements(raw_text: &str) -> Vec<String> {
    match improvement_anchor().find(raw_text) {
        Some(anchor) => non_empty_lines(&raw_text[anchor.end()..])
            .take(MAX_IMPROVEMENTS)
            .collect(),
        None => non_empty_lines(raw_text)
            .skip(1)
            .take(MAX_IMPROVEMENTS)
            .collect(),
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}
