//! Priority scoring for summaries
//!
//! Scoring starts at a neutral 5 and applies independent additive
//! adjustments, then clamps once to [1, 10]:
//! - live region: likely an announcement the user is waiting for
//! - interactive / form error / heading: structural importance
//! - error keywords: user probably needs to act
//! - addition vs removal: new content matters more than gone content
//!
//! The adjustment values are tuning defaults carried in
//! `PriorityAdjustments`, not fixed law.

use crate::config::PriorityAdjustments;
use crate::event::{ChangeEvent, ChangeKind};
use regex::Regex;
use std::sync::LazyLock;

/// Base score before adjustments
pub const BASE_PRIORITY: i32 = 5;

static ERROR_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|alert|warning)\b").expect("static regex"));

static FORM_ERROR_INDICATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(error|invalid|required|failed|incorrect)\b").expect("static regex")
});

/// Whether the text contains a generic error keyword (error/alert/warning)
pub fn has_error_keyword(text: &str) -> bool {
    ERROR_KEYWORDS.is_match(text)
}

/// Whether the text looks like a form validation problem
pub fn has_form_error_indicator(text: &str) -> bool {
    FORM_ERROR_INDICATORS.is_match(text)
}

/// Score a summary text for the given event. Always in [1, 10].
pub fn score(event: &ChangeEvent, summary_text: &str, adj: &PriorityAdjustments) -> u8 {
    let mut priority = BASE_PRIORITY;

    if event.context.is_live_region {
        priority += adj.live_region as i32;
    }
    if event.context.is_interactive {
        priority += adj.interactive as i32;
    }
    if event.context.is_form && has_form_error_indicator(summary_text) {
        priority += adj.form_error as i32;
    }
    if event.context.role.as_deref() == Some("heading") {
        priority += adj.heading as i32;
    }
    if has_error_keyword(summary_text) {
        priority += adj.error_keyword as i32;
    }
    match event.kind {
        ChangeKind::Addition => priority += adj.addition as i32,
        ChangeKind::Removal => priority += adj.removal as i32,
        ChangeKind::Group => priority += adj.group as i32,
        _ => {}
    }

    priority.clamp(1, 10) as u8
}
