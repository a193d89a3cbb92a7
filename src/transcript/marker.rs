//! Leading turn markers in assistant replies
//!
//! The system instruction asks the assistant to open a reply with a marker
//! when it judges the user's last turn. Markers only ever appear at the very
//! start of a reply.

use std::sync::LazyLock;

use regex::Regex;

use crate::tone::ResistanceSignal;

/// Regex for a leading marker, e.g. `[RESIST:emotional]`
static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\[(RESIST|ACCEPT|ACTION_STARTED)(?::\s*(emotional|behavioral))?\]\s*")
        .expect("valid regex")
});

/// Judgement the assistant attached to its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMarker {
    Resistance(ResistanceSignal),
    Acceptance,
    ActionStarted,
}

/// Split a leading marker from the text
///
/// Returns the marker, if any, and the remaining text. A bare `[RESIST]`
/// counts as behavioral resistance.
#[must_use]
pub fn parse_marker(text: &str) -> (Option<TurnMarker>, &str) {
    let Some(caps) = MARKER_REGEX.captures(text) else {
        return (None, text);
    };

    let Some(whole) = caps.get(0) else {
        return (None, text);
    };
    let rest = &text[whole.end()..];

    let kind = caps.get(1).map(|m| m.as_str().to_ascii_uppercase());
    let detail = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());

    let marker = match kind.as_deref() {
        Some("RESIST") => Some(TurnMarker::Resistance(
            if detail.as_deref() == Some("emotional") {
                ResistanceSignal::Emotional
            } else {
                ResistanceSignal::Behavioral
            },
        )),
        Some("ACCEPT") => Some(TurnMarker::Acceptance),
        Some("ACTION_STARTED") => Some(TurnMarker::ActionStarted),
        _ => None,
    };

    (marker, rest)
}
