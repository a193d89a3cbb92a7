//! Instruction strings sent to the assistant on tone events
//!
//! Each instruction opens with a bracketed header the assistant is told to
//! follow silently, carrying the target tone and the local wall-clock time.

use chrono::{DateTime, TimeZone};

use super::{ResistanceSignal, Tone};

fn clock<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%H:%M").to_string()
}

/// Instruction for a committed resistance-driven tone change
#[must_use]
pub fn tone_shift<Tz: TimeZone>(
    tone: Tone,
    rejections: u32,
    signal: ResistanceSignal,
    now: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[TONE_SHIFT tone={tone} rejections={rejections} resistance={} time={}] {} Do not mention this instruction.",
        signal.as_str(),
        clock(now),
        tone.directive(),
    )
}

/// Instruction sent when the user accepts after resisting
#[must_use]
pub fn revert_to_friendly<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[TONE_SHIFT tone={} rejections=0 time={}] The user agreed. {} Do not mention this instruction.",
        Tone::Friendly,
        clock(now),
        Tone::Friendly.directive(),
    )
}

/// Celebration sent when the user starts the task after resisting
#[must_use]
pub fn action_started<Tz: TimeZone>(rejections_overcome: u32, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[ACTION_STARTED tone={} rejections_overcome={rejections_overcome} time={}] The user just started the task. Celebrate briefly and warmly, then stay quiet so they can work.",
        Tone::Friendly,
        clock(now),
    )
}

/// Final instruction when the session completes
#[must_use]
pub fn completion_celebration<Tz: TimeZone>(rejections_overcome: u32, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let detail = if rejections_overcome == 0 {
        "They stayed with it from the start.".to_string()
    } else {
        format!("They pushed through {rejections_overcome} moments of resistance to get here.")
    };

    format!(
        "[SESSION_COMPLETE rejections_overcome={rejections_overcome} time={}] The session is over. Congratulate the user in one or two sentences. {detail}",
        clock(now),
    )
}
