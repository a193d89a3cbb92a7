//! Virtual message trigger tokens
//!
//! Tokens carry no language content. The assistant's system instruction maps
//! each phase to localized phrasing.

use std::time::Duration;

use chrono::{DateTime, TimeZone};

/// Session phase a virtual message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TriggerPhase {
    Opening,
    HalfMinute,
    OneMinute,
    TwoMinutes,
    ThreeMinutes,
    FourMinutes,
    FiveMinutes,
}

impl TriggerPhase {
    /// Phase for the time elapsed since the session went active
    #[must_use]
    pub const fn from_elapsed(elapsed: Duration) -> Self {
        match elapsed.as_secs() {
            0..30 => Self::Opening,
            30..60 => Self::HalfMinute,
            60..120 => Self::OneMinute,
            120..180 => Self::TwoMinutes,
            180..240 => Self::ThreeMinutes,
            240..300 => Self::FourMinutes,
            _ => Self::FiveMinutes,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::HalfMinute => "30s",
            Self::OneMinute => "1m",
            Self::TwoMinutes => "2m",
            Self::ThreeMinutes => "3m",
            Self::FourMinutes => "4m",
            Self::FiveMinutes => "5m",
        }
    }
}

/// Build the trigger token for a virtual message
#[must_use]
pub fn trigger_token<Tz: TimeZone>(elapsed: Duration, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[VIRTUAL phase={} elapsed={}s time={}]",
        TriggerPhase::from_elapsed(elapsed).as_str(),
        elapsed.as_secs(),
        now.format("%H:%M"),
    )
}
