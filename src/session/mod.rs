//! Session lifecycle
//!
//! A session is one timed coaching conversation: media devices, a
//! streaming connection, a countdown and the components that adapt the
//! assistant while it runs. [`SessionController`] owns all of it.

mod controller;
mod history;

use std::time::Duration;

use serde::Serialize;

pub use controller::{SessionController, SessionControllerBuilder};
pub use history::{Message, MessageHistory};

use crate::tone::Tone;

/// Lifecycle state of the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Finalizing,
    Ended,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Finalizing => "finalizing",
            Self::Ended => "ended",
        }
    }

    /// Whether resources may be held in this state
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Active | Self::Finalizing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The countdown reached zero
    TimeUp,
    /// The user finished the task early
    TaskCompleted,
}

/// Handed to the completion callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub task_description: String,
    pub completed: bool,
    pub reason: CompletionReason,
    pub duration: Duration,
    pub rejections_overcome: u32,
}

/// Invoked once when a session completes
pub type CompletionCallback = Box<dyn FnOnce(SessionOutcome) + Send + 'static>;

/// Per-session overrides
#[derive(Default)]
pub struct StartOptions {
    pub user_id: Option<String>,
    pub locale: Option<String>,
    pub duration: Option<Duration>,
    pub video: Option<bool>,
    pub on_complete: Option<CompletionCallback>,
}

impl StartOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    #[must_use]
    pub fn with_video(mut self, video: bool) -> Self {
        self.video = Some(video);
        self
    }

    #[must_use]
    pub fn with_on_complete(mut self, callback: impl FnOnce(SessionOutcome) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOptions")
            .field("user_id", &self.user_id)
            .field("locale", &self.locale)
            .field("duration", &self.duration)
            .field("video", &self.video)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Point-in-time view for the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub task_description: String,
    pub remaining_secs: u64,
    pub tone: Tone,
    pub tone_description: &'static str,
    pub rejections: u32,
    pub camera_enabled: bool,
    /// The assistant is watching and has not spoken yet
    pub observing: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.state == SessionState::Connecting
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

/// Lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connecting { task_description: String },
    Active { camera_enabled: bool },
    ToneChanged { tone: Tone, rejections: u32 },
    VirtualMessageSent { content: String },
    ActionStarted { rejections_overcome: u32 },
    StartFailed { error: String },
    ConnectionLost { reason: String },
    MemorySaveDispatched,
    CleanedUp,
    Completed(SessionOutcome),
}
