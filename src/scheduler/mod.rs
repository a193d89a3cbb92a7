//! Virtual message scheduler
//!
//! Detects idle gaps in the conversation and produces proactive prompts.
//! The scheduler never fires while either side is speaking, and every quiet
//! period must outlast the cooldown before a prompt goes out.

mod trigger;

use tokio::time::Instant;

pub use trigger::{TriggerPhase, trigger_token};

use crate::config::SchedulerConfig;

/// Timestamps and live flags the scheduler consults before firing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownState {
    pub last_virtual_message: Option<Instant>,
    pub last_turn_complete: Option<Instant>,
    pub last_user_utterance: Option<Instant>,
    pub user_speaking: bool,
    pub ai_speaking: bool,
}

/// Idle detector for one session
#[derive(Debug)]
pub struct VirtualMessageScheduler {
    config: SchedulerConfig,
    state: CooldownState,
    session_start: Option<Instant>,
    awaiting_virtual_reply: bool,
}

impl VirtualMessageScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: CooldownState::default(),
            session_start: None,
            awaiting_virtual_reply: false,
        }
    }

    /// Poll interval for the driving timer
    #[must_use]
    pub const fn poll_interval(&self) -> std::time::Duration {
        self.config.poll_interval
    }

    #[must_use]
    pub const fn state(&self) -> &CooldownState {
        &self.state
    }

    /// Reset for a session that went active at `now`
    pub fn start(&mut self, now: Instant) {
        self.state = CooldownState::default();
        self.session_start = Some(now);
        self.awaiting_virtual_reply = false;
    }

    /// Forget the session
    pub fn stop(&mut self) {
        self.session_start = None;
        self.awaiting_virtual_reply = false;
    }

    /// Whether a virtual message may fire at `now`
    #[must_use]
    pub fn should_fire(&self, now: Instant) -> bool {
        if self.session_start.is_none() || self.state.user_speaking || self.state.ai_speaking {
            return false;
        }

        let cooled = |at: Option<Instant>| {
            at.is_none_or(|at| now.saturating_duration_since(at) >= self.config.cooldown)
        };

        cooled(self.state.last_virtual_message)
            && cooled(self.state.last_user_utterance)
            && cooled(self.state.last_turn_complete)
    }

    /// Produce the trigger token if all idle conditions hold
    ///
    /// Firing stamps the last-virtual timestamp and marks the next assistant
    /// turn as a reply to this prompt.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        if !self.should_fire(now) {
            return None;
        }

        let elapsed = self
            .session_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();

        self.state.last_virtual_message = Some(now);
        self.awaiting_virtual_reply = true;

        let token = trigger_token(elapsed, &chrono::Local::now());
        tracing::debug!(elapsed_secs = elapsed.as_secs(), %token, "virtual message fired");
        Some(token)
    }

    pub fn set_user_speaking(&mut self, speaking: bool) {
        self.state.user_speaking = speaking;
    }

    pub fn set_ai_speaking(&mut self, speaking: bool) {
        self.state.ai_speaking = speaking;
    }

    /// The user said something; the next assistant turn answers them
    pub fn record_user_utterance(&mut self, now: Instant) {
        self.state.last_user_utterance = Some(now);
        self.awaiting_virtual_reply = false;
    }

    /// An assistant turn finished
    ///
    /// Replies to a virtual prompt do not re-arm the turn cooldown, so a
    /// silent user keeps getting nudged on the virtual cadence alone.
    pub fn record_turn_complete(&mut self, from_virtual: bool, now: Instant) {
        self.state.ai_speaking = false;
        if !from_virtual {
            self.state.last_turn_complete = Some(now);
        }
    }

    /// Close the current assistant turn, attributing it automatically
    ///
    /// Returns whether the turn answered a virtual prompt.
    pub fn complete_turn(&mut self, now: Instant) -> bool {
        let from_virtual = self.awaiting_virtual_reply;
        self.awaiting_virtual_reply = false;
        self.record_turn_complete(from_virtual, now);
        from_virtual
    }
}
