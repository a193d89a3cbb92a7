//! Tone state machine
//!
//! All mutation goes through `record_resistance`, `record_acceptance` and
//! `record_action_started`. The controller owns one machine per session and
//! calls it under its state lock, so transitions are serialized.

use tokio::time::Instant;

use super::{EmotionalState, ResistanceSignal, Tone, determine_next_tone, instructions};
use crate::config::ToneConfig;

/// Snapshot of the tone state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToneState {
    pub current_tone: Tone,
    pub consecutive_rejections: u32,
    /// Every committed rejection this session, never reset by acceptance
    pub total_rejections: u32,
    pub emotional_state: EmotionalState,
    pub last_tone_change: Option<Instant>,
    pub cycle_index: u8,
    pub has_started_action: bool,
}

/// Resistance-driven tone selector with debounce and cooldown
#[derive(Debug)]
pub struct ToneMachine {
    config: ToneConfig,
    state: ToneState,
    last_signal: Option<(ResistanceSignal, Instant)>,
}

impl ToneMachine {
    #[must_use]
    pub fn new(config: ToneConfig) -> Self {
        Self {
            config,
            state: ToneState::default(),
            last_signal: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &ToneState {
        &self.state
    }

    /// Current tone
    #[must_use]
    pub const fn tone(&self) -> Tone {
        self.state.current_tone
    }

    /// Return to initial values for a new session
    pub fn reset(&mut self) {
        self.state = ToneState::default();
        self.last_signal = None;
    }

    /// Record a resistance signal
    ///
    /// Returns the tone-change instruction when a transition is committed.
    /// Duplicates inside the debounce window, signals after the user started
    /// the task, and signals inside the tone cooldown are dropped without
    /// touching any counter.
    pub fn record_resistance(&mut self, signal: ResistanceSignal, now: Instant) -> Option<String> {
        if let Some((previous, at)) = self.last_signal
            && previous == signal
            && now.saturating_duration_since(at) < self.config.debounce
        {
            tracing::debug!(signal = signal.as_str(), "duplicate resistance signal ignored");
            return None;
        }
        self.last_signal = Some((signal, now));

        if self.state.has_started_action {
            tracing::debug!("resistance ignored, user already started");
            return None;
        }

        if let Some(changed) = self.state.last_tone_change {
            let held = now.saturating_duration_since(changed);
            if held < self.config.min_change_interval {
                tracing::debug!(
                    held_ms = held.as_millis(),
                    tone = %self.state.current_tone,
                    "resistance dropped during tone cooldown"
                );
                return None;
            }
        }

        self.state.consecutive_rejections += 1;
        self.state.total_rejections += 1;
        self.state.emotional_state = signal.emotional_state();

        let (tone, cycle_index) = determine_next_tone(
            self.state.consecutive_rejections,
            self.state.emotional_state,
            self.state.cycle_index,
        );
        self.state.cycle_index = cycle_index;
        self.state.current_tone = tone;
        self.state.last_tone_change = Some(now);

        tracing::info!(
            tone = %tone,
            rejections = self.state.consecutive_rejections,
            resistance = signal.as_str(),
            "tone changed"
        );

        Some(instructions::tone_shift(
            tone,
            self.state.consecutive_rejections,
            signal,
            &chrono::Local::now(),
        ))
    }

    /// Record that the user accepted the current suggestion
    ///
    /// Reverts to friendly when there was outstanding resistance.
    pub fn record_acceptance(&mut self, now: Instant) -> Option<String> {
        if self.state.consecutive_rejections == 0 {
            return None;
        }

        self.state.consecutive_rejections = 0;
        self.state.cycle_index = 0;
        self.state.emotional_state = EmotionalState::Unknown;
        self.state.current_tone = Tone::Friendly;
        self.state.last_tone_change = Some(now);

        tracing::info!("user accepted, tone reverted to friendly");
        Some(instructions::revert_to_friendly(&chrono::Local::now()))
    }

    /// Record that the user started the task
    ///
    /// Only celebrated once, and only if resistance was recorded earlier in
    /// the session. Further resistance is ignored afterwards.
    pub fn record_action_started(&mut self, now: Instant) -> Option<String> {
        if self.state.has_started_action || self.state.total_rejections == 0 {
            return None;
        }

        self.state.has_started_action = true;
        self.state.consecutive_rejections = 0;
        self.state.cycle_index = 0;
        self.state.current_tone = Tone::Friendly;
        self.state.last_tone_change = Some(now);

        tracing::info!(
            rejections_overcome = self.state.total_rejections,
            "user started the task"
        );
        Some(instructions::action_started(
            self.state.total_rejections,
            &chrono::Local::now(),
        ))
    }

    /// Final instruction for a completed session
    #[must_use]
    pub fn completion_celebration(&self) -> String {
        instructions::completion_celebration(self.state.total_rejections, &chrono::Local::now())
    }
}
