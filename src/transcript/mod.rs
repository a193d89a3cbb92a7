//! Transcript aggregation
//!
//! The streaming service delivers speech as partial fragments, sometimes
//! repeating the same update. The aggregator turns them into whole turns:
//! user fragments accumulate until the assistant starts replying, and each
//! assistant reply is closed by an explicit turn-complete event.

mod dedup;
mod marker;

use serde::{Deserialize, Serialize};

pub use dedup::FragmentDedup;
pub use marker::{TurnMarker, parse_marker};

/// Conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Output of the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Buffered user fragments, flushed as one message
    UserMessage(String),
    /// First chunk of a new assistant reply, with its leading marker
    AssistantTurnStarted(Option<TurnMarker>),
    /// A finished assistant reply, marker stripped
    AssistantMessage(String),
}

/// Buffers and deduplicates streaming transcript fragments
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    dedup: FragmentDedup,
    user_buffer: String,
    assistant_buffer: String,
    assistant_turn_open: bool,
}

impl TranscriptAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text the user has said since the last flush
    #[must_use]
    pub fn pending_user_text(&self) -> &str {
        &self.user_buffer
    }

    /// Whether an assistant reply is in progress
    #[must_use]
    pub const fn assistant_turn_open(&self) -> bool {
        self.assistant_turn_open
    }

    /// Feed one fragment
    pub fn push(&mut self, role: Role, text: &str) -> Vec<TranscriptEvent> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();

        // The user talking over the assistant ends its reply
        if role == Role::User {
            events.extend(self.close_assistant_turn());
        }
        if self.dedup.is_duplicate(role, text) {
            return events;
        }

        match role {
            Role::User => self.user_buffer.push_str(text),
            Role::Assistant if self.assistant_turn_open => {
                self.assistant_buffer.push_str(text);
            }
            Role::Assistant => {
                events.extend(self.take_user_message());

                // Markers only ever lead the first chunk of a reply
                let (marker, rest) = parse_marker(text);
                self.assistant_turn_open = true;
                self.assistant_buffer.push_str(rest);
                events.push(TranscriptEvent::AssistantTurnStarted(marker));
            }
        }

        events
    }

    /// Explicit end of the assistant's reply
    pub fn turn_complete(&mut self) -> Vec<TranscriptEvent> {
        let events = self.close_assistant_turn().into_iter().collect();
        self.dedup.clear();
        events
    }

    /// Flush everything buffered, e.g. at session end
    pub fn flush(&mut self) -> Vec<TranscriptEvent> {
        let mut events: Vec<_> = self.take_user_message().into_iter().collect();
        events.extend(self.close_assistant_turn());
        self.dedup.clear();
        events
    }

    /// Drop all buffered state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn take_user_message(&mut self) -> Option<TranscriptEvent> {
        let text = std::mem::take(&mut self.user_buffer);
        let text = text.trim();
        (!text.is_empty()).then(|| TranscriptEvent::UserMessage(text.to_string()))
    }

    fn close_assistant_turn(&mut self) -> Option<TranscriptEvent> {
        if !self.assistant_turn_open {
            return None;
        }
        self.assistant_turn_open = false;
        self.dedup.clear();

        let text = std::mem::take(&mut self.assistant_buffer);
        let text = text.trim();
        (!text.is_empty()).then(|| TranscriptEvent::AssistantMessage(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::ResistanceSignal;

    #[test]
    fn user_fragments_flush_as_one_message() {
        let mut agg = TranscriptAggregator::new();
        assert!(agg.push(Role::User, "I").is_empty());
        assert!(agg.push(Role::User, " am").is_empty());
        assert!(agg.push(Role::User, " cooking").is_empty());

        let events = agg.push(Role::Assistant, "Nice, what are you making?");
        assert_eq!(
            events,
            vec![
                TranscriptEvent::UserMessage("I am cooking".to_string()),
                TranscriptEvent::AssistantTurnStarted(None),
            ]
        );
    }

    #[test]
    fn repeated_partials_are_dropped() {
        let mut agg = TranscriptAggregator::new();
        agg.push(Role::User, "maybe");
        agg.push(Role::User, "maybe");
        agg.push(Role::User, " later");
        assert_eq!(agg.pending_user_text(), "maybe later");
    }

    #[test]
    fn marker_evaluated_once_per_turn() {
        let mut agg = TranscriptAggregator::new();
        agg.push(Role::User, "not now");

        let first = agg.push(Role::Assistant, "[RESIST:emotional] I hear you.");
        assert!(first.contains(&TranscriptEvent::AssistantTurnStarted(Some(
            TurnMarker::Resistance(ResistanceSignal::Emotional)
        ))));

        // Later chunks never start a turn, even if they look like markers
        assert!(agg.push(Role::Assistant, " [RESIST] Take a breath.").is_empty());

        assert_eq!(
            agg.turn_complete(),
            vec![TranscriptEvent::AssistantMessage(
                "I hear you. [RESIST] Take a breath.".to_string()
            )]
        );
    }

    #[test]
    fn consecutive_assistant_turns_each_start() {
        let mut agg = TranscriptAggregator::new();
        assert_eq!(
            agg.push(Role::Assistant, "Hello!"),
            vec![TranscriptEvent::AssistantTurnStarted(None)]
        );
        agg.turn_complete();
        assert_eq!(
            agg.push(Role::Assistant, "Still there?"),
            vec![TranscriptEvent::AssistantTurnStarted(None)]
        );
    }

    #[test]
    fn user_interrupt_closes_assistant_turn() {
        let mut agg = TranscriptAggregator::new();
        agg.push(Role::Assistant, "Let's start with");
        let events = agg.push(Role::User, "wait");
        assert_eq!(
            events,
            vec![TranscriptEvent::AssistantMessage("Let's start with".to_string())]
        );
        assert!(!agg.assistant_turn_open());
        assert_eq!(agg.pending_user_text(), "wait");
    }

    #[test]
    fn same_text_allowed_in_a_new_turn() {
        let mut agg = TranscriptAggregator::new();
        agg.push(Role::Assistant, "Okay.");
        agg.turn_complete();
        assert_eq!(
            agg.push(Role::Assistant, "Okay."),
            vec![TranscriptEvent::AssistantTurnStarted(None)]
        );
    }

    #[test]
    fn reply_after_interruption_keeps_its_marker() {
        let mut agg = TranscriptAggregator::new();
        agg.push(Role::Assistant, "[RESIST] Okay.");
        agg.push(Role::User, "wait");

        let events = agg.push(Role::Assistant, "[RESIST] Okay.");
        assert_eq!(
            events,
            vec![
                TranscriptEvent::UserMessage("wait".to_string()),
                TranscriptEvent::AssistantTurnStarted(Some(TurnMarker::Resistance(
                    ResistanceSignal::Behavioral
                ))),
            ]
        );
    }

    #[test]
    fn flush_emits_pending_user_text() {
        let mut agg = TranscriptAggregator::new();
        agg.push(Role::User, "bye");
        assert_eq!(
            agg.flush(),
            vec![TranscriptEvent::UserMessage("bye".to_string())]
        );
        assert!(agg.flush().is_empty());
    }
}
