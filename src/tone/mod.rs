//! Resistance-driven tone adaptation
//!
//! The assistant starts friendly. Each accepted resistance signal moves it
//! along a fixed escalation ladder, then cycles between two high-energy styles.
//! A low mood always pulls the cycle back to a gentle style.

mod instructions;
mod machine;

use serde::{Deserialize, Serialize};

pub use instructions::{action_started, completion_celebration, revert_to_friendly, tone_shift};
pub use machine::{ToneMachine, ToneState};

/// Assistant speaking style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Friendly,
    AcknowledgeTiny,
    CuriousMemory,
    Gentle,
    ToughLove,
    AbsurdHumor,
}

impl Tone {
    /// Stable identifier used in instructions
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::AcknowledgeTiny => "acknowledge_tiny",
            Self::CuriousMemory => "curious_memory",
            Self::Gentle => "gentle",
            Self::ToughLove => "tough_love",
            Self::AbsurdHumor => "absurd_humor",
        }
    }

    /// Short human-readable description for the presentation layer
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Friendly => "Warm and encouraging",
            Self::AcknowledgeTiny => "Acknowledges the hesitation, asks for one tiny step",
            Self::CuriousMemory => "Curious, recalls what worked before",
            Self::Gentle => "Soft and patient, no pressure",
            Self::ToughLove => "Direct and firm, names the avoidance",
            Self::AbsurdHumor => "Playful and absurd to break the stalemate",
        }
    }

    /// Style directive handed to the assistant
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Friendly => {
                "Be warm and upbeat. Keep replies short and move toward starting the task."
            }
            Self::AcknowledgeTiny => {
                "Acknowledge that starting is hard, then propose the smallest possible first step."
            }
            Self::CuriousMemory => {
                "Ask one curious question about what is in the way, and reference anything you remember about the user."
            }
            Self::Gentle => {
                "Slow down. Validate how the user feels, offer support, and do not push for action."
            }
            Self::ToughLove => {
                "Be direct. Name the avoidance plainly and ask for a commitment to start right now."
            }
            Self::AbsurdHumor => {
                "Use an absurd, playful exaggeration to lighten the mood, then invite a tiny action."
            }
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inferred emotional context of the user's resistance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    #[default]
    Unknown,
    LowMood,
    Procrastinating,
}

/// A detected instance of the user declining or avoiding the requested action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceSignal {
    /// Resistance rooted in how the user feels
    Emotional,
    /// Avoidance, excuses, stalling
    Behavioral,
}

impl ResistanceSignal {
    /// Emotional context implied by this signal
    #[must_use]
    pub const fn emotional_state(self) -> EmotionalState {
        match self {
            Self::Emotional => EmotionalState::LowMood,
            Self::Behavioral => EmotionalState::Procrastinating,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emotional => "emotional",
            Self::Behavioral => "behavioral",
        }
    }
}

/// Select the tone for a rejection count
///
/// Returns the tone and the updated cycle index. Counts 1–4 follow a fixed
/// ladder; beyond that the cycle index flips on every call, alternating
/// tough love and absurd humor. A low mood overrides the third step and every
/// cycled step with [`Tone::Gentle`].
#[must_use]
pub const fn determine_next_tone(
    rejection_count: u32,
    emotional_state: EmotionalState,
    cycle_index: u8,
) -> (Tone, u8) {
    let low_mood = matches!(emotional_state, EmotionalState::LowMood);

    match rejection_count {
        0 => (Tone::Friendly, cycle_index),
        1 => (Tone::AcknowledgeTiny, cycle_index),
        2 => (Tone::CuriousMemory, cycle_index),
        3 => {
            if low_mood {
                (Tone::Gentle, 0)
            } else {
                (Tone::ToughLove, 0)
            }
        }
        4 => (Tone::AbsurdHumor, 1),
        _ => {
            let next = if cycle_index == 0 { 1 } else { 0 };
            if low_mood {
                (Tone::Gentle, next)
            } else if next == 0 {
                (Tone::ToughLove, next)
            } else {
                (Tone::AbsurdHumor, next)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ladder_for_first_four() {
        let e = EmotionalState::Procrastinating;
        assert_eq!(determine_next_tone(1, e, 0).0, Tone::AcknowledgeTiny);
        assert_eq!(determine_next_tone(2, e, 0).0, Tone::CuriousMemory);
        assert_eq!(determine_next_tone(3, e, 1), (Tone::ToughLove, 0));
        assert_eq!(determine_next_tone(4, e, 0), (Tone::AbsurdHumor, 1));
    }

    #[test]
    fn third_step_is_gentle_when_low() {
        assert_eq!(
            determine_next_tone(3, EmotionalState::LowMood, 0),
            (Tone::Gentle, 0)
        );
    }

    #[test]
    fn zero_rejections_is_friendly() {
        assert_eq!(
            determine_next_tone(0, EmotionalState::Unknown, 1),
            (Tone::Friendly, 1)
        );
    }

    #[test]
    fn cycle_alternates_beyond_four() {
        let e = EmotionalState::Procrastinating;
        let (_, mut cycle) = determine_next_tone(4, e, 0);
        let mut seen = Vec::new();
        for count in 5..=10 {
            let (tone, next) = determine_next_tone(count, e, cycle);
            seen.push(tone);
            cycle = next;
        }
        assert_eq!(
            seen,
            vec![
                Tone::ToughLove,
                Tone::AbsurdHumor,
                Tone::ToughLove,
                Tone::AbsurdHumor,
                Tone::ToughLove,
                Tone::AbsurdHumor,
            ]
        );
    }

    #[test]
    fn low_mood_overrides_cycle() {
        let mut cycle = 1;
        for count in 5..=9 {
            let (tone, next) = determine_next_tone(count, EmotionalState::LowMood, cycle);
            assert_eq!(tone, Tone::Gentle);
            assert_ne!(next, cycle, "cycle index still flips under low mood");
            cycle = next;
        }
    }

    #[test]
    fn signal_maps_to_emotional_state() {
        assert_eq!(
            ResistanceSignal::Emotional.emotional_state(),
            EmotionalState::LowMood
        );
        assert_eq!(
            ResistanceSignal::Behavioral.emotional_state(),
            EmotionalState::Procrastinating
        );
    }

    #[test]
    fn every_tone_has_copy() {
        for tone in [
            Tone::Friendly,
            Tone::AcknowledgeTiny,
            Tone::CuriousMemory,
            Tone::Gentle,
            Tone::ToughLove,
            Tone::AbsurdHumor,
        ] {
            assert!(!tone.description().is_empty());
            assert!(!tone.directive().is_empty());
            assert_eq!(tone.to_string(), tone.as_str());
        }
    }
}
