//! Append-only message history for one session

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::transcript::Role;

/// One conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Scheduler-injected prompt, never persisted to memory
    pub is_virtual: bool,
}

/// Messages of the current session, timestamps non-decreasing
#[derive(Debug, Default)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current time
    pub fn push(&mut self, role: Role, content: impl Into<String>, is_virtual: bool) -> &Message {
        self.push_at(role, content, is_virtual, Utc::now())
    }

    /// Append a message, clamping `at` to the previous timestamp
    pub fn push_at(
        &mut self,
        role: Role,
        content: impl Into<String>,
        is_virtual: bool,
        at: DateTime<Utc>,
    ) -> &Message {
        let timestamp = self.messages.last().map_or(at, |last| last.timestamp.max(at));
        let index = self.messages.len();
        self.messages.push(Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp,
            is_virtual,
        });
        &self.messages[index]
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages eligible for durable memory
    pub fn durable(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_virtual)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
