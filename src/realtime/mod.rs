//! Streaming AI conversation interface
//!
//! The transport itself lives outside this crate. A connection is a send
//! half (`RealtimeConnection`) plus an event channel carrying transcript
//! fragments, speaking-state changes and explicit turn boundaries.

mod console;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::mpsc;

pub use console::ConsoleService;

use crate::Result;
use crate::media::TrackInfo;
use crate::transcript::Role;

/// Short-lived credential for the streaming service
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at: None,
        }
    }
}

/// Everything needed to open a streaming session
#[derive(Debug)]
pub struct ConnectRequest {
    pub credential: Credential,
    /// Full system instruction, memory context included
    pub system_instruction: String,
    pub audio: TrackInfo,
    pub video: Option<TrackInfo>,
}

/// Events delivered by an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// Partial transcript fragment
    Transcript { role: Role, text: String },
    /// The assistant finished its reply
    TurnComplete,
    /// Voice activity on the user's side
    UserSpeaking(bool),
    /// Assistant audio playback state
    AssistantSpeaking(bool),
    /// The service closed the connection
    Closed { reason: String },
}

/// Send half of an open connection
#[async_trait]
pub trait RealtimeConnection: Send + Sync {
    /// Send a text turn or instruction to the assistant
    ///
    /// # Errors
    ///
    /// Returns error if the connection is closed or the send fails
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Close the connection
    ///
    /// # Errors
    ///
    /// Returns error if the close handshake fails
    async fn disconnect(&self) -> Result<()>;
}

/// An open connection and its event stream
pub struct RealtimeSession {
    pub connection: Arc<dyn RealtimeConnection>,
    pub events: mpsc::Receiver<RealtimeEvent>,
}

/// Factory for streaming connections
#[async_trait]
pub trait RealtimeService: Send + Sync {
    /// Open a connection
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the service rejects the session
    async fn connect(&self, request: ConnectRequest) -> Result<RealtimeSession>;
}
