//! Console transport for local simulation
//!
//! The operator plays both sides on stdin:
//!
//! ```text
//! > I don't feel like it     user speech
//! < [RESIST] Fair enough...  assistant reply chunk
//! .                          assistant turn complete
//! /quit                      close the connection
//! ```
//!
//! Everything the orchestrator sends to the assistant is printed to stdout.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ConnectRequest, RealtimeConnection, RealtimeEvent, RealtimeService, RealtimeSession};
use crate::transcript::Role;
use crate::{Error, Result};

/// Event channel capacity
const EVENT_CAPACITY: usize = 64;

/// Console-backed streaming service
#[derive(Debug, Clone, Default)]
pub struct ConsoleService;

struct ConsoleConnection {
    reader: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl RealtimeService for ConsoleService {
    async fn connect(&self, request: ConnectRequest) -> Result<RealtimeSession> {
        println!("--- connected (video: {}) ---", request.video.is_some());
        println!("[system] {}", request.system_instruction);

        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let reader = tokio::spawn(read_stdin(tx));

        Ok(RealtimeSession {
            connection: Arc::new(ConsoleConnection {
                reader: Mutex::new(Some(reader)),
            }),
            events: rx,
        })
    }
}

#[async_trait]
impl RealtimeConnection for ConsoleConnection {
    async fn send_text(&self, text: &str) -> Result<()> {
        let open = self.reader.lock().map(|r| r.is_some()).unwrap_or(false);
        if !open {
            return Err(Error::Connection("console closed".to_string()));
        }
        println!("[to assistant] {text}");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let reader = self.reader.lock().ok().and_then(|mut r| r.take());
        if let Some(reader) = reader {
            reader.abort();
            println!("--- disconnected ---");
        }
        Ok(())
    }
}

/// Translate one console line into transport events
fn parse_line(line: &str) -> Vec<RealtimeEvent> {
    let line = line.trim_end();

    if line == "/quit" {
        return vec![RealtimeEvent::Closed {
            reason: "operator quit".to_string(),
        }];
    }
    if line == "." {
        return vec![
            RealtimeEvent::TurnComplete,
            RealtimeEvent::AssistantSpeaking(false),
        ];
    }
    if let Some(text) = line.strip_prefix('<') {
        return vec![
            RealtimeEvent::AssistantSpeaking(true),
            RealtimeEvent::Transcript {
                role: Role::Assistant,
                text: text.trim_start().to_string(),
            },
        ];
    }

    let text = line.strip_prefix('>').unwrap_or(line).trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![
        RealtimeEvent::UserSpeaking(true),
        RealtimeEvent::Transcript {
            role: Role::User,
            text: text.to_string(),
        },
        RealtimeEvent::UserSpeaking(false),
    ]
}

async fn read_stdin(tx: mpsc::Sender<RealtimeEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                for event in parse_line(&line) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                let _ = tx
                    .send(RealtimeEvent::Closed {
                        reason: "stdin closed".to_string(),
                    })
                    .await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "console read failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lines_bracket_speech() {
        let events = parse_line("> not today");
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            RealtimeEvent::Transcript {
                role: Role::User,
                text: "not today".to_string()
            }
        );
        assert_eq!(events[2], RealtimeEvent::UserSpeaking(false));
    }

    #[test]
    fn bare_lines_are_user_speech() {
        assert_eq!(parse_line("hello").len(), 3);
        assert!(parse_line("   ").is_empty());
    }

    #[test]
    fn assistant_chunk_keeps_marker() {
        let events = parse_line("< [RESIST] Fair enough.");
        assert_eq!(
            events[1],
            RealtimeEvent::Transcript {
                role: Role::Assistant,
                text: "[RESIST] Fair enough.".to_string()
            }
        );
    }

    #[test]
    fn control_lines() {
        assert_eq!(parse_line(".")[0], RealtimeEvent::TurnComplete);
        assert!(matches!(
            parse_line("/quit")[0],
            RealtimeEvent::Closed { .. }
        ));
    }
}
