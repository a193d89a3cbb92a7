//! Coach Orchestrator - timed coaching sessions with an adaptive AI assistant
//!
//! This library provides the session orchestration for a voice/video
//! coaching conversation:
//! - Media and streaming connection setup with bounded retries and one shared deadline
//! - Resistance-driven tone adaptation
//! - Idle detection with proactive prompts
//! - Idempotent teardown and best-effort memory persistence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Session Controller                    │
//! │  Media  │  Countdown  │  Cleanup  │  Snapshots/Events│
//! └────┬──────────┬──────────────┬──────────────────────┘
//!      │          │              │
//! ┌────▼─────┐ ┌──▼────────┐ ┌───▼──────────┐
//! │Transcript│ │   Tone    │ │   Virtual    │
//! │Aggregator│→│  Machine  │ │  Scheduler   │
//! └──────────┘ └─────┬─────┘ └──────┬───────┘
//!                    │ outbound     │
//! ┌──────────────────▼──────────────▼───────────────────┐
//! │   Realtime connection  │  Backend  │  Memory  │ ... │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod media;
pub mod memory;
pub mod realtime;
pub mod rewards;
pub mod scheduler;
pub mod session;
pub mod tone;
pub mod transcript;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use session::{
    SessionController, SessionEvent, SessionOutcome, SessionSnapshot, SessionState, StartOptions,
};
pub use tone::{ResistanceSignal, Tone};
