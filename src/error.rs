//! Error types for the coaching session orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Media device a capability error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Camera,
    Microphone,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Microphone => write!(f, "microphone"),
        }
    }
}

/// How an error affects the running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A capability is lost but the session may continue
    Capability,
    /// The session cannot start or continue; resources were released
    Fatal,
    /// Logged and swallowed, never affects session flow
    BestEffort,
}

/// Errors that can occur while orchestrating a session
#[derive(Debug, Error)]
pub enum Error {
    /// The user or platform refused access to a device
    #[error("{0} permission denied")]
    PermissionDenied(Device),

    /// A device failed in a way that may succeed on retry
    #[error("{device} unavailable: {reason}")]
    TransientDevice { device: Device, reason: String },

    /// Config fetch, credential fetch or connection open missed the shared deadline
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(std::time::Duration),

    /// Backend configuration or credential endpoint failed
    #[error("backend config error: {0}")]
    BackendConfig(String),

    /// Streaming connection failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Memory extraction failed
    #[error("memory save failed: {0}")]
    MemorySave(String),

    /// Reward delivery failed
    #[error("reward error: {0}")]
    Reward(String),

    /// Session was terminated while starting
    #[error("session start cancelled")]
    Cancelled,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Classify the error by its effect on the session
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied(_) | Self::TransientDevice { .. } => ErrorKind::Capability,
            Self::MemorySave(_) | Self::Reward(_) => ErrorKind::BestEffort,
            _ => ErrorKind::Fatal,
        }
    }

    /// Whether retrying the same device acquisition may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientDevice { .. })
    }
}
