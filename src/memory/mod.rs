//! Memory persistence gateway
//!
//! At session end the durable part of the conversation is handed to an
//! extraction service that turns it into facts for future sessions. The
//! save is dispatched in the background and never blocks teardown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::session::Message;
use crate::transcript::Role;
use crate::{Error, Result};

/// Upper bound for one extraction request
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Message as sent to the extraction service
#[derive(Debug, Clone, Serialize)]
pub struct MemoryMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One finished session, ready for extraction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryExtractionRequest {
    pub user_id: String,
    pub task_description: String,
    pub locale: String,
    pub messages: Vec<MemoryMessage>,
    pub completed: bool,
    pub duration_secs: u64,
    pub rejections_overcome: u32,
}

impl MemoryExtractionRequest {
    /// Build a request from session history
    ///
    /// Virtual messages are dropped. Returns `None` when the user never
    /// spoke, since there is nothing to remember.
    #[must_use]
    pub fn from_history(
        messages: &[Message],
        user_id: &str,
        task_description: &str,
        locale: &str,
    ) -> Option<Self> {
        let messages: Vec<MemoryMessage> = messages
            .iter()
            .filter(|m| !m.is_virtual)
            .map(|m| MemoryMessage {
                role: m.role,
                content: m.content.clone(),
                timestamp: m.timestamp,
            })
            .collect();

        if !messages.iter().any(|m| m.role == Role::User) {
            return None;
        }

        Some(Self {
            user_id: user_id.to_string(),
            task_description: task_description.to_string(),
            locale: locale.to_string(),
            messages,
            completed: false,
            duration_secs: 0,
            rejections_overcome: 0,
        })
    }

    #[must_use]
    pub fn with_outcome(mut self, completed: bool, duration: Duration, rejections: u32) -> Self {
        self.completed = completed;
        self.duration_secs = duration.as_secs();
        self.rejections_overcome = rejections;
        self
    }
}

/// Facts extracted from a session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryExtraction {
    #[serde(default)]
    pub summaries: Vec<String>,
}

/// Extraction service
#[async_trait]
pub trait MemoryGateway: Send + Sync {
    /// Extract durable facts from a finished session
    ///
    /// # Errors
    ///
    /// Returns `Error::MemorySave` if the service fails
    async fn extract(&self, request: MemoryExtractionRequest) -> Result<MemoryExtraction>;
}

/// HTTP extraction service client
pub struct HttpMemoryGateway {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
}

impl HttpMemoryGateway {
    #[must_use]
    pub fn new(url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl MemoryGateway for HttpMemoryGateway {
    async fn extract(&self, request: MemoryExtractionRequest) -> Result<MemoryExtraction> {
        let mut builder = self
            .client
            .post(&self.url)
            .timeout(EXTRACTION_TIMEOUT)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::MemorySave(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::MemorySave(format!("extraction returned {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::MemorySave(e.to_string()))
    }
}

/// Dispatch an extraction in the background (best-effort, fire-and-forget)
pub fn persist_in_background(gateway: Arc<dyn MemoryGateway>, request: MemoryExtractionRequest) {
    let messages = request.messages.len();
    drop(tokio::spawn(async move {
        match gateway.extract(request).await {
            Ok(extraction) => tracing::info!(
                messages,
                summaries = extraction.summaries.len(),
                "session memory saved"
            ),
            Err(e) => tracing::warn!(error = %e, messages, "failed to save session memory"),
        }
    }));
}
