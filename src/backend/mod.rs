//! Backend configuration service client
//!
//! Supplies the system instruction (with an optional memory summary of past
//! sessions) and the short-lived credential for the streaming connection.

mod fixed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub use fixed::StaticBackend;

use crate::config::BackendConfig;
use crate::realtime::Credential;
use crate::{Error, Result};

/// Parameters for the session config request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigRequest {
    pub task_description: String,
    pub user_id: String,
    pub locale: String,
    /// Local wall-clock time, `YYYY-MM-DDTHH:MM`
    pub local_time: String,
}

/// Session config returned by the backend
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigPayload {
    pub system_instruction: String,
    #[serde(default)]
    pub memory_summary: Option<String>,
}

impl SessionConfigPayload {
    /// System instruction with the memory summary appended
    #[must_use]
    pub fn instruction(&self) -> String {
        match self.memory_summary.as_deref().map(str::trim) {
            Some(summary) if !summary.is_empty() => format!(
                "{}\n\nWhat you remember about this user:\n{summary}",
                self.system_instruction
            ),
            _ => self.system_instruction.clone(),
        }
    }
}

/// Source of session config and connection credentials
#[async_trait]
pub trait ConfigBackend: Send + Sync {
    /// Fetch the system instruction for a task
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendConfig` if the request fails
    async fn fetch_session_config(
        &self,
        request: &SessionConfigRequest,
    ) -> Result<SessionConfigPayload>;

    /// Fetch a credential for the streaming connection
    ///
    /// # Errors
    ///
    /// Returns `Error::BackendConfig` if the request fails
    async fn fetch_credential(&self) -> Result<Credential>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// HTTP client for the backend
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => request.header(
                "Authorization",
                format!("Bearer {}", key.expose_secret()),
            ),
            None => request,
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, what, "backend request failed");
            Error::BackendConfig(format!("{what}: {e}"))
        })?;

        let status = response.status();
        tracing::debug!(status = %status, what, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, what, "backend error");
            return Err(Error::BackendConfig(format!("{what} returned {status}: {body}")));
        }

        response.json().await.map_err(|e| {
            tracing::error!(error = %e, what, "failed to parse backend response");
            Error::BackendConfig(format!("{what}: {e}"))
        })
    }
}

#[async_trait]
impl ConfigBackend for HttpBackend {
    async fn fetch_session_config(
        &self,
        request: &SessionConfigRequest,
    ) -> Result<SessionConfigPayload> {
        let payload: SessionConfigPayload = self
            .send(self.post("/session/config").json(request), "session config")
            .await?;
        tracing::debug!(
            has_memory = payload.memory_summary.is_some(),
            "session config fetched"
        );
        Ok(payload)
    }

    async fn fetch_credential(&self) -> Result<Credential> {
        let response: TokenResponse = self
            .send(self.post("/session/token"), "credential")
            .await?;
        Ok(Credential {
            token: SecretString::from(response.token),
            expires_at: response.expires_at,
        })
    }
}
