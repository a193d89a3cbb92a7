//! Reward notifications
//!
//! Awards are best-effort: a failed delivery is logged and never affects
//! the session.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::{Error, Result};

/// Something worth rewarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardEvent {
    /// The user started the task after resisting
    ActionStarted {
        task: String,
        rejections_overcome: u32,
    },
    /// A session ran to completion
    SessionCompleted {
        task: String,
        duration_secs: u64,
        rejections_overcome: u32,
    },
}

impl RewardEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ActionStarted { .. } => "action_started",
            Self::SessionCompleted { .. } => "session_completed",
        }
    }
}

/// Receiver of reward events
#[async_trait]
pub trait RewardSink: Send + Sync {
    /// Deliver one award
    ///
    /// # Errors
    ///
    /// Returns `Error::Reward` if delivery fails
    async fn award(&self, event: RewardEvent) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AwardRequest<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    event: &'a RewardEvent,
}

/// HTTP reward endpoint
pub struct HttpRewardSink {
    client: reqwest::Client,
    url: String,
    user_id: String,
    api_key: Option<SecretString>,
}

impl HttpRewardSink {
    #[must_use]
    pub fn new(url: impl Into<String>, user_id: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            user_id: user_id.into(),
            api_key,
        }
    }
}

#[async_trait]
impl RewardSink for HttpRewardSink {
    async fn award(&self, event: RewardEvent) -> Result<()> {
        let body = AwardRequest {
            user_id: &self.user_id,
            event: &event,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Reward(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Reward(format!("award returned {status}")));
        }
        Ok(())
    }
}

/// Deliver an award in the background (best-effort, fire-and-forget)
pub fn award_in_background(sink: Arc<dyn RewardSink>, event: RewardEvent) {
    drop(tokio::spawn(async move {
        let name = event.name();
        if let Err(e) = sink.award(event).await {
            tracing::warn!(event = name, error = %e, "failed to deliver reward");
        } else {
            tracing::debug!(event = name, "reward delivered");
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_body_is_tagged() {
        let event = RewardEvent::ActionStarted {
            task: "dishes".to_string(),
            rejections_overcome: 2,
        };
        let body = AwardRequest {
            user_id: "u1",
            event: &event,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["type"], "action_started");
        assert_eq!(json["rejections_overcome"], 2);
    }

    #[test]
    fn names() {
        let event = RewardEvent::SessionCompleted {
            task: "dishes".to_string(),
            duration_secs: 300,
            rejections_overcome: 0,
        };
        assert_eq!(event.name(), "session_completed");
    }
}
