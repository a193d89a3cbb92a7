use async_trait::async_trait;

use super::{ConfigBackend, SessionConfigPayload, SessionConfigRequest};
use crate::Result;
use crate::realtime::Credential;

/// Default instruction for offline sessions
const DEFAULT_INSTRUCTION: &str = "You are a warm, persistent coach helping the user start a small task. \
     Begin each reply with [RESIST:emotional], [RESIST:behavioral], [ACCEPT] or \
     [ACTION_STARTED] when the user's last turn shows it.";

/// Backend that serves a fixed instruction without network access
#[derive(Debug, Clone)]
pub struct StaticBackend {
    system_instruction: String,
    memory_summary: Option<String>,
}

impl StaticBackend {
    #[must_use]
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            memory_summary: None,
        }
    }

    #[must_use]
    pub fn with_memory(mut self, summary: impl Into<String>) -> Self {
        self.memory_summary = Some(summary.into());
        self
    }
}

impl Default for StaticBackend {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTION)
    }
}

#[async_trait]
impl ConfigBackend for StaticBackend {
    async fn fetch_session_config(
        &self,
        request: &SessionConfigRequest,
    ) -> Result<SessionConfigPayload> {
        Ok(SessionConfigPayload {
            system_instruction: format!(
                "{}\n\nTask: {}",
                self.system_instruction, request.task_description
            ),
            memory_summary: self.memory_summary.clone(),
        })
    }

    async fn fetch_credential(&self) -> Result<Credential> {
        Ok(Credential::new("local"))
    }
}
