//! Canned text generation.

use crate::ai_service::{AiService, AiServiceError};
use async_trait::async_trait;
use cortex_core::{AiProvider, ChatMessage};
use shaku::Component;
use tracing::debug;

/// Reply returned when none is configured.
pub const DEFAULT_MOCK_REPLY: &str = "This is a mock response from MockAIService.";

/// Text generation that always answers with a fixed reply.
///
/// It reports `Mock` as its provider unless configured to stand in for
/// another one, in which case that provider's system instruction applies.
#[derive(Component)]
#[shaku(interface = AiService)]
pub struct MockAiService {
    #[shaku(default = String::from(DEFAULT_MOCK_REPLY))]
    reply: String,
    #[shaku(default = AiProvider::Mock)]
    provider: AiProvider,
}

impl MockAiService {
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            provider: AiProvider::Mock,
        }
    }

    /// Reports `provider` instead of `Mock`.
    #[must_use]
    pub fn with_provider(mut self, provider: AiProvider) -> Self {
        self.provider = provider;
        self
    }
}

impl Default for MockAiService {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_REPLY)
    }
}

#[async_trait]
impl AiService for MockAiService {
    async fn generate_content(
        &self,
        prompt: &str,
        history: &[ChatMessage],
        system_instruction: Option<String>,
    ) -> Result<String, AiServiceError> {
        debug!(
            prompt_len = prompt.len(),
            history = history.len(),
            system_instruction = system_instruction.as_deref().unwrap_or("<none>"),
            "Mock generation"
        );
        Ok(self.reply.clone())
    }

    fn provider(&self) -> AiProvider {
        self.provider
    }
}
