//! Text generation and embedding collaborators.

use async_trait::async_trait;
use cortex_core::{AiProvider, ChatMessage, Interface};
use thiserror::Error;

/// Failure reported by a text generation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AiServiceError {
    pub message: String,
}

impl AiServiceError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by an embedding backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EmbeddingServiceError {
    pub message: String,
}

impl EmbeddingServiceError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Generates replies from a prompt and the preceding conversation.
#[async_trait]
pub trait AiService: Interface {
    /// Generates a reply.
    ///
    /// `history` is the conversation before `prompt`, oldest first.
    async fn generate_content(
        &self,
        prompt: &str,
        history: &[ChatMessage],
        system_instruction: Option<String>,
    ) -> Result<String, AiServiceError>;

    /// Provider whose system instruction applies.
    fn provider(&self) -> AiProvider;
}

/// Turns text into vectors.
#[async_trait]
pub trait EmbeddingService: Interface {
    /// Embeds a document.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError>;

    /// Embeds a search query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingServiceError>;

    fn provider(&self) -> AiProvider;
}
