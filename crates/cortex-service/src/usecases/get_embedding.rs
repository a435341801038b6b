use crate::ai_service::EmbeddingService;
use async_trait::async_trait;
use cortex_core::{Request, RequestHandler, UseCaseError};
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::{debug, error};

/// Embeds a piece of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEmbedding {
    pub text: String,
}

impl Request for GetEmbedding {
    type Response = Vec<f32>;
    type Error = UseCaseError;
}

pub struct GetEmbeddingHandler {
    embeddings: Arc<dyn EmbeddingService>,
}

impl GetEmbeddingHandler {
    #[must_use]
    pub fn new(embeddings: Arc<dyn EmbeddingService>) -> Self {
        Self { embeddings }
    }
}

#[async_trait]
impl RequestHandler<GetEmbedding> for GetEmbeddingHandler {
    async fn handle(&self, request: GetEmbedding) -> Result<Vec<f32>, UseCaseError> {
        if request.text.is_empty() {
            return Err(UseCaseError::validation("Text cannot be empty"));
        }

        let embedding = self.embeddings.embed_text(&request.text).await.map_err(|e| {
            error!(provider = %self.embeddings.provider(), error = %e, "Embedding failed");
            UseCaseError::unexpected(format!("Failed to generate embedding: {e}"))
        })?;

        debug!(dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }
}

impl<M: Module + HasComponent<dyn EmbeddingService>> Provider<M> for GetEmbeddingHandler {
    type Interface = dyn RequestHandler<GetEmbedding>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(module.resolve())))
    }
}
