//! Zero-vector embeddings.

use crate::ai_service::{EmbeddingService, EmbeddingServiceError};
use async_trait::async_trait;
use cortex_core::AiProvider;
use shaku::Component;

/// Vector length when none is configured.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Embedding service returning zero vectors of a fixed dimension.
#[derive(Component)]
#[shaku(interface = EmbeddingService)]
pub struct MockEmbeddingService {
    #[shaku(default = DEFAULT_EMBEDDING_DIMENSION)]
    dimension: usize,
}

impl MockEmbeddingService {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for MockEmbeddingService {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        Ok(vec![0.0; self.dimension])
    }

    async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        Ok(vec![0.0; self.dimension])
    }

    fn provider(&self) -> AiProvider {
        AiProvider::Mock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_vectors_of_configured_dimension() {
        let service = MockEmbeddingService::default();
        let vector = service.embed_text("hello").await.unwrap();
        assert_eq!(vector.len(), 768);
        assert!(vector.iter().all(|v| *v == 0.0));

        let small = MockEmbeddingService::new(4);
        assert_eq!(small.embed_query("q").await.unwrap(), vec![0.0; 4]);
    }
}
