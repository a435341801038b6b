use super::Persistent;
use crate::generic::{GenericRepository, SharedSession};
use crate::mapping::MappingRegistry;
use crate::session::{Direction, Query};
use cortex_core::{ChatMessage, RepositoryResult};
use std::ops::Deref;
use std::sync::Arc;

/// Conversation history.
#[derive(Debug)]
pub struct ChatHistoryRepository {
    inner: GenericRepository<ChatMessage>,
}

impl ChatHistoryRepository {
    #[must_use]
    pub const fn new(inner: GenericRepository<ChatMessage>) -> Self {
        Self { inner }
    }

    /// Returns the latest `limit` messages in the order they were sent.
    pub async fn recent_history(&self, limit: usize) -> RepositoryResult<Vec<ChatMessage>> {
        let query = Query::new().order_by("sent_at", Direction::Descending).limit(limit);
        let mut messages = self.inner.find(&query).await?;
        messages.reverse();
        Ok(messages)
    }
}

impl Deref for ChatHistoryRepository {
    type Target = GenericRepository<ChatMessage>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Persistent for ChatMessage {
    type Repository = ChatHistoryRepository;

    fn repository(session: SharedSession, mappings: Arc<MappingRegistry>) -> RepositoryResult<Self::Repository> {
        GenericRepository::new(session, mappings).map(ChatHistoryRepository::new)
    }
}
