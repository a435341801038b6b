//! Chat history entry.

use crate::{Aggregate, ChatMessageId, ChatRole, DomainError, SentAt};
use serde::{Deserialize, Serialize};

/// One message of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier for the message.
    pub id: ChatMessageId,

    /// Author of the message.
    pub role: ChatRole,

    /// Message text.
    pub content: String,

    /// When the message was sent.
    pub sent_at: SentAt,
}

impl ChatMessage {
    /// Creates a new message with a fresh identifier.
    pub fn create(role: ChatRole, content: impl Into<String>, sent_at: SentAt) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation("Message content cannot be empty"));
        }

        Ok(Self {
            id: ChatMessageId::new(),
            role,
            content,
            sent_at,
        })
    }

    /// Rebuilds a stored message without validation.
    #[must_use]
    pub const fn reconstruct(id: ChatMessageId, role: ChatRole, content: String, sent_at: SentAt) -> Self {
        Self {
            id,
            role,
            content,
            sent_at,
        }
    }

    /// Checks if a human wrote the message.
    #[must_use]
    pub const fn is_from_user(&self) -> bool {
        matches!(self.role, ChatRole::User)
    }
}

impl Aggregate for ChatMessage {
    type Id = ChatMessageId;

    const NAME: &'static str = "ChatMessage";

    fn id(&self) -> &ChatMessageId {
        &self.id
    }
}
