//! Collaborator implementations.
//!
//! Trait definitions live in the parent module (`ai_service.rs`,
//! `event_bus.rs`).

pub mod in_memory_event_bus;
pub mod mock_ai_service;
pub mod mock_embedding_service;
pub mod postgres_event_bus;
pub mod redis_event_bus;

pub use in_memory_event_bus::InMemoryEventBus;
pub use mock_ai_service::{MockAiService, MockAiServiceParameters, DEFAULT_MOCK_REPLY};
pub use mock_embedding_service::{MockEmbeddingService, MockEmbeddingServiceParameters, DEFAULT_EMBEDDING_DIMENSION};
pub use postgres_event_bus::{PostgresEventBus, MAX_NOTIFY_PAYLOAD};
pub use redis_event_bus::RedisEventBus;
