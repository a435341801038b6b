//! # Cortex Service
//!
//! Application layer: the use cases routed through the mediator, and the
//! collaborators they depend on (text generation, embeddings and the event
//! bus) together with their in-process, Redis and PostgreSQL implementations.

pub mod ai_service;
pub mod event_bus;
pub mod r#impl;
pub mod usecases;

pub use ai_service::*;
pub use event_bus::*;
pub use r#impl::*;
pub use usecases::*;
