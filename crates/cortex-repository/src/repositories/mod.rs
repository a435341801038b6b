//! Aggregate-specific repositories.

mod chat_history;
mod system_instruction;

pub use chat_history::ChatHistoryRepository;
pub use system_instruction::SystemInstructionRepository;

use crate::generic::SharedSession;
use crate::mapping::{EntityMapping, MappingRegistry};
use cortex_core::RepositoryResult;
use std::sync::Arc;

/// An aggregate that knows which repository serves it.
pub trait Persistent: EntityMapping {
    /// Repository handed out by a unit-of-work scope.
    type Repository: Send + Sync + 'static;

    /// Binds the repository to a scope's session.
    fn repository(session: SharedSession, mappings: Arc<MappingRegistry>) -> RepositoryResult<Self::Repository>;
}
