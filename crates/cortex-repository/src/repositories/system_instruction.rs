use super::Persistent;
use crate::generic::{GenericRepository, SharedSession};
use crate::mapping::MappingRegistry;
use crate::session::{Direction, Query};
use cortex_core::{
    Aggregate, AiProvider, RepositoryError, RepositoryResult, SystemInstruction, SystemInstructionId,
};
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// System instruction repository.
#[derive(Debug)]
pub struct SystemInstructionRepository {
    inner: GenericRepository<SystemInstruction>,
}

impl SystemInstructionRepository {
    #[must_use]
    pub const fn new(inner: GenericRepository<SystemInstruction>) -> Self {
        Self { inner }
    }

    /// Adds the instruction if it is new, otherwise writes it back with a
    /// version check.
    pub async fn save(&self, instruction: &SystemInstruction) -> RepositoryResult<SystemInstruction> {
        if self.find_by_id(instruction.id()).await?.is_some() {
            self.inner.update(instruction).await
        } else {
            self.inner.add(instruction).await
        }
    }

    /// Loads an instruction, mapping a missing row to `None`.
    pub async fn find_by_id(&self, id: &SystemInstructionId) -> RepositoryResult<Option<SystemInstruction>> {
        match self.inner.get_by_id(id).await {
            Ok(instruction) => Ok(Some(instruction)),
            Err(RepositoryError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the active instruction of a provider, if any.
    pub async fn find_active_by_provider(&self, provider: AiProvider) -> RepositoryResult<Option<SystemInstruction>> {
        debug!(%provider, "Looking up active system instruction");
        let query = Query::new()
            .filter("provider", &provider)?
            .filter("is_active", &true)?
            .order_by("updated_at", Direction::Descending);
        self.inner.find_one(&query).await
    }

    /// Returns every instruction of a provider, oldest first.
    pub async fn find_all_by_provider(&self, provider: AiProvider) -> RepositoryResult<Vec<SystemInstruction>> {
        let query = Query::new()
            .filter("provider", &provider)?
            .order_by("created_at", Direction::Ascending);
        self.inner.find(&query).await
    }
}

impl Deref for SystemInstructionRepository {
    type Target = GenericRepository<SystemInstruction>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Persistent for SystemInstruction {
    type Repository = SystemInstructionRepository;

    fn repository(session: SharedSession, mappings: Arc<MappingRegistry>) -> RepositoryResult<Self::Repository> {
        GenericRepository::new(session, mappings).map(SystemInstructionRepository::new)
    }
}
