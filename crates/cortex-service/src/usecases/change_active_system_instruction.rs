use async_trait::async_trait;
use cortex_core::{Aggregate, Request, RequestHandler, SystemInstruction, SystemInstructionId, UseCaseError};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Makes an instruction the active one for its provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeActiveSystemInstruction {
    pub instruction_id: SystemInstructionId,
}

impl Request for ChangeActiveSystemInstruction {
    type Response = SystemInstruction;
    type Error = UseCaseError;
}

pub struct ChangeActiveSystemInstructionHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl ChangeActiveSystemInstructionHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { unit_of_work }
    }

    async fn switch(&self, id: SystemInstructionId) -> Result<SystemInstruction, UseCaseError> {
        let scope = self.unit_of_work.begin().await?;
        let instructions = scope.repository::<SystemInstruction>()?;

        let mut target = instructions
            .find_by_id(&id)
            .await?
            .ok_or_else(|| UseCaseError::not_found(format!("Instruction {id} not found")))?;

        if let Some(mut current) = instructions.find_active_by_provider(target.provider()).await? {
            if current.id() != target.id() {
                current.deactivate();
                instructions.update(&current).await?;
                debug!(id = %current.id(), "Deactivated previous instruction");
            }
        }

        if !target.is_active() {
            target.activate();
            target = instructions.update(&target).await?;
        }

        scope.commit().await?;
        Ok(target)
    }
}

#[async_trait]
impl RequestHandler<ChangeActiveSystemInstruction> for ChangeActiveSystemInstructionHandler {
    async fn handle(&self, request: ChangeActiveSystemInstruction) -> Result<SystemInstruction, UseCaseError> {
        let id = request.instruction_id;
        match self.switch(id).await {
            Ok(activated) => {
                info!(%id, provider = %activated.provider(), "Active system instruction changed");
                Ok(activated)
            }
            Err(e @ UseCaseError::ConcurrencyConflict(_)) => {
                warn!(%id, error = %e, "Active instruction changed concurrently");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

impl<M: Module + HasComponent<dyn UnitOfWork>> Provider<M> for ChangeActiveSystemInstructionHandler {
    type Interface = dyn RequestHandler<ChangeActiveSystemInstruction>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(module.resolve())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::testing;
    use cortex_core::{AiProvider, Primitive, RepositoryResult, UseCaseErrorKind, Version};
    use cortex_repository::{
        InMemorySessionFactory, InMemoryStore, MappingRegistry, Query, Record, RecordSchema, Session, SessionFactory,
        UnitOfWorkImpl,
    };

    async fn seed(uow: &Arc<dyn UnitOfWork>, provider: AiProvider, text: &str, active: bool) -> SystemInstruction {
        let scope = uow.begin().await.unwrap();
        let stored = scope
            .repository::<SystemInstruction>()
            .unwrap()
            .add(&SystemInstruction::create(provider, text, active).unwrap())
            .await
            .unwrap();
        scope.commit().await.unwrap();
        stored
    }

    async fn load(uow: &Arc<dyn UnitOfWork>, id: &SystemInstructionId) -> SystemInstruction {
        let scope = uow.begin().await.unwrap();
        let found = scope
            .repository::<SystemInstruction>()
            .unwrap()
            .get_by_id(id)
            .await
            .unwrap();
        scope.rollback().await.unwrap();
        found
    }

    #[tokio::test]
    async fn test_switches_active_instruction() {
        let (uow, _store) = testing::unit_of_work();
        let old = seed(&uow, AiProvider::Gemini, "Old.", true).await;
        let new = seed(&uow, AiProvider::Gemini, "New.", false).await;
        let handler = ChangeActiveSystemInstructionHandler::new(Arc::clone(&uow));

        let activated = handler
            .handle(ChangeActiveSystemInstruction {
                instruction_id: *new.id(),
            })
            .await
            .unwrap();

        assert!(activated.is_active());
        assert_eq!(activated.version(), Some(Version::new(1)));
        assert!(!load(&uow, old.id()).await.is_active());
        assert!(load(&uow, new.id()).await.is_active());
    }

    #[tokio::test]
    async fn test_already_active_is_noop() {
        let (uow, _store) = testing::unit_of_work();
        let current = seed(&uow, AiProvider::Gpt, "Current.", true).await;
        let handler = ChangeActiveSystemInstructionHandler::new(Arc::clone(&uow));

        let activated = handler
            .handle(ChangeActiveSystemInstruction {
                instruction_id: *current.id(),
            })
            .await
            .unwrap();

        assert_eq!(activated.version(), Some(Version::INITIAL));
    }

    #[tokio::test]
    async fn test_missing_instruction_is_not_found() {
        let (uow, _store) = testing::unit_of_work();
        let handler = ChangeActiveSystemInstructionHandler::new(uow);
        let id = SystemInstructionId::new();

        let err = handler
            .handle(ChangeActiveSystemInstruction { instruction_id: id })
            .await
            .unwrap_err();

        assert_eq!(err, UseCaseError::NotFound(format!("Instruction {id} not found")));
    }

    /// Session that lets a rival session commit the same versioned write
    /// first.
    struct RacingSession {
        inner: Box<dyn Session>,
        rival: Option<Box<dyn Session>>,
    }

    #[async_trait]
    impl Session for RacingSession {
        async fn find(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<Option<Record>> {
            self.inner.find(schema, id).await
        }

        async fn select(&mut self, schema: &'static RecordSchema, query: &Query) -> RepositoryResult<Vec<Record>> {
            self.inner.select(schema, query).await
        }

        async fn insert(&mut self, schema: &'static RecordSchema, record: Record) -> RepositoryResult<Record> {
            self.inner.insert(schema, record).await
        }

        async fn update_versioned(
            &mut self,
            schema: &'static RecordSchema,
            record: Record,
            expected: u64,
        ) -> RepositoryResult<u64> {
            if let Some(mut rival) = self.rival.take() {
                rival.update_versioned(schema, record.clone(), expected).await?;
                rival.commit().await?;
            }
            self.inner.update_versioned(schema, record, expected).await
        }

        async fn upsert(&mut self, schema: &'static RecordSchema, record: Record) -> RepositoryResult<Record> {
            self.inner.upsert(schema, record).await
        }

        async fn delete(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<u64> {
            self.inner.delete(schema, id).await
        }

        async fn commit(self: Box<Self>) -> RepositoryResult<()> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
            self.inner.rollback().await
        }
    }

    struct RacingSessions(InMemorySessionFactory);

    #[async_trait]
    impl SessionFactory for RacingSessions {
        async fn open(&self) -> RepositoryResult<Box<dyn Session>> {
            Ok(Box::new(RacingSession {
                inner: self.0.open().await?,
                rival: Some(self.0.open().await?),
            }))
        }
    }

    #[tokio::test]
    async fn test_concurrent_change_conflicts() {
        let store = Arc::new(InMemoryStore::new());
        let plain: Arc<dyn UnitOfWork> = Arc::new(UnitOfWorkImpl::new(
            Arc::new(InMemorySessionFactory::new(Arc::clone(&store))),
            Arc::new(MappingRegistry::standard()),
        ));
        let target = seed(&plain, AiProvider::Ollama, "Target.", false).await;

        let racing: Arc<dyn UnitOfWork> = Arc::new(UnitOfWorkImpl::new(
            Arc::new(RacingSessions(InMemorySessionFactory::new(store))),
            Arc::new(MappingRegistry::standard()),
        ));
        let err = ChangeActiveSystemInstructionHandler::new(racing)
            .handle(ChangeActiveSystemInstruction {
                instruction_id: *target.id(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), UseCaseErrorKind::ConcurrencyConflict);
        assert_eq!(load(&plain, target.id()).await.version(), Some(Version::new(1)));
    }
}
