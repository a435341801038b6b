use async_trait::async_trait;
use cortex_core::{AiProvider, Request, RequestHandler, SystemInstruction, UseCaseError};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::debug;

/// Lists a provider's instructions, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSystemInstructions {
    pub provider: String,
}

impl Request for ListSystemInstructions {
    type Response = Vec<SystemInstruction>;
    type Error = UseCaseError;
}

pub struct ListSystemInstructionsHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl ListSystemInstructionsHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { unit_of_work }
    }
}

#[async_trait]
impl RequestHandler<ListSystemInstructions> for ListSystemInstructionsHandler {
    async fn handle(&self, request: ListSystemInstructions) -> Result<Vec<SystemInstruction>, UseCaseError> {
        let provider: AiProvider = request.provider.parse()?;

        let scope = self.unit_of_work.begin().await?;
        let instructions = scope
            .repository::<SystemInstruction>()?
            .find_all_by_provider(provider)
            .await?;
        scope.rollback().await?;

        debug!(%provider, count = instructions.len(), "Listed system instructions");
        Ok(instructions)
    }
}

impl<M: Module + HasComponent<dyn UnitOfWork>> Provider<M> for ListSystemInstructionsHandler {
    type Interface = dyn RequestHandler<ListSystemInstructions>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(module.resolve())))
    }
}
