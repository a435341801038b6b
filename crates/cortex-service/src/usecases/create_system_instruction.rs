use async_trait::async_trait;
use cortex_core::rules::not_blank;
use cortex_core::{
    Aggregate, AiProvider, Request, RequestHandler, SystemInstruction, SystemInstructionId, UseCaseError, ValidateExt,
};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

/// Creates an instruction, optionally making it the active one for its
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSystemInstruction {
    #[validate(custom(function = "not_blank", message = "Provider is required"))]
    pub provider: String,

    #[validate(
        custom(function = "not_blank", message = "Instruction cannot be empty"),
        length(max = 10000, message = "Instruction must be at most 10000 characters")
    )]
    pub instruction: String,

    #[serde(default)]
    pub is_active: bool,
}

impl Request for CreateSystemInstruction {
    type Response = SystemInstructionId;
    type Error = UseCaseError;
}

pub struct CreateSystemInstructionHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl CreateSystemInstructionHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { unit_of_work }
    }
}

#[async_trait]
impl RequestHandler<CreateSystemInstruction> for CreateSystemInstructionHandler {
    async fn handle(&self, request: CreateSystemInstruction) -> Result<SystemInstructionId, UseCaseError> {
        request.validate_request()?;
        let provider: AiProvider = request.provider.parse()?;
        debug!(%provider, is_active = request.is_active, "Creating system instruction");

        let scope = self.unit_of_work.begin().await?;
        let instructions = scope.repository::<SystemInstruction>()?;

        if request.is_active {
            if let Some(mut current) = instructions.find_active_by_provider(provider).await? {
                current.deactivate();
                instructions.save(&current).await?;
                debug!(id = %current.id(), "Deactivated previous instruction");
            }
        }

        let instruction = SystemInstruction::create(provider, request.instruction, request.is_active)?;
        let saved = instructions.save(&instruction).await?;
        scope.commit().await?;

        info!(id = %saved.id(), %provider, "System instruction created");
        Ok(*saved.id())
    }
}

impl<M: Module + HasComponent<dyn UnitOfWork>> Provider<M> for CreateSystemInstructionHandler {
    type Interface = dyn RequestHandler<CreateSystemInstruction>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(module.resolve())))
    }
}
