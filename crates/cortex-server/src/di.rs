//! Dependency injection module using Shaku.
//!
//! [`CortexModule`] declares the in-process defaults for every
//! collaborator. [`build_module`] swaps in PostgreSQL sessions and a Redis
//! or PostgreSQL event bus when the configuration asks for them, so the
//! rest of the process only ever sees the interfaces.

use cortex_config::{AiConfig, AppConfig, DatabaseBackend, EventBusBackend};
use cortex_core::{module, AiProvider, CortexError, CortexResult, HasComponent, Mediator, MediatorError};
use cortex_repository::{
    create_pool, InMemorySessionFactory, MappingRegistry, PostgresSessionFactory, SessionFactory, UnitOfWork,
    UnitOfWorkImpl, UnitOfWorkImplParameters,
};
use cortex_service::{
    AiService, ChangeActiveSystemInstruction, ChangeActiveSystemInstructionHandler, CreateSystemInstruction,
    CreateSystemInstructionHandler, EmbeddingService, EventBus, GenerateContent, GenerateContentHandler,
    GetEmbedding, GetEmbeddingHandler, HandleHeartbeat, HandleHeartbeatHandler, InMemoryEventBus,
    ListSystemInstructions, ListSystemInstructionsHandler, MockAiService, MockAiServiceParameters,
    MockEmbeddingService, MockEmbeddingServiceParameters, PostgresEventBus, PublishReceivedDirectMessage,
    PublishReceivedDirectMessageHandler, PublishReceivedMessage, PublishReceivedMessageHandler, RedisEventBus,
    SpontaneousDialog, SpontaneousDialogHandler,
};
use std::sync::Arc;
use tracing::{info, warn};

// Every collaborator plus a provider per use-case handler.
// Handlers are built fresh for each request the mediator dispatches.
module! {
    pub CortexModule {
        components = [
            InMemorySessionFactory,
            UnitOfWorkImpl,
            MockAiService,
            MockEmbeddingService,
            InMemoryEventBus,
        ],
        providers = [
            CreateSystemInstructionHandler,
            ChangeActiveSystemInstructionHandler,
            ListSystemInstructionsHandler,
            GenerateContentHandler,
            GetEmbeddingHandler,
            PublishReceivedMessageHandler,
            PublishReceivedDirectMessageHandler,
            SpontaneousDialogHandler,
            HandleHeartbeatHandler,
        ],
    }
}

/// Mediator over the Cortex module.
pub type CortexMediator = Mediator<CortexModule>;

// ============================================================================
// Module Builders
// ============================================================================

/// Builds the module described by `config`.
///
/// Connects to PostgreSQL (running migrations when configured) and wires the
/// Redis or PostgreSQL event bus when those backends are selected. Networked
/// buses are created stopped; call [`EventBus::start`] once subscribers are
/// in place.
pub async fn build_module(config: &AppConfig) -> CortexResult<Arc<CortexModule>> {
    let mut builder = CortexModule::builder()
        .with_component_parameters::<UnitOfWorkImpl>(UnitOfWorkImplParameters {
            mappings: Arc::new(MappingRegistry::standard()),
        })
        .with_component_parameters::<MockAiService>(mock_ai_parameters(&config.ai)?)
        .with_component_parameters::<MockEmbeddingService>(MockEmbeddingServiceParameters {
            dimension: config.ai.embedding_dimension,
        });

    let pool = match config.database.backend {
        DatabaseBackend::Postgres => {
            let pool = create_pool(&config.database).await?;
            builder = builder.with_component_override::<dyn SessionFactory>(Box::new(PostgresSessionFactory::new(
                pool.inner().clone(),
            )));
            info!("Unit of work backed by PostgreSQL");
            Some(pool)
        }
        DatabaseBackend::Memory => {
            warn!("Unit of work backed by the in-memory store; data is lost on exit");
            None
        }
    };

    match config.event_bus.backend {
        EventBusBackend::Redis => {
            builder = builder.with_component_override::<dyn EventBus>(Box::new(RedisEventBus::new(
                &config.redis,
                config.event_bus.channel_pattern.clone(),
            )));
            info!(pattern = %config.event_bus.channel_pattern, "Event bus backed by Redis");
        }
        EventBusBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                CortexError::configuration("event_bus.backend = postgres requires database.backend = postgres")
            })?;
            builder = builder.with_component_override::<dyn EventBus>(Box::new(PostgresEventBus::new(
                pool.inner().clone(),
                config.event_bus.notify_channel.clone(),
            )));
            info!(channel = %config.event_bus.notify_channel, "Event bus backed by PostgreSQL");
        }
        EventBusBackend::Memory => info!("Event bus running in-process"),
    }

    Ok(Arc::new(builder.build()))
}

/// Builds a module needing no external services.
#[must_use]
pub fn build_in_memory_module() -> Arc<CortexModule> {
    Arc::new(CortexModule::builder().build())
}

/// Routes every use case to its handler.
///
/// # Errors
///
/// Returns [`MediatorError::DuplicateHandler`] if a request type is
/// registered twice.
pub fn build_mediator(module: Arc<CortexModule>) -> Result<CortexMediator, MediatorError> {
    Ok(Mediator::builder()
        .register::<CreateSystemInstruction, CreateSystemInstructionHandler>()?
        .register::<ChangeActiveSystemInstruction, ChangeActiveSystemInstructionHandler>()?
        .register::<ListSystemInstructions, ListSystemInstructionsHandler>()?
        .register::<GenerateContent, GenerateContentHandler>()?
        .register::<GetEmbedding, GetEmbeddingHandler>()?
        .register::<PublishReceivedMessage, PublishReceivedMessageHandler>()?
        .register::<PublishReceivedDirectMessage, PublishReceivedDirectMessageHandler>()?
        .register::<SpontaneousDialog, SpontaneousDialogHandler>()?
        .register::<HandleHeartbeat, HandleHeartbeatHandler>()?
        .initialize(module))
}

/// The mock AI service stands in for the configured provider so that
/// provider's system instruction applies.
fn mock_ai_parameters(config: &AiConfig) -> CortexResult<MockAiServiceParameters> {
    let provider: AiProvider = config
        .provider
        .parse()
        .map_err(|e| CortexError::configuration(format!("ai.provider: {e}")))?;
    if provider != AiProvider::Mock {
        warn!(%provider, "No adapter for the configured AI provider; using the mock service");
    }

    Ok(MockAiServiceParameters {
        reply: config.mock_reply.clone(),
        provider,
    })
}

// ============================================================================
// Resolver Traits
// ============================================================================

/// Trait for resolving collaborators from a module.
pub trait CollaboratorResolver {
    /// Resolves the unit of work.
    fn unit_of_work(&self) -> Arc<dyn UnitOfWork>;

    /// Resolves the event bus.
    fn event_bus(&self) -> Arc<dyn EventBus>;

    /// Resolves the text generation service.
    fn ai_service(&self) -> Arc<dyn AiService>;

    /// Resolves the embedding service.
    fn embedding_service(&self) -> Arc<dyn EmbeddingService>;
}

impl CollaboratorResolver for CortexModule {
    fn unit_of_work(&self) -> Arc<dyn UnitOfWork> {
        self.resolve()
    }

    fn event_bus(&self) -> Arc<dyn EventBus> {
        self.resolve()
    }

    fn ai_service(&self) -> Arc<dyn AiService> {
        self.resolve()
    }

    fn embedding_service(&self) -> Arc<dyn EmbeddingService> {
        self.resolve()
    }
}
