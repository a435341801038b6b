//! Worker application.

use crate::di::{build_mediator, build_module, CollaboratorResolver, CortexMediator, CortexModule};
use cortex_config::AppConfig;
use cortex_core::{CortexError, CortexResult};
use cortex_service::{handler, Event, EventBus, EventBusError, EventHandler, HandleHeartbeat, HEARTBEAT_TOPIC};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// The wired process: DI module, mediator and event subscriptions.
///
/// While running, a heartbeat is published on [`HEARTBEAT_TOPIC`] every
/// `worker.heartbeat_interval_secs`; each one lets the model speak up on
/// the configured channel.
pub struct App {
    config: AppConfig,
    module: Arc<CortexModule>,
    mediator: CortexMediator,
}

impl App {
    /// Wires the application described by `config`.
    pub async fn build(config: AppConfig) -> CortexResult<Self> {
        let module = build_module(&config).await?;
        Self::from_module(config, module)
    }

    /// Wires the application around an existing module.
    pub fn from_module(config: AppConfig, module: Arc<CortexModule>) -> CortexResult<Self> {
        let mediator = build_mediator(Arc::clone(&module))?;
        Ok(Self {
            config,
            module,
            mediator,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn module(&self) -> &Arc<CortexModule> {
        &self.module
    }

    #[must_use]
    pub const fn mediator(&self) -> &CortexMediator {
        &self.mediator
    }

    /// Subscribes the event handlers and starts the event bus.
    pub async fn start(&self) -> CortexResult<()> {
        let bus = self.module.event_bus();
        bus.subscribe(
            HEARTBEAT_TOPIC,
            heartbeat_handler(self.mediator.clone(), self.config.worker.speak_channel_id),
        );
        bus.start()
            .await
            .map_err(|e| CortexError::EventBus(e.to_string()))?;
        info!(topic = HEARTBEAT_TOPIC, "Subscribed to heartbeats");
        Ok(())
    }

    /// Stops the event bus.
    pub async fn stop(&self) -> CortexResult<()> {
        self.module
            .event_bus()
            .stop()
            .await
            .map_err(|e| CortexError::EventBus(e.to_string()))
    }

    /// Starts, produces heartbeats until `shutdown` resolves, then stops.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> CortexResult<()> {
        self.start().await?;
        tokio::select! {
            () = shutdown => {}
            () = heartbeat_producer(self.module.event_bus(), self.config.worker.heartbeat_interval()) => {}
        }
        info!("Heartbeat producer stopped");
        self.stop().await?;
        info!("Worker shutdown complete");
        Ok(())
    }
}

/// Publishes a heartbeat every `period`, starting one period from now.
///
/// Never completes; drop it to stop. Publish failures are logged and the
/// next tick proceeds.
pub async fn heartbeat_producer(bus: Arc<dyn EventBus>, period: Duration) {
    debug!(?period, "Heartbeat producer started");
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        match bus.publish(HEARTBEAT_TOPIC, serde_json::json!({})).await {
            Ok(()) => debug!("Heartbeat event published"),
            Err(e) => error!(error = %e, "Heartbeat producer error"),
        }
    }
}

/// Lets the model speak up on `channel_id` for every heartbeat.
fn heartbeat_handler(mediator: CortexMediator, channel_id: u64) -> EventHandler {
    handler(move |event: Event| {
        let mediator = mediator.clone();
        async move {
            debug!(event_id = %event.id, "Handling heartbeat");
            mediator
                .send(HandleHeartbeat { channel_id })
                .map_err(|e| EventBusError::Handler(format!("Failed to handle heartbeat: {e}")))
                .await?;
            Ok(())
        }
    })
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("environment", &self.config.app.environment)
            .field("handlers", &self.mediator.handler_count())
            .finish_non_exhaustive()
    }
}
