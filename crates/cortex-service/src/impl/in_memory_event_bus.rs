//! In-process event bus.

use crate::event_bus::{Event, EventBus, EventBusError, EventHandler, HandlerRegistry};
use async_trait::async_trait;
use shaku::Component;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Event bus delivering events to subscribers in the publishing task.
///
/// Publishing waits for every matching handler to finish.
#[derive(Component, Default)]
#[shaku(interface = EventBus)]
pub struct InMemoryEventBus {
    #[shaku(default)]
    handlers: HandlerRegistry,
    #[shaku(default)]
    running: AtomicBool,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), EventBusError> {
        let event = Event::new(topic, payload);
        let delivered = self.handlers.dispatch(&event).await;
        debug!(topic, delivered, "Published event");
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) {
        self.handlers.add(topic, handler);
        debug!(topic, "Subscribed to topic");
    }

    async fn start(&self) -> Result<(), EventBusError> {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("In-memory event bus started");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), EventBusError> {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("In-memory event bus stopped");
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("handlers", &self.handlers)
            .field("running", &self.is_running())
            .finish()
    }
}
