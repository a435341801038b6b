//! Redis pub/sub event bus.

use crate::event_bus::{decode_envelope, encode_envelope, Event, EventBus, EventBusError, EventHandler, HandlerRegistry};
use async_trait::async_trait;
use cortex_config::RedisConfig;
use deadpool_redis::{Config, Pool, Runtime};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Event bus over Redis pub/sub.
///
/// Events are published on a channel named after their topic as JSON
/// `{"topic", "payload"}`. [`start`](EventBus::start) connects and spawns a
/// listener that pattern-subscribes to the configured channel pattern and
/// dispatches each message to the local subscribers of its topic.
pub struct RedisEventBus {
    url: String,
    pool_size: usize,
    channel_pattern: String,
    handlers: Arc<HandlerRegistry>,
    pool: RwLock<Option<Pool>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RedisEventBus {
    /// Creates a stopped bus.
    #[must_use]
    pub fn new(config: &RedisConfig, channel_pattern: impl Into<String>) -> Self {
        Self {
            url: config.url.clone(),
            pool_size: config.pool_size as usize,
            channel_pattern: channel_pattern.into(),
            handlers: Arc::new(HandlerRegistry::new()),
            pool: RwLock::new(None),
            listener: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.pool.read().is_some()
    }

    async fn create_pool(&self) -> Result<Pool, EventBusError> {
        info!("Creating Redis connection pool for event bus...");

        let pool = Config::from_url(&self.url)
            .builder()
            .map_err(|e| EventBusError::Redis(format!("Invalid Redis config: {e}")))?
            .max_size(self.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| EventBusError::Redis(format!("Failed to create pool: {e}")))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| EventBusError::Redis(format!("Failed to get Redis connection: {e}")))?;
        redis::cmd("PING").query_async::<String>(&mut *conn).await?;

        info!("Redis connection pool created successfully");
        Ok(pool)
    }

    async fn spawn_listener(&self) -> Result<JoinHandle<()>, EventBusError> {
        let client = redis::Client::open(self.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.psubscribe(&self.channel_pattern).await?;
        info!(pattern = %self.channel_pattern, "Redis listener subscribed");

        let handlers = Arc::clone(&self.handlers);
        Ok(tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(message) = messages.next().await {
                let channel = message.get_channel_name().to_string();
                let data: String = match message.get_payload() {
                    Ok(data) => data,
                    Err(e) => {
                        error!(%channel, error = %e, "Unreadable Redis message");
                        continue;
                    }
                };
                match decode(&channel, &data) {
                    Ok(event) => {
                        handlers.dispatch(&event).await;
                    }
                    Err(e) => error!(%channel, error = %e, "Failed to decode Redis message"),
                }
            }
            info!("Redis listener stopped");
        }))
    }
}

/// Rebuilds an event from a channel message, falling back to the channel
/// name when the envelope carries no topic.
fn decode(channel: &str, data: &str) -> Result<Event, EventBusError> {
    decode_envelope(Some(channel), data)
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), EventBusError> {
        let Some(pool) = self.pool.read().clone() else {
            warn!(topic, "Redis event bus not started, cannot publish");
            return Err(EventBusError::NotStarted {
                topic: topic.to_string(),
            });
        };

        let message = encode_envelope(topic, payload)?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| EventBusError::Redis(format!("Failed to get Redis connection: {e}")))?;
        let receivers: i64 = conn.publish(topic, message).await.map_err(|e| {
            error!(topic, error = %e, "Failed to publish event");
            EventBusError::from(e)
        })?;

        debug!(topic, receivers, "Published event to Redis");
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: EventHandler) {
        self.handlers.add(topic, handler);
        debug!(topic, "Subscribed to topic");
    }

    async fn start(&self) -> Result<(), EventBusError> {
        if self.is_started() {
            return Ok(());
        }

        let pool = self.create_pool().await?;
        let listener = self.spawn_listener().await?;

        *self.listener.lock() = Some(listener);
        *self.pool.write() = Some(pool);
        info!("Redis event bus started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), EventBusError> {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        if let Some(pool) = self.pool.write().take() {
            pool.close();
            info!("Redis event bus stopped");
        }
        Ok(())
    }
}

impl Drop for RedisEventBus {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for RedisEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventBus")
            .field("channel_pattern", &self.channel_pattern)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}
