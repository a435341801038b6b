//! PostgreSQL LISTEN/NOTIFY event bus.

use crate::event_bus::{decode_envelope, encode_envelope, EventBus, EventBusError, EventHandler, HandlerRegistry};
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::postgres::{PgListener, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Largest NOTIFY payload PostgreSQL accepts.
pub const MAX_NOTIFY_PAYLOAD: usize = 7999;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Event bus over PostgreSQL LISTEN/NOTIFY.
///
/// Every topic travels on one notify channel as JSON `{"topic", "payload"}`
/// sent with `pg_notify`. [`start`](EventBus::start) opens a dedicated
/// listener connection from the pool and dispatches each notification to
/// the local subscribers of its topic.
pub struct PostgresEventBus {
    pool: PgPool,
    channel: String,
    handlers: Arc<HandlerRegistry>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl PostgresEventBus {
    /// Creates a stopped bus notifying on `channel`.
    #[must_use]
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
            handlers: Arc::new(HandlerRegistry::new()),
            listener: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.listener.lock().is_some()
    }

    async fn spawn_listener(&self) -> Result<JoinHandle<()>, EventBusError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;
        info!(channel = %self.channel, "Postgres listener subscribed");

        let handlers = Arc::clone(&self.handlers);
        let channel = self.channel.clone();
        Ok(tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(e) => {
                        // recv reconnects on the next call
                        error!(%channel, error = %e, "Postgres listener error");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                };
                match decode_envelope(None, notification.payload()) {
                    Ok(event) => {
                        handlers.dispatch(&event).await;
                    }
                    Err(e) => warn!(%channel, error = %e, "Dropping undecodable notification"),
                }
            }
        }))
    }
}

/// Encodes a notification, rejecting payloads NOTIFY would refuse.
fn encode(topic: &str, payload: serde_json::Value) -> Result<String, EventBusError> {
    let message = encode_envelope(topic, payload)?;
    if message.len() > MAX_NOTIFY_PAYLOAD {
        return Err(EventBusError::Postgres(format!(
            "Payload for {topic} is {} bytes, NOTIFY allows {MAX_NOTIFY_PAYLOAD}",
            message.len()
        )));
    }
    Ok(message)
}

#[async_trait]
impl EventBus for PostgresEventBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), EventBusError> {
        if !self.is_started() {
            warn!(topic, "Postgres event bus not started, cannot publish");
            return Err(EventBusError::NotStarted {
                topic: topic.to_string(),
            });
        }

        let message = encode(topic, payload)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(&self.channel)
            .bind(&message)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(topic, error = %e, "Failed to publish event");
                EventBusError::from(e)
            })?;

        debug!(topic, channel = %self.channel, "Published event to Postgres");
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

        let listener = self.spawn_listener().await?;
        *self.listener.lock() = Some(listener);
        info!(channel = %self.channel, "Postgres event bus started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), EventBusError> {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
            info!("Postgres event bus stopped");
        }
        Ok(())
    }
}

impl Drop for PostgresEventBus {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for PostgresEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresEventBus")
            .field("channel", &self.channel)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}
