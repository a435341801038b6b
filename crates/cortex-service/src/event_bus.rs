//! Publish/subscribe messaging.
//!
//! Topics are dotted names such as `chat.message_received`. A subscription
//! topic containing `*` or `?` is a glob pattern: `*` matches any run of
//! characters and `?` exactly one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_core::{BoxFuture, Interface};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

/// Topic published when a user message is stored.
pub const MESSAGE_RECEIVED_TOPIC: &str = "chat.message_received";

/// Topic published when a direct message is stored.
pub const DIRECT_MESSAGE_RECEIVED_TOPIC: &str = "chat.direct_message_received";

/// Periodic tick driving spontaneous dialog.
pub const HEARTBEAT_TOPIC: &str = "system.heartbeat";

/// Carries `{content, channel_id}` for the chat front end to post.
pub const BOT_SPEAK_TOPIC: &str = "bot.speak";

/// A published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event with a fresh id and the current time.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Event bus errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The bus has no connection yet.
    #[error("Event bus not started, cannot publish event: {topic}")]
    NotStarted { topic: String },

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Postgres error: {0}")]
    Postgres(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Returned by a subscriber; logged by the bus, never raised to publishers.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl From<serde_json::Error> for EventBusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for EventBusError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<sqlx::Error> for EventBusError {
    fn from(err: sqlx::Error) -> Self {
        Self::Postgres(err.to_string())
    }
}

/// Wire format shared by the networked buses.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default = "empty_payload")]
    payload: serde_json::Value,
}

pub(crate) fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Serializes a topic and payload as `{"topic", "payload"}`.
pub(crate) fn encode_envelope(topic: &str, payload: serde_json::Value) -> Result<String, EventBusError> {
    Ok(serde_json::to_string(&Envelope {
        topic: Some(topic.to_string()),
        payload,
    })?)
}

/// Rebuilds an event from an envelope. `fallback_topic` applies when the
/// envelope carries none; without one the message is rejected.
pub(crate) fn decode_envelope(fallback_topic: Option<&str>, data: &str) -> Result<Event, EventBusError> {
    let envelope: Envelope = serde_json::from_str(data)?;
    let topic = envelope
        .topic
        .or_else(|| fallback_topic.map(str::to_string))
        .ok_or_else(|| EventBusError::Serialization("Message without topic".to_string()))?;
    Ok(Event::new(topic, envelope.payload))
}

/// Subscriber callback.
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<(), EventBusError>> + Send + Sync>;

/// Wraps an async closure as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), EventBusError>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Publish/subscribe port.
#[async_trait]
pub trait EventBus: Interface {
    /// Publishes a payload under a topic.
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), EventBusError>;

    /// Registers a handler for a topic or topic pattern.
    fn subscribe(&self, topic: &str, handler: EventHandler);

    /// Connects and starts delivering events.
    async fn start(&self) -> Result<(), EventBusError>;

    /// Stops delivering events.
    async fn stop(&self) -> Result<(), EventBusError> {
        Ok(())
    }
}

/// Checks whether a subscription topic is a glob pattern.
#[must_use]
pub fn is_pattern(topic: &str) -> bool {
    topic.contains(['*', '?'])
}

/// Matches a topic against a glob pattern.
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let topic: Vec<char> = topic.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < topic.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == topic[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Handlers keyed by subscription topic.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. Returns `true` for the first handler of a topic.
    pub fn add(&self, topic: &str, handler: EventHandler) -> bool {
        let mut handlers = self.handlers.write();
        let entry = handlers.entry(topic.to_string()).or_default();
        entry.push(handler);
        entry.len() == 1
    }

    /// Subscription topics in registration-independent order.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn matching(&self, topic: &str) -> Vec<(String, EventHandler)> {
        self.handlers
            .read()
            .iter()
            .filter(|(key, _)| key.as_str() == topic || (is_pattern(key) && topic_matches(key, topic)))
            .flat_map(|(key, handlers)| handlers.iter().map(move |h| (key.clone(), Arc::clone(h))))
            .collect()
    }

    /// Runs every handler subscribed to the event's topic.
    ///
    /// Handler failures are logged and swallowed. Returns how many handlers
    /// ran.
    pub async fn dispatch(&self, event: &Event) -> usize {
        let matching = self.matching(&event.topic);
        debug!(topic = %event.topic, handlers = matching.len(), "Dispatching event");

        for (subscription, handler) in &matching {
            if let Err(e) = handler(event.clone()).await {
                error!(topic = %event.topic, %subscription, error = %e, "Event handler failed");
            }
        }
        matching.len()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pattern_detection() {
        assert!(is_pattern("chat.*"));
        assert!(is_pattern("chat.?"));
        assert!(!is_pattern("chat.message_received"));
    }

    #[test]
    fn test_glob_matching() {
        assert!(topic_matches("*", "anything.at.all"));
        assert!(topic_matches("chat.*", "chat.message_received"));
        assert!(topic_matches("chat.*.done", "chat.a.b.done"));
        assert!(topic_matches("job.?", "job.1"));
        assert!(!topic_matches("job.?", "job.12"));
        assert!(!topic_matches("chat.*", "system.heartbeat"));
        assert!(topic_matches("exact", "exact"));
        assert!(!topic_matches("exact", "exactly"));
    }

    #[test]
    fn test_envelope_keeps_topic_and_payload() {
        let data = encode_envelope("bot.speak", serde_json::json!({"content": "hi"})).unwrap();
        let event = decode_envelope(None, &data).unwrap();
        assert_eq!(event.topic, "bot.speak");
        assert_eq!(event.payload["content"], "hi");
    }

    #[test]
    fn test_envelope_without_topic() {
        let event = decode_envelope(Some("chat.x"), "{}").unwrap();
        assert_eq!(event.topic, "chat.x");
        assert_eq!(event.payload, empty_payload());

        assert_eq!(
            decode_envelope(None, r#"{"payload":{}}"#).unwrap_err(),
            EventBusError::Serialization("Message without topic".into())
        );
    }

    #[tokio::test]
    async fn test_dispatch_reaches_exact_and_pattern_subscribers() {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for topic in ["chat.message_received", "chat.*", "system.*"] {
            let calls = Arc::clone(&calls);
            registry.add(
                topic,
                handler(move |_| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            );
        }

        let ran = registry
            .dispatch(&Event::new("chat.message_received", serde_json::json!({})))
            .await;
        assert_eq!(ran, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        registry.add("t", handler(|_| async { Err(EventBusError::Handler("boom".into())) }));
        let counted = Arc::clone(&calls);
        registry.add(
            "t",
            handler(move |_| {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        assert_eq!(registry.dispatch(&Event::new("t", serde_json::Value::Null)).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
