use crate::event_bus::{EventBus, MESSAGE_RECEIVED_TOPIC};
use async_trait::async_trait;
use cortex_core::{ChatMessage, ChatRole, Request, RequestHandler, SentAt, UseCaseError};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::{debug, error};

/// Stores an incoming chat message and announces it on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceivedMessage {
    pub author: String,
    pub content: String,
    pub channel_id: u64,
}

impl Request for PublishReceivedMessage {
    type Response = ();
    type Error = UseCaseError;
}

pub struct PublishReceivedMessageHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
    event_bus: Arc<dyn EventBus>,
}

impl PublishReceivedMessageHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            unit_of_work,
            event_bus,
        }
    }
}

/// Stores `content` as a user message, then publishes it on `topic`.
///
/// The message stays stored when publishing fails.
pub(crate) async fn store_and_announce(
    unit_of_work: &dyn UnitOfWork,
    event_bus: &dyn EventBus,
    topic: &str,
    author: String,
    content: String,
    channel_id: u64,
) -> Result<(), UseCaseError> {
    let message = ChatMessage::create(ChatRole::User, content.clone(), SentAt::now())?;

    let scope = unit_of_work.begin().await?;
    scope.repository::<ChatMessage>()?.add(&message).await?;
    scope.commit().await?;
    debug!(id = %message.id, %author, topic, "Stored received message");

    let payload = serde_json::json!({
        "author": author,
        "content": content,
        "channel_id": channel_id,
    });
    event_bus.publish(topic, payload).await.map_err(|e| {
        error!(topic, error = %e, "Failed to publish received message");
        UseCaseError::unexpected(format!("Failed to publish message: {e}"))
    })
}

#[async_trait]
impl RequestHandler<PublishReceivedMessage> for PublishReceivedMessageHandler {
    async fn handle(&self, request: PublishReceivedMessage) -> Result<(), UseCaseError> {
        store_and_announce(
            self.unit_of_work.as_ref(),
            self.event_bus.as_ref(),
            MESSAGE_RECEIVED_TOPIC,
            request.author,
            request.content,
            request.channel_id,
        )
        .await
    }
}

impl<M> Provider<M> for PublishReceivedMessageHandler
where
    M: Module + HasComponent<dyn UnitOfWork> + HasComponent<dyn EventBus>,
{
    type Interface = dyn RequestHandler<PublishReceivedMessage>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(
            HasComponent::<dyn UnitOfWork>::resolve(module),
            HasComponent::<dyn EventBus>::resolve(module),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{handler, Event, EventBusError};
    use crate::r#impl::InMemoryEventBus;
    use crate::usecases::testing;
    use cortex_core::UseCaseErrorKind;
    use parking_lot::Mutex;

    fn command() -> PublishReceivedMessage {
        PublishReceivedMessage {
            author: "alice".into(),
            content: "hello there".into(),
            channel_id: 42,
        }
    }

    #[tokio::test]
    async fn test_stores_then_publishes() {
        let (uow, store) = testing::unit_of_work();
        let bus = Arc::new(InMemoryEventBus::new());
        let seen: Arc<Mutex<Vec<Event>>> = Arc::default();
        let sink = Arc::clone(&seen);
        bus.subscribe(
            "chat.*",
            handler(move |event| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(event);
                    Ok(())
                }
            }),
        );
        bus.start().await.unwrap();

        PublishReceivedMessageHandler::new(uow, bus)
            .handle(command())
            .await
            .unwrap();

        assert_eq!(store.row_count("chat_messages"), 1);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].topic, MESSAGE_RECEIVED_TOPIC);
        assert_eq!(
            seen[0].payload,
            serde_json::json!({"author": "alice", "content": "hello there", "channel_id": 42})
        );
    }

    #[tokio::test]
    async fn test_blank_content_rejected_before_storing() {
        let (uow, store) = testing::unit_of_work();
        let bus = Arc::new(InMemoryEventBus::new());

        let err = PublishReceivedMessageHandler::new(uow, bus)
            .handle(PublishReceivedMessage {
                content: "  ".into(),
                ..command()
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), UseCaseErrorKind::Validation);
        assert_eq!(store.row_count("chat_messages"), 0);
    }

    struct ClosedBus;

    #[async_trait]
    impl EventBus for ClosedBus {
        async fn publish(&self, topic: &str, _payload: serde_json::Value) -> Result<(), EventBusError> {
            Err(EventBusError::NotStarted {
                topic: topic.to_string(),
            })
        }

        fn subscribe(&self, _topic: &str, _handler: crate::event_bus::EventHandler) {}

        async fn start(&self) -> Result<(), EventBusError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_stored_message() {
        let (uow, store) = testing::unit_of_work();

        let err = PublishReceivedMessageHandler::new(uow, Arc::new(ClosedBus))
            .handle(command())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), UseCaseErrorKind::Unexpected);
        assert_eq!(store.row_count("chat_messages"), 1);
    }
}
