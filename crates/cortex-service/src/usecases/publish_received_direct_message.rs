use super::publish_received_message::store_and_announce;
use crate::event_bus::{EventBus, DIRECT_MESSAGE_RECEIVED_TOPIC};
use async_trait::async_trait;
use cortex_core::{Request, RequestHandler, UseCaseError};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;

/// Stores a direct message and announces it on its own topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceivedDirectMessage {
    pub author: String,
    pub content: String,
    pub channel_id: u64,
}

impl Request for PublishReceivedDirectMessage {
    type Response = ();
    type Error = UseCaseError;
}

pub struct PublishReceivedDirectMessageHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
    event_bus: Arc<dyn EventBus>,
}

impl PublishReceivedDirectMessageHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            unit_of_work,
            event_bus,
        }
    }
}

#[async_trait]
impl RequestHandler<PublishReceivedDirectMessage> for PublishReceivedDirectMessageHandler {
    async fn handle(&self, request: PublishReceivedDirectMessage) -> Result<(), UseCaseError> {
        store_and_announce(
            self.unit_of_work.as_ref(),
            self.event_bus.as_ref(),
            DIRECT_MESSAGE_RECEIVED_TOPIC,
            request.author,
            request.content,
            request.channel_id,
        )
        .await
    }
}

impl<M> Provider<M> for PublishReceivedDirectMessageHandler
where
    M: Module + HasComponent<dyn UnitOfWork> + HasComponent<dyn EventBus>,
{
    type Interface = dyn RequestHandler<PublishReceivedDirectMessage>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(
            HasComponent::<dyn UnitOfWork>::resolve(module),
            HasComponent::<dyn EventBus>::resolve(module),
        )))
    }
}
