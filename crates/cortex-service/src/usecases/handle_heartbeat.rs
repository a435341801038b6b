use super::spontaneous_dialog::{SpontaneousDialog, SpontaneousUtterance};
use crate::event_bus::{EventBus, BOT_SPEAK_TOPIC};
use async_trait::async_trait;
use cortex_core::{Request, RequestHandler, UseCaseError};
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, HasProvider, Module, Provider};
use std::sync::Arc;
use tracing::{error, info};

/// Reacts to a worker heartbeat by letting the model speak up.
///
/// The utterance is stored by [`SpontaneousDialog`] and published on
/// [`BOT_SPEAK_TOPIC`] as `{content, channel_id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HandleHeartbeat {
    pub channel_id: u64,
}

impl Request for HandleHeartbeat {
    type Response = SpontaneousUtterance;
    type Error = UseCaseError;
}

pub struct HandleHeartbeatHandler {
    dialog: Box<dyn RequestHandler<SpontaneousDialog>>,
    event_bus: Arc<dyn EventBus>,
}

impl HandleHeartbeatHandler {
    #[must_use]
    pub fn new(dialog: Box<dyn RequestHandler<SpontaneousDialog>>, event_bus: Arc<dyn EventBus>) -> Self {
        Self { dialog, event_bus }
    }
}

#[async_trait]
impl RequestHandler<HandleHeartbeat> for HandleHeartbeatHandler {
    async fn handle(&self, request: HandleHeartbeat) -> Result<SpontaneousUtterance, UseCaseError> {
        let utterance = self
            .dialog
            .handle(SpontaneousDialog {
                channel_id: request.channel_id,
            })
            .await?;

        let payload = serde_json::json!({
            "content": utterance.content,
            "channel_id": utterance.channel_id,
        });
        self.event_bus.publish(BOT_SPEAK_TOPIC, payload).await.map_err(|e| {
            error!(topic = BOT_SPEAK_TOPIC, error = %e, "Failed to publish utterance");
            UseCaseError::unexpected(format!("Failed to publish event: {e}"))
        })?;

        info!(channel_id = utterance.channel_id, "Heartbeat handled");
        Ok(utterance)
    }
}

impl<M> Provider<M> for HandleHeartbeatHandler
where
    M: Module + HasComponent<dyn EventBus> + HasProvider<dyn RequestHandler<SpontaneousDialog>>,
{
    type Interface = dyn RequestHandler<HandleHeartbeat>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        let dialog = HasProvider::<dyn RequestHandler<SpontaneousDialog>>::provide(module)?;
        Ok(Box::new(Self::new(dialog, HasComponent::<dyn EventBus>::resolve(module))))
    }
}
