use crate::ai_service::AiService;
use async_trait::async_trait;
use cortex_core::{ChatMessage, ChatRole, Request, RequestHandler, SentAt, SystemInstruction, UseCaseError};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Messages of history the model sees before speaking up.
pub const SPONTANEOUS_HISTORY_LIMIT: usize = 20;

/// Internal prompt asking the model to start a conversation.
///
/// Appended to the active system instruction; never stored in the history.
pub const SPONTANEOUS_PROMPT: &str = "# シチュエーション\n\
- あなたはおしゃべりがしたい気分です。\n\
\n\
# タスク\n\
- マスターに話しかけるための短いメッセージを生成してください。\n\
\n\
# Negative Constraints\n\
- 毎回「こんにちは」「ハロー」などの定型的な挨拶で文を始めないこと。\n\
- 長文になりすぎないこと。";

/// Lets the model speak without being prompted.
///
/// The generated message is stored as a model turn; the caller decides
/// where it is delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpontaneousDialog {
    pub channel_id: u64,
}

/// A message the model produced on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpontaneousUtterance {
    pub content: String,
    pub channel_id: u64,
}

impl Request for SpontaneousDialog {
    type Response = SpontaneousUtterance;
    type Error = UseCaseError;
}

pub struct SpontaneousDialogHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
    ai: Arc<dyn AiService>,
}

impl SpontaneousDialogHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>, ai: Arc<dyn AiService>) -> Self {
        Self { unit_of_work, ai }
    }
}

fn system_instruction(active: Option<&SystemInstruction>) -> String {
    match active {
        Some(active) => format!("{}\n{SPONTANEOUS_PROMPT}", active.instruction()),
        None => SPONTANEOUS_PROMPT.to_string(),
    }
}

#[async_trait]
impl RequestHandler<SpontaneousDialog> for SpontaneousDialogHandler {
    async fn handle(&self, request: SpontaneousDialog) -> Result<SpontaneousUtterance, UseCaseError> {
        let scope = self.unit_of_work.begin().await?;
        let chat_history = scope.repository::<ChatMessage>()?;

        let history = chat_history
            .recent_history(SPONTANEOUS_HISTORY_LIMIT)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load chat history");
                UseCaseError::unexpected("Failed to retrieve chat history")
            })?;

        let provider = self.ai.provider();
        let active = match scope
            .repository::<SystemInstruction>()?
            .find_active_by_provider(provider)
            .await
        {
            Ok(active) => active,
            Err(e) => {
                warn!(%provider, error = %e, "Active instruction unavailable, speaking without it");
                None
            }
        };

        let content = self
            .ai
            .generate_content("", &history, Some(system_instruction(active.as_ref())))
            .await
            .map_err(|e| {
                error!(%provider, error = %e, "Spontaneous generation failed");
                UseCaseError::unexpected(format!("Failed to generate content: {e}"))
            })?;

        let message = ChatMessage::create(ChatRole::Model, content.clone(), SentAt::now())?;
        chat_history.add(&message).await?;
        scope.commit().await?;

        info!(%provider, channel_id = request.channel_id, "Spontaneous message stored");
        Ok(SpontaneousUtterance {
            content,
            channel_id: request.channel_id,
        })
    }
}

impl<M> Provider<M> for SpontaneousDialogHandler
where
    M: Module + HasComponent<dyn UnitOfWork> + HasComponent<dyn AiService>,
{
    type Interface = dyn RequestHandler<SpontaneousDialog>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(
            HasComponent::<dyn UnitOfWork>::resolve(module),
            HasComponent::<dyn AiService>::resolve(module),
        )))
    }
}
