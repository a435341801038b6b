use crate::ai_service::AiService;
use async_trait::async_trait;
use cortex_core::{ChatMessage, ChatRole, Request, RequestHandler, SentAt, SystemInstruction, UseCaseError};
use cortex_repository::UnitOfWork;
use serde::{Deserialize, Serialize};
use shaku::{HasComponent, Module, Provider};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Messages of history passed to the model.
pub const HISTORY_LIMIT: usize = 100;

/// Generates the model's next reply and stores it in the chat history.
///
/// Without a prompt, the latest history message is taken as the prompt,
/// which requires it to come from the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContent {
    pub prompt: Option<String>,
}

impl Request for GenerateContent {
    type Response = String;
    type Error = UseCaseError;
}

pub struct GenerateContentHandler {
    unit_of_work: Arc<dyn UnitOfWork>,
    ai: Arc<dyn AiService>,
}

impl GenerateContentHandler {
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>, ai: Arc<dyn AiService>) -> Self {
        Self { unit_of_work, ai }
    }
}

/// Pops the latest message off `history` as the prompt.
fn prompt_from_history(history: &mut Vec<ChatMessage>) -> Result<String, UseCaseError> {
    match history.pop() {
        None => Err(UseCaseError::validation("No prompt provided and history is empty")),
        Some(last) if last.is_from_user() => Ok(last.content),
        Some(_) => Err(UseCaseError::validation(
            "Last message is not from user, and no prompt provided",
        )),
    }
}

#[async_trait]
impl RequestHandler<GenerateContent> for GenerateContentHandler {
    async fn handle(&self, request: GenerateContent) -> Result<String, UseCaseError> {
        let scope = self.unit_of_work.begin().await?;
        let chat_history = scope.repository::<ChatMessage>()?;

        let mut history = chat_history.recent_history(HISTORY_LIMIT).await?;
        let prompt = match request.prompt.filter(|p| !p.is_empty()) {
            Some(prompt) => prompt,
            None => prompt_from_history(&mut history)?,
        };

        let provider = self.ai.provider();
        let system_instruction = scope
            .repository::<SystemInstruction>()?
            .find_active_by_provider(provider)
            .await?
            .map(|active| active.instruction().to_string());
        debug!(
            %provider,
            history = history.len(),
            has_instruction = system_instruction.is_some(),
            "Generating content"
        );

        let content = self
            .ai
            .generate_content(&prompt, &history, system_instruction)
            .await
            .map_err(|e| {
                error!(%provider, error = %e, "Content generation failed");
                UseCaseError::unexpected("Failed to generate content")
            })?;

        let reply = ChatMessage::create(ChatRole::Model, content.clone(), SentAt::now())?;
        chat_history.add(&reply).await?;
        scope.commit().await?;

        info!(%provider, reply_len = content.len(), "Content generated");
        Ok(content)
    }
}

impl<M> Provider<M> for GenerateContentHandler
where
    M: Module + HasComponent<dyn UnitOfWork> + HasComponent<dyn AiService>,
{
    type Interface = dyn RequestHandler<GenerateContent>;

    fn provide(module: &M) -> Result<Box<Self::Interface>, Box<dyn std::error::Error>> {
        Ok(Box::new(Self::new(
            HasComponent::<dyn UnitOfWork>::resolve(module),
            HasComponent::<dyn AiService>::resolve(module),
        )))
    }
}
