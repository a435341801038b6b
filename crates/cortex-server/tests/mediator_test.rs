//! End-to-end use cases through the mediator and the in-memory module.

mod common;

use common::{chat_history, in_memory_app, record};
use cortex_core::{Aggregate, ChatRole, UseCaseError, UseCaseErrorKind};
use cortex_server::di::CollaboratorResolver;
use cortex_service::{
    ChangeActiveSystemInstruction, CreateSystemInstruction, EventBus, GenerateContent, GetEmbedding,
    ListSystemInstructions, PublishReceivedDirectMessage, PublishReceivedMessage, BOT_SPEAK_TOPIC,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_MOCK_REPLY, DIRECT_MESSAGE_RECEIVED_TOPIC, HEARTBEAT_TOPIC,
};

fn create(provider: &str, instruction: &str, is_active: bool) -> CreateSystemInstruction {
    CreateSystemInstruction {
        provider: provider.into(),
        instruction: instruction.into(),
        is_active,
    }
}

#[tokio::test]
async fn test_instruction_lifecycle() {
    let app = in_memory_app();
    let mediator = app.mediator();

    let first = mediator.send(create("mock", "Be brief.", true)).await.unwrap();
    let second = mediator.send(create("mock", "Be thorough.", false)).await.unwrap();

    let activated = mediator
        .send(ChangeActiveSystemInstruction { instruction_id: second })
        .await
        .unwrap();
    assert_eq!(activated.id(), &second);

    let listed = mediator
        .send(ListSystemInstructions {
            provider: "mock".into(),
        })
        .await
        .unwrap();
    let active: Vec<_> = listed.iter().filter(|i| i.is_active()).map(|i| *i.id()).collect();
    assert_eq!(listed.len(), 2);
    assert_eq!(active, [second]);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_generate_content_stores_reply() {
    let app = in_memory_app();

    let reply = app
        .mediator()
        .send(GenerateContent {
            prompt: Some("hello".into()),
        })
        .await
        .unwrap();

    assert_eq!(reply, DEFAULT_MOCK_REPLY);
    let history = chat_history(&app).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, ChatRole::Model);
}

#[tokio::test]
async fn test_generate_without_prompt_or_history_fails() {
    let app = in_memory_app();
    let err = app.mediator().send(GenerateContent::default()).await.unwrap_err();
    assert_eq!(err.kind(), UseCaseErrorKind::Validation);
}

#[tokio::test]
async fn test_heartbeat_makes_the_model_speak() {
    let app = in_memory_app();
    let bus = app.module().event_bus();
    let spoken = record(bus.as_ref(), BOT_SPEAK_TOPIC);
    app.start().await.unwrap();

    bus.publish(HEARTBEAT_TOPIC, serde_json::json!({})).await.unwrap();

    let channel_id = app.config().worker.speak_channel_id;
    let spoken = spoken.lock().clone();
    assert_eq!(spoken.len(), 1);
    assert_eq!(
        spoken[0].payload,
        serde_json::json!({"content": DEFAULT_MOCK_REPLY, "channel_id": channel_id})
    );

    let history = chat_history(&app).await;
    let turns: Vec<_> = history.iter().map(|m| (m.role, m.content.as_str())).collect();
    assert_eq!(turns, [(ChatRole::Model, DEFAULT_MOCK_REPLY)]);
    app.stop().await.unwrap();
}

#[tokio::test]
async fn test_received_message_is_stored_without_reply() {
    let app = in_memory_app();
    app.start().await.unwrap();

    app.mediator()
        .send(PublishReceivedMessage {
            author: "alice".into(),
            content: "what's up?".into(),
            channel_id: 7,
        })
        .await
        .unwrap();

    let history = chat_history(&app).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, ChatRole::User);
    app.stop().await.unwrap();
}

#[tokio::test]
async fn test_direct_message_published_on_its_topic() {
    let app = in_memory_app();
    let direct = record(app.module().event_bus().as_ref(), DIRECT_MESSAGE_RECEIVED_TOPIC);
    app.start().await.unwrap();

    app.mediator()
        .send(PublishReceivedDirectMessage {
            author: "carol".into(),
            content: "just between us".into(),
            channel_id: 3,
        })
        .await
        .unwrap();

    assert_eq!(direct.lock().len(), 1);
    assert_eq!(chat_history(&app).await.len(), 1);
    app.stop().await.unwrap();
}

#[tokio::test]
async fn test_received_message_without_subscriber_is_only_stored() {
    let app = in_memory_app();

    app.mediator()
        .send(PublishReceivedMessage {
            author: "bob".into(),
            content: "anyone?".into(),
            channel_id: 1,
        })
        .await
        .unwrap();

    assert_eq!(chat_history(&app).await.len(), 1);
}

#[tokio::test]
async fn test_embedding_through_mediator() {
    let app = in_memory_app();
    let mediator = app.mediator();

    let embedding = mediator.send(GetEmbedding { text: "vector".into() }).await.unwrap();
    assert_eq!(embedding.len(), DEFAULT_EMBEDDING_DIMENSION);

    let err = mediator.send(GetEmbedding { text: String::new() }).await.unwrap_err();
    assert_eq!(err, UseCaseError::Validation("Text cannot be empty".into()));
}

#[tokio::test]
async fn test_chained_send() {
    let app = in_memory_app();
    let length = app
        .mediator()
        .send(GenerateContent {
            prompt: Some("count me".into()),
        })
        .map(|reply| reply.len())
        .await
        .unwrap();
    assert_eq!(length, DEFAULT_MOCK_REPLY.len());
}
