//! Common test infrastructure for end-to-end tests.

#![allow(dead_code)]

use cortex_config::AppConfig;
use cortex_core::ChatMessage;
use cortex_server::app::App;
use cortex_server::di::{build_in_memory_module, CollaboratorResolver};
use cortex_service::{handler, Event, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;

/// Application over the in-memory module, not yet started.
pub fn in_memory_app() -> App {
    App::from_module(AppConfig::in_memory(), build_in_memory_module()).expect("Failed to wire application")
}

/// Reads the stored chat history, oldest first.
pub async fn chat_history(app: &App) -> Vec<ChatMessage> {
    let scope = app.module().unit_of_work().begin().await.unwrap();
    let history = scope
        .repository::<ChatMessage>()
        .unwrap()
        .recent_history(100)
        .await
        .unwrap();
    scope.rollback().await.unwrap();
    history
}

/// Records every event published on `topic`.
pub fn record(bus: &dyn EventBus, topic: &str) -> Arc<Mutex<Vec<Event>>> {
    let seen: Arc<Mutex<Vec<Event>>> = Arc::default();
    let sink = Arc::clone(&seen);
    bus.subscribe(
        topic,
        handler(move |event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(event);
                Ok(())
            }
        }),
    );
    seen
}
