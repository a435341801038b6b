//! Unit of work and optimistic locking against the in-memory store.

mod common;

use async_trait::async_trait;
use common::in_memory_unit_of_work;
use cortex_core::{
    Aggregate, AiProvider, ChatMessage, ChatRole, Primitive, RepositoryError, RepositoryErrorKind, RepositoryResult,
    SentAt, SystemInstruction, Version,
};
use cortex_repository::{
    GenericRepository, MappingRegistry, Query, Record, RecordSchema, Session, UnitOfWork,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

async fn seed_instruction(uow: &impl UnitOfWork) -> SystemInstruction {
    let scope = uow.begin().await.unwrap();
    let stored = scope
        .repository::<SystemInstruction>()
        .unwrap()
        .add(&SystemInstruction::create(AiProvider::Gemini, "You are helpful.", true).unwrap())
        .await
        .unwrap();
    scope.commit().await.unwrap();
    stored
}

#[tokio::test]
async fn test_concurrent_scopes_second_writer_conflicts() {
    let (uow, _store) = in_memory_unit_of_work();
    let seeded = seed_instruction(&uow).await;

    let first = uow.begin().await.unwrap();
    let second = uow.begin().await.unwrap();

    let mut a = first
        .repository::<SystemInstruction>()
        .unwrap()
        .get_by_id(seeded.id())
        .await
        .unwrap();
    let mut b = second
        .repository::<SystemInstruction>()
        .unwrap()
        .get_by_id(seeded.id())
        .await
        .unwrap();

    a.deactivate();
    first.repository::<SystemInstruction>().unwrap().update(&a).await.unwrap();
    first.commit().await.unwrap();

    b.deactivate();
    let err = second
        .repository::<SystemInstruction>()
        .unwrap()
        .update(&b)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RepositoryError::version_conflict("SystemInstruction", seeded.id(), 0, 1)
    );
    second.rollback().await.unwrap();

    let check = uow.begin().await.unwrap();
    let stored = check
        .repository::<SystemInstruction>()
        .unwrap()
        .get_by_id(seeded.id())
        .await
        .unwrap();
    assert_eq!(stored.version(), Some(Version::new(1)));
}

#[tokio::test]
async fn test_conflict_detected_at_commit() {
    let (uow, _store) = in_memory_unit_of_work();
    let seeded = seed_instruction(&uow).await;

    let first = uow.begin().await.unwrap();
    let second = uow.begin().await.unwrap();

    let mut a = seeded.clone();
    a.deactivate();
    first.repository::<SystemInstruction>().unwrap().update(&a).await.unwrap();

    let mut b = seeded.clone();
    b.deactivate();
    second.repository::<SystemInstruction>().unwrap().update(&b).await.unwrap();

    first.commit().await.unwrap();
    let err = second.commit().await.unwrap_err();
    assert_eq!(err.kind(), RepositoryErrorKind::VersionConflict);
}

#[tokio::test]
async fn test_early_return_rolls_back() {
    async fn fails_midway(uow: &impl UnitOfWork, seeded: &SystemInstruction) -> RepositoryResult<()> {
        let scope = uow.begin().await?;
        let mut changed = seeded.clone();
        changed.deactivate();
        scope.repository::<SystemInstruction>()?.update(&changed).await?;
        scope
            .repository::<ChatMessage>()?
            .add(&ChatMessage::create(ChatRole::User, "half done", SentAt::now()).unwrap())
            .await?;
        Err(RepositoryError::unexpected("downstream failure"))
    }

    let (uow, store) = in_memory_unit_of_work();
    let seeded = seed_instruction(&uow).await;
    assert!(fails_midway(&uow, &seeded).await.is_err());
    assert_eq!(store.row_count("chat_messages"), 0);

    let check = uow.begin().await.unwrap();
    let stored = check
        .repository::<SystemInstruction>()
        .unwrap()
        .get_by_id(seeded.id())
        .await
        .unwrap();
    assert_eq!(stored.version(), seeded.version());
    assert!(stored.is_active());
    assert_eq!(stored.instruction(), "You are helpful.");
    assert_eq!(stored.provider(), AiProvider::Gemini);
    assert_eq!(stored.updated_at(), seeded.updated_at());
    assert!(check
        .repository::<ChatMessage>()
        .unwrap()
        .recent_history(10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_writes_in_one_scope_commit_together() {
    let (uow, store) = in_memory_unit_of_work();

    let scope = uow.begin().await.unwrap();
    let history = scope.repository::<ChatMessage>().unwrap();
    let instructions = scope.repository::<SystemInstruction>().unwrap();
    history
        .add(&ChatMessage::create(ChatRole::User, "hi", SentAt::now()).unwrap())
        .await
        .unwrap();
    instructions
        .add(&SystemInstruction::create(AiProvider::Mock, "Mock.", true).unwrap())
        .await
        .unwrap();

    assert_eq!(history.recent_history(10).await.unwrap().len(), 1);
    scope.commit().await.unwrap();

    assert_eq!(store.row_count("chat_messages"), 1);
    assert_eq!(store.row_count("system_instructions"), 1);
}

/// Session replaying canned lookups, for races the real stores cannot stage.
struct ScriptedSession {
    finds: VecDeque<Option<Record>>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn find(&mut self, _: &'static RecordSchema, _: &Primitive) -> RepositoryResult<Option<Record>> {
        Ok(self.finds.pop_front().flatten())
    }

    async fn select(&mut self, _: &'static RecordSchema, _: &Query) -> RepositoryResult<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn insert(&mut self, _: &'static RecordSchema, record: Record) -> RepositoryResult<Record> {
        Ok(record)
    }

    async fn update_versioned(&mut self, _: &'static RecordSchema, _: Record, _: u64) -> RepositoryResult<u64> {
        Ok(0)
    }

    async fn upsert(&mut self, _: &'static RecordSchema, record: Record) -> RepositoryResult<Record> {
        Ok(record)
    }

    async fn delete(&mut self, _: &'static RecordSchema, _: &Primitive) -> RepositoryResult<u64> {
        Ok(0)
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_row_deleted_during_update_is_not_found() {
    let mappings = Arc::new(MappingRegistry::standard());
    let instruction = SystemInstruction::create(AiProvider::Gpt, "Short answers.", false).unwrap();
    let existing = mappings.to_record(&instruction).unwrap();

    let session: Box<dyn Session> = Box::new(ScriptedSession {
        finds: VecDeque::from([Some(existing), None]),
    });
    let repo: GenericRepository<SystemInstruction> =
        GenericRepository::new(Arc::new(Mutex::new(Some(session))), mappings).unwrap();

    let err = repo.update(&instruction).await.unwrap_err();
    assert_eq!(err.kind(), RepositoryErrorKind::NotFound);
}
