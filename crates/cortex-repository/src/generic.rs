//! Generic repository with optimistic locking.

use crate::mapping::{EntityMapping, MappingRegistry};
use crate::record::{Record, RecordSchema, UPDATED_AT_COLUMN};
use crate::session::{Query, Session};
use chrono::Utc;
use cortex_core::{combine, Primitive, RepositoryError, RepositoryResult, ValueObject};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, error, warn};

/// Session shared by every repository of one unit-of-work scope.
///
/// `None` once the scope has committed or rolled back.
pub type SharedSession = Arc<Mutex<Option<Box<dyn Session>>>>;

/// CRUD over one aggregate type, bound to a session.
pub struct GenericRepository<T> {
    session: SharedSession,
    mappings: Arc<MappingRegistry>,
    schema: &'static RecordSchema,
    _entity: PhantomData<fn() -> T>,
}

impl<T: EntityMapping> GenericRepository<T> {
    /// Binds a repository to a session.
    ///
    /// # Errors
    ///
    /// Fails when `T` has no registered mapping.
    pub fn new(session: SharedSession, mappings: Arc<MappingRegistry>) -> RepositoryResult<Self> {
        let schema = mappings.schema::<T>().map_err(|e| {
            error!(entity = T::NAME, error = %e, "No mapping registered for aggregate");
            RepositoryError::from(e)
        })?;

        Ok(Self {
            session,
            mappings,
            schema,
            _entity: PhantomData,
        })
    }

    /// Returns the table schema.
    #[must_use]
    pub const fn schema(&self) -> &'static RecordSchema {
        self.schema
    }

    async fn session(&self) -> RepositoryResult<OwnedMappedMutexGuard<Option<Box<dyn Session>>, Box<dyn Session>>> {
        let guard = Arc::clone(&self.session).lock_owned().await;
        OwnedMutexGuard::try_map(guard, Option::as_mut).map_err(|_| {
            warn!(entity = T::NAME, "Repository used after its unit of work ended");
            RepositoryError::unexpected("session closed")
        })
    }

    fn require_id(record: &Record) -> RepositoryResult<Primitive> {
        record
            .id()
            .cloned()
            .ok_or_else(|| RepositoryError::unexpected("Entity does not have an id attribute"))
    }

    fn to_entity(&self, record: &Record) -> RepositoryResult<T> {
        Ok(self.mappings.from_record::<T>(record)?)
    }

    /// Loads an aggregate by id.
    ///
    /// # Errors
    ///
    /// `NotFound` when no row has the id.
    pub async fn get_by_id(&self, id: &T::Id) -> RepositoryResult<T> {
        debug!(entity = T::NAME, %id, "Fetching by id");
        let record = self
            .session()
            .await?
            .find(self.schema, &id.to_primitive()?)
            .await?
            .ok_or_else(|| RepositoryError::not_found(T::NAME, id))?;
        self.to_entity(&record)
    }

    /// Inserts a new aggregate and returns it as stored.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when a row has the same id.
    pub async fn add(&self, entity: &T) -> RepositoryResult<T> {
        let record = self.mappings.to_record(entity)?;
        let id = Self::require_id(&record)?;
        debug!(entity = T::NAME, %id, "Adding");

        let mut session = self.session().await?;
        if session.find(self.schema, &id).await?.is_some() {
            return Err(RepositoryError::already_exists(T::NAME, entity.id()));
        }
        let stored = session.insert(self.schema, record).await?;
        drop(session);

        self.to_entity(&stored)
    }

    /// Writes an aggregate back.
    ///
    /// Versioned aggregates are written with one conditional statement
    /// guarded by the version they were loaded at; losing that race is a
    /// `VersionConflict` carrying both versions. Unversioned aggregates are
    /// upserted.
    ///
    /// # Errors
    ///
    /// `NotFound` when the row is missing or was deleted concurrently.
    pub async fn update(&self, entity: &T) -> RepositoryResult<T> {
        let mut record = self.mappings.to_record(entity)?;
        let id = Self::require_id(&record)?;

        let mut session = self.session().await?;
        if session.find(self.schema, &id).await?.is_none() {
            return Err(RepositoryError::not_found(T::NAME, entity.id()));
        }

        if T::AUDITED && self.schema.has_column(UPDATED_AT_COLUMN) {
            record.set(UPDATED_AT_COLUMN, Primitive::Timestamp(Utc::now()));
        }

        let stored = match entity.version() {
            Some(expected) if self.schema.is_versioned() => {
                let expected = expected.value();
                debug!(entity = T::NAME, %id, expected, "Updating with version check");

                let rows = session.update_versioned(self.schema, record, expected).await?;
                if rows == 0 {
                    return match session.find(self.schema, &id).await? {
                        None => Err(RepositoryError::not_found(T::NAME, entity.id())),
                        Some(current) => {
                            let actual = current.version().unwrap_or_default();
                            warn!(entity = T::NAME, %id, expected, actual, "Optimistic lock lost");
                            Err(RepositoryError::version_conflict(T::NAME, entity.id(), expected, actual))
                        }
                    };
                }

                session
                    .find(self.schema, &id)
                    .await?
                    .ok_or_else(|| RepositoryError::not_found(T::NAME, entity.id()))?
            }
            _ => {
                debug!(entity = T::NAME, %id, "Upserting");
                session.upsert(self.schema, record).await?
            }
        };
        drop(session);

        self.to_entity(&stored)
    }

    /// Deletes an aggregate.
    ///
    /// # Errors
    ///
    /// `NotFound` when no row has the id.
    pub async fn delete(&self, entity: &T) -> RepositoryResult<()> {
        let record = self.mappings.to_record(entity)?;
        let id = Self::require_id(&record)?;
        debug!(entity = T::NAME, %id, "Deleting");

        let mut session = self.session().await?;
        if session.find(self.schema, &id).await?.is_none() {
            return Err(RepositoryError::not_found(T::NAME, entity.id()));
        }
        session.delete(self.schema, &id).await?;
        Ok(())
    }

    /// Loads every aggregate matching a query.
    pub async fn find(&self, query: &Query) -> RepositoryResult<Vec<T>> {
        let records = self.session().await?.select(self.schema, query).await?;
        debug!(entity = T::NAME, rows = records.len(), "Query returned");
        combine(records.iter().map(|record| self.to_entity(record)))
    }

    /// Loads the first aggregate matching a query.
    pub async fn find_one(&self, query: &Query) -> RepositoryResult<Option<T>> {
        let query = query.clone().limit(1);
        Ok(self.find(&query).await?.into_iter().next())
    }
}

impl<T> std::fmt::Debug for GenericRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericRepository")
            .field("table", &self.schema.table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InMemorySessionFactory, InMemoryStore, SessionFactory};
    use cortex_core::{
        Aggregate, AiProvider, ChatMessage, ChatRole, RepositoryErrorKind, SentAt, SystemInstruction, Version,
    };

    async fn repository<T: EntityMapping>(store: &Arc<InMemoryStore>) -> GenericRepository<T> {
        let session = InMemorySessionFactory::new(Arc::clone(store)).open().await.unwrap();
        GenericRepository::new(
            Arc::new(Mutex::new(Some(session))),
            Arc::new(MappingRegistry::standard()),
        )
        .unwrap()
    }

    fn instruction() -> SystemInstruction {
        SystemInstruction::create(AiProvider::Gemini, "Answer briefly.", true).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;
        let created = instruction();

        let stored = repo.add(&created).await.unwrap();
        assert_eq!(stored.id(), created.id());

        let loaded = repo.get_by_id(created.id()).await.unwrap();
        assert_eq!(loaded.instruction(), "Answer briefly.");
        assert_eq!(loaded.version(), Some(Version::INITIAL));
    }

    #[tokio::test]
    async fn test_add_twice_already_exists() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;
        let created = instruction();
        repo.add(&created).await.unwrap();

        let err = repo.add(&created).await.unwrap_err();
        assert_eq!(err.kind(), RepositoryErrorKind::AlreadyExists);
        assert_eq!(
            err.to_string(),
            format!("SystemInstruction with id {} already exists", created.id())
        );
    }

    #[tokio::test]
    async fn test_get_missing_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;
        let missing = instruction();

        let err = repo.get_by_id(missing.id()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("SystemInstruction with id {} not found", missing.id())
        );
    }

    #[tokio::test]
    async fn test_versioned_update_increments_once() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;
        let mut loaded = repo.add(&instruction()).await.unwrap();
        let created_at = loaded.created_at();

        loaded.deactivate();
        let updated = repo.update(&loaded).await.unwrap();

        assert_eq!(updated.version(), Some(Version::new(1)));
        assert!(!updated.is_active());
        assert_eq!(updated.created_at(), created_at);
        assert!(updated.updated_at() >= loaded.updated_at());
    }

    #[tokio::test]
    async fn test_stale_update_is_version_conflict() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;
        let original = repo.add(&instruction()).await.unwrap();

        let mut first = original.clone();
        first.deactivate();
        repo.update(&first).await.unwrap();

        let mut stale = original;
        stale.deactivate();
        let err = repo.update(&stale).await.unwrap_err();
        match err {
            RepositoryError::VersionConflict { expected, actual, .. } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_missing_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;

        let err = repo.update(&instruction()).await.unwrap_err();
        assert_eq!(err.kind(), RepositoryErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unversioned_update_upserts() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<ChatMessage>(&store).await;
        let mut message = repo
            .add(&ChatMessage::create(ChatRole::User, "hi", SentAt::now()).unwrap())
            .await
            .unwrap();

        message.content = "hello".into();
        let updated = repo.update(&message).await.unwrap();
        assert_eq!(updated.content, "hello");
    }

    #[tokio::test]
    async fn test_delete_then_missing() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<ChatMessage>(&store).await;
        let message = repo
            .add(&ChatMessage::create(ChatRole::Model, "bye", SentAt::now()).unwrap())
            .await
            .unwrap();

        repo.delete(&message).await.unwrap();
        assert_eq!(
            repo.delete(&message).await.unwrap_err().kind(),
            RepositoryErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_find_and_find_one() {
        let store = Arc::new(InMemoryStore::new());
        let repo = repository::<SystemInstruction>(&store).await;
        repo.add(&instruction()).await.unwrap();
        repo.add(&SystemInstruction::create(AiProvider::Gpt, "Be formal.", false).unwrap())
            .await
            .unwrap();

        let gemini = repo
            .find(&Query::new().filter("provider", &AiProvider::Gemini).unwrap())
            .await
            .unwrap();
        assert_eq!(gemini.len(), 1);

        let inactive = repo
            .find_one(&Query::new().filter("is_active", &false).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inactive.provider(), AiProvider::Gpt);
    }

    #[tokio::test]
    async fn test_closed_session_is_unexpected() {
        let repo: GenericRepository<ChatMessage> =
            GenericRepository::new(Arc::new(Mutex::new(None)), Arc::new(MappingRegistry::standard())).unwrap();

        let message = ChatMessage::create(ChatRole::User, "late", SentAt::now()).unwrap();
        let err = repo.add(&message).await.unwrap_err();
        assert_eq!(err, RepositoryError::unexpected("session closed"));
    }

    #[test]
    fn test_unregistered_aggregate_rejected() {
        let err = GenericRepository::<ChatMessage>::new(Arc::new(Mutex::new(None)), Arc::new(MappingRegistry::new()))
            .unwrap_err();
        assert_eq!(err.kind(), RepositoryErrorKind::Unexpected);
    }
}
