//! Unit of work.
//!
//! A [`UnitOfWorkScope`] owns one storage session. Every repository it hands
//! out shares that session, so their writes commit or roll back together.

use crate::generic::SharedSession;
use crate::mapping::MappingRegistry;
use crate::repositories::Persistent;
use crate::session::SessionFactory;
use async_trait::async_trait;
use cortex_core::{Component, Interface, RepositoryError, RepositoryResult};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Opens transactional scopes.
#[async_trait]
pub trait UnitOfWork: Interface {
    /// Opens a session and returns the scope owning it.
    async fn begin(&self) -> RepositoryResult<UnitOfWorkScope>;
}

/// Default unit of work over the configured session factory.
#[derive(Component)]
#[shaku(interface = UnitOfWork)]
pub struct UnitOfWorkImpl {
    #[shaku(inject)]
    sessions: Arc<dyn SessionFactory>,
    #[shaku(default = Arc::new(MappingRegistry::standard()))]
    mappings: Arc<MappingRegistry>,
}

impl UnitOfWorkImpl {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionFactory>, mappings: Arc<MappingRegistry>) -> Self {
        Self { sessions, mappings }
    }
}

#[async_trait]
impl UnitOfWork for UnitOfWorkImpl {
    async fn begin(&self) -> RepositoryResult<UnitOfWorkScope> {
        let session = self.sessions.open().await?;
        debug!("Unit of work started");
        Ok(UnitOfWorkScope::new(session, Arc::clone(&self.mappings)))
    }
}

type RepositoryCache = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// One open transaction and the repositories bound to it.
///
/// Consumed by [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping a scope that was neither rolls back.
pub struct UnitOfWorkScope {
    session: SharedSession,
    mappings: Arc<MappingRegistry>,
    repositories: Mutex<RepositoryCache>,
}

impl UnitOfWorkScope {
    fn new(session: Box<dyn crate::session::Session>, mappings: Arc<MappingRegistry>) -> Self {
        Self {
            session: Arc::new(tokio::sync::Mutex::new(Some(session))),
            mappings,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the repository for `T`, creating it on first use.
    ///
    /// Later calls for the same type return the same instance.
    ///
    /// # Errors
    ///
    /// Fails when `T` has no registered mapping.
    pub fn repository<T: Persistent>(&self) -> RepositoryResult<Arc<T::Repository>> {
        let mut cache = self.repositories.lock();
        if let Some(existing) = cache.get(&TypeId::of::<T>()) {
            return Arc::clone(existing)
                .downcast::<T::Repository>()
                .map_err(|_| RepositoryError::unexpected(format!("Repository cache corrupted for {}", T::NAME)));
        }

        if !self.mappings.contains::<T>() {
            error!(entity = T::NAME, "No repository registered for aggregate");
            return Err(RepositoryError::unexpected(format!(
                "No repository registered for {}",
                T::NAME
            )));
        }

        let repository = Arc::new(T::repository(Arc::clone(&self.session), Arc::clone(&self.mappings))?);
        cache.insert(TypeId::of::<T>(), Arc::clone(&repository) as Arc<dyn Any + Send + Sync>);
        debug!(entity = T::NAME, "Repository bound to unit of work");
        Ok(repository)
    }

    async fn release(&self) -> RepositoryResult<Box<dyn crate::session::Session>> {
        self.repositories.lock().clear();
        self.session
            .lock()
            .await
            .take()
            .ok_or_else(|| RepositoryError::unexpected("session closed"))
    }

    /// Commits every write made through this scope.
    pub async fn commit(self) -> RepositoryResult<()> {
        let session = self.release().await?;
        session.commit().await.map_err(|e| {
            warn!(error = %e, "Unit of work commit failed");
            e
        })?;
        debug!("Unit of work committed");
        Ok(())
    }

    /// Discards every write made through this scope.
    pub async fn rollback(self) -> RepositoryResult<()> {
        let session = self.release().await?;
        session.rollback().await?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}

impl Drop for UnitOfWorkScope {
    fn drop(&mut self) {
        self.repositories.get_mut().clear();
        let Ok(mut session) = self.session.try_lock() else {
            warn!("Unit of work dropped while a statement held its session; rolled back when the statement ends");
            return;
        };
        if session.take().is_some() {
            warn!("Unit of work dropped without commit; changes rolled back");
        }
    }
}

impl std::fmt::Debug for UnitOfWorkScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWorkScope")
            .field("repositories", &self.repositories.lock().len())
            .finish_non_exhaustive()
    }
}
