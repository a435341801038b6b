//! Process-local store with transactional sessions.

use super::{Query, Session, SessionFactory};
use crate::record::{ColumnDefault, Record, RecordSchema, ID_COLUMN, VERSION_COLUMN};
use async_trait::async_trait;
use chrono::Utc;
use cortex_core::{Component, Primitive, RepositoryError, RepositoryResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

type Key = (&'static str, String);

/// Committed rows, grouped by table and keyed by primary key.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<&'static str, BTreeMap<String, Record>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts committed rows of a table.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, BTreeMap::len)
    }

    fn committed(&self, key: &Key) -> Option<Record> {
        self.tables.lock().get(key.0).and_then(|rows| rows.get(&key.1)).cloned()
    }
}

/// What a staged write assumed about committed state when first issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precondition {
    Absent,
    Version(u64),
    Unchecked,
}

#[derive(Debug)]
struct Staged {
    row: Option<Record>,
    precondition: Precondition,
}

/// Session staging writes in an overlay until commit.
///
/// Reads see the session's own writes first, then committed rows. Version
/// checks run against that view when the statement is issued and again
/// against committed state at commit.
#[derive(Debug)]
pub struct InMemorySession {
    store: Arc<InMemoryStore>,
    staged: HashMap<Key, Staged>,
    order: Vec<Key>,
}

impl InMemorySession {
    fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            staged: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn key(schema: &RecordSchema, id: &Primitive) -> Key {
        (schema.table, id.to_string())
    }

    fn key_of(schema: &RecordSchema, record: &Record) -> RepositoryResult<Key> {
        record
            .id()
            .map(|id| Self::key(schema, id))
            .ok_or_else(|| RepositoryError::unexpected(format!("{}: row has no {ID_COLUMN}", schema.table)))
    }

    fn visible(&self, key: &Key) -> Option<Record> {
        match self.staged.get(key) {
            Some(staged) => staged.row.clone(),
            None => self.store.committed(key),
        }
    }

    fn stage(&mut self, key: Key, row: Option<Record>, precondition: Precondition) {
        if let Some(staged) = self.staged.get_mut(&key) {
            staged.row = row;
            return;
        }
        self.order.push(key.clone());
        self.staged.insert(key, Staged { row, precondition });
    }

    /// Columns left null that carry a default keep their stored value.
    fn keep_defaulted(schema: &RecordSchema, record: &mut Record, current: &Record) {
        for column in schema.columns {
            let unset = record.get(column.name).map_or(true, Primitive::is_null);
            if unset && column.has_default() {
                if let Some(value) = current.get(column.name) {
                    record.set(column.name, value.clone());
                }
            }
        }
    }

    fn fill_defaults(schema: &RecordSchema, record: &mut Record) {
        let now = Utc::now();
        for column in schema.columns {
            let missing = record.get(column.name).map_or(true, Primitive::is_null);
            if missing && column.default == Some(ColumnDefault::Now) {
                record.set(column.name, Primitive::Timestamp(now));
            }
        }
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn find(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<Option<Record>> {
        Ok(self.visible(&Self::key(schema, id)))
    }

    async fn select(&mut self, schema: &'static RecordSchema, query: &Query) -> RepositoryResult<Vec<Record>> {
        let mut rows: BTreeMap<String, Record> = self
            .store
            .tables
            .lock()
            .get(schema.table)
            .cloned()
            .unwrap_or_default();

        for ((table, id), staged) in &self.staged {
            if *table != schema.table {
                continue;
            }
            match &staged.row {
                Some(row) => rows.insert(id.clone(), row.clone()),
                None => rows.remove(id),
            };
        }

        let mut matching: Vec<Record> = rows.into_values().filter(|row| query.matches(row)).collect();
        query.arrange(&mut matching);
        Ok(matching)
    }

    async fn insert(&mut self, schema: &'static RecordSchema, mut record: Record) -> RepositoryResult<Record> {
        let key = Self::key_of(schema, &record)?;
        if self.visible(&key).is_some() {
            return Err(RepositoryError::unexpected(format!(
                "duplicate key value violates unique constraint on {}.{ID_COLUMN}",
                schema.table
            )));
        }

        Self::fill_defaults(schema, &mut record);
        self.stage(key, Some(record.clone()), Precondition::Absent);
        Ok(record)
    }

    async fn update_versioned(
        &mut self,
        schema: &'static RecordSchema,
        mut record: Record,
        expected: u64,
    ) -> RepositoryResult<u64> {
        let key = Self::key_of(schema, &record)?;
        let Some(current) = self.visible(&key) else {
            return Ok(0);
        };
        if current.version() != Some(expected) {
            return Ok(0);
        }

        let next = i64::try_from(expected + 1)
            .map_err(|_| RepositoryError::unexpected(format!("{}: version overflow", schema.table)))?;
        record.set(VERSION_COLUMN, Primitive::Int(next));
        Self::keep_defaulted(schema, &mut record, &current);

        self.stage(key, Some(record), Precondition::Version(expected));
        Ok(1)
    }

    async fn upsert(&mut self, schema: &'static RecordSchema, mut record: Record) -> RepositoryResult<Record> {
        let key = Self::key_of(schema, &record)?;
        match self.visible(&key) {
            Some(current) => Self::keep_defaulted(schema, &mut record, &current),
            None => Self::fill_defaults(schema, &mut record),
        }

        self.stage(key, Some(record.clone()), Precondition::Unchecked);
        Ok(record)
    }

    async fn delete(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<u64> {
        let key = Self::key(schema, id);
        if self.visible(&key).is_none() {
            return Ok(0);
        }
        self.stage(key, None, Precondition::Unchecked);
        Ok(1)
    }

    async fn commit(mut self: Box<Self>) -> RepositoryResult<()> {
        let store = Arc::clone(&self.store);
        let mut tables = store.tables.lock();

        for key in &self.order {
            let Some(staged) = self.staged.get(key) else { continue };
            let committed = tables.get(key.0).and_then(|rows| rows.get(&key.1));
            match staged.precondition {
                Precondition::Absent if committed.is_some() => {
                    return Err(RepositoryError::unexpected(format!(
                        "duplicate key value violates unique constraint on {}.{ID_COLUMN}",
                        key.0
                    )));
                }
                Precondition::Version(expected) => {
                    let actual = committed.and_then(Record::version);
                    if actual != Some(expected) {
                        warn!(table = key.0, id = %key.1, expected, ?actual, "Commit lost an optimistic lock");
                        return Err(RepositoryError::version_conflict(
                            key.0,
                            &key.1,
                            expected,
                            actual.unwrap_or_default(),
                        ));
                    }
                }
                _ => {}
            }
        }

        let writes = self.order.len();
        for key in std::mem::take(&mut self.order) {
            let Some(staged) = self.staged.remove(&key) else { continue };
            let rows = tables.entry(key.0).or_default();
            match staged.row {
                Some(row) => {
                    rows.insert(key.1, row);
                }
                None => {
                    rows.remove(&key.1);
                }
            }
        }

        debug!(writes, "In-memory session committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        debug!(discarded = self.order.len(), "In-memory session rolled back");
        Ok(())
    }
}

/// Opens sessions over a shared [`InMemoryStore`].
#[derive(Component)]
#[shaku(interface = SessionFactory)]
pub struct InMemorySessionFactory {
    #[shaku(default)]
    store: Arc<InMemoryStore>,
}

impl InMemorySessionFactory {
    /// Creates a factory over a store.
    #[must_use]
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }
}

#[async_trait]
impl SessionFactory for InMemorySessionFactory {
    async fn open(&self) -> RepositoryResult<Box<dyn Session>> {
        Ok(Box::new(InMemorySession::new(Arc::clone(&self.store))))
    }
}
