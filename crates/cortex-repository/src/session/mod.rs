//! Storage sessions.
//!
//! A [`Session`] is one transaction against a store. Repositories issue
//! statements through it; the unit of work commits or rolls it back.
//! Dropping a session without committing discards its writes.

mod memory;
mod postgres;

pub use memory::{InMemorySessionFactory, InMemoryStore};
pub use postgres::PostgresSessionFactory;

use crate::record::{Record, RecordSchema};
use async_trait::async_trait;
use cortex_core::{DomainError, Interface, Primitive, RepositoryResult, ValueObject};
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Filtered, ordered and limited selection over one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(&'static str, Primitive)>,
    pub order_by: Option<(&'static str, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    /// Selects every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps rows whose column equals the value.
    ///
    /// # Errors
    ///
    /// Fails when the value has no storable form.
    pub fn filter(mut self, column: &'static str, value: &impl ValueObject) -> Result<Self, DomainError> {
        self.filters.push((column, value.to_primitive()?));
        Ok(self)
    }

    /// Orders by a column.
    #[must_use]
    pub const fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order_by = Some((column, direction));
        self
    }

    /// Caps the number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Checks a record against the filters.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| record.get(column).unwrap_or(&Primitive::Null) == expected)
    }

    /// Applies ordering and limit to matching rows, in place.
    pub fn arrange(&self, rows: &mut Vec<Record>) {
        if let Some((column, direction)) = self.order_by {
            rows.sort_by(|a, b| {
                let ordering = compare(
                    a.get(column).unwrap_or(&Primitive::Null),
                    b.get(column).unwrap_or(&Primitive::Null),
                );
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }
}

/// Orders primitives of the same kind; nulls sort first.
fn compare(a: &Primitive, b: &Primitive) -> Ordering {
    match (a, b) {
        (Primitive::Null, Primitive::Null) => Ordering::Equal,
        (Primitive::Null, _) => Ordering::Less,
        (_, Primitive::Null) => Ordering::Greater,
        (Primitive::Bool(a), Primitive::Bool(b)) => a.cmp(b),
        (Primitive::Int(a), Primitive::Int(b)) => a.cmp(b),
        (Primitive::Float(a), Primitive::Float(b)) => a.total_cmp(b),
        (Primitive::Text(a), Primitive::Text(b)) => a.cmp(b),
        (Primitive::Timestamp(a), Primitive::Timestamp(b)) => a.cmp(b),
        (a, b) => a.type_name().cmp(b.type_name()),
    }
}

/// One transaction against a store.
#[async_trait]
pub trait Session: Send {
    /// Loads a row by primary key.
    async fn find(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<Option<Record>>;

    /// Loads the rows matching a query.
    async fn select(&mut self, schema: &'static RecordSchema, query: &Query) -> RepositoryResult<Vec<Record>>;

    /// Inserts a row and returns it as stored, defaults included.
    async fn insert(&mut self, schema: &'static RecordSchema, record: Record) -> RepositoryResult<Record>;

    /// Writes every column and sets `version = expected + 1`, but only where
    /// the stored version still equals `expected`. Returns the affected row
    /// count.
    async fn update_versioned(
        &mut self,
        schema: &'static RecordSchema,
        record: Record,
        expected: u64,
    ) -> RepositoryResult<u64>;

    /// Inserts or overwrites a row by primary key.
    async fn upsert(&mut self, schema: &'static RecordSchema, record: Record) -> RepositoryResult<Record>;

    /// Deletes a row by primary key. Returns the affected row count.
    async fn delete(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<u64>;

    /// Makes the session's writes durable.
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    /// Discards the session's writes.
    async fn rollback(self: Box<Self>) -> RepositoryResult<()>;
}

/// Opens sessions.
#[async_trait]
pub trait SessionFactory: Interface {
    /// Opens a new session.
    async fn open(&self) -> RepositoryResult<Box<dyn Session>>;
}
