//! PostgreSQL sessions.
//!
//! Statements are generated from the [`RecordSchema`]; column names come
//! from static schemas and values are always bound as parameters.

use super::{Direction, Query, Session, SessionFactory};
use crate::record::{Column, ColumnKind, Record, RecordSchema, ID_COLUMN, VERSION_COLUMN};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_core::{Component, Primitive, RepositoryError, RepositoryResult};
use sqlx::postgres::{PgArguments, PgPool, PgRow, Postgres};
use sqlx::{Row, Transaction};
use tracing::debug;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A generated statement and its ordered parameters.
#[derive(Debug, PartialEq)]
struct Statement {
    sql: String,
    params: Vec<(&'static Column, Primitive)>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Self { sql, params: Vec::new() }
    }

    /// Appends a parameter and returns its placeholder.
    fn param(&mut self, column: &'static Column, value: Primitive) -> String {
        self.params.push((column, value));
        format!("${}", self.params.len())
    }

    fn build(&self) -> RepositoryResult<PgQuery<'_>> {
        let mut query = sqlx::query(&self.sql);
        for (column, value) in &self.params {
            query = bind(query, column, value.clone())?;
        }
        Ok(query)
    }
}

fn bind<'q>(query: PgQuery<'q>, column: &Column, value: Primitive) -> RepositoryResult<PgQuery<'q>> {
    #[allow(clippy::cast_precision_loss)]
    let query = match (column.kind, value) {
        (ColumnKind::Text, Primitive::Null) => query.bind(None::<String>),
        (ColumnKind::Text, Primitive::Text(text)) => query.bind(text),
        (ColumnKind::Integer, Primitive::Null) => query.bind(None::<i64>),
        (ColumnKind::Integer, Primitive::Int(number)) => query.bind(number),
        (ColumnKind::Boolean, Primitive::Null) => query.bind(None::<bool>),
        (ColumnKind::Boolean, Primitive::Bool(flag)) => query.bind(flag),
        (ColumnKind::Float, Primitive::Null) => query.bind(None::<f64>),
        (ColumnKind::Float, Primitive::Float(number)) => query.bind(number),
        (ColumnKind::Float, Primitive::Int(number)) => query.bind(number as f64),
        (ColumnKind::Timestamp, Primitive::Null) => query.bind(None::<DateTime<Utc>>),
        (ColumnKind::Timestamp, Primitive::Timestamp(at)) => query.bind(at),
        (kind, other) => {
            return Err(RepositoryError::unexpected(format!(
                "cannot bind {} value to {kind:?} column '{}'",
                other.type_name(),
                column.name
            )))
        }
    };
    Ok(query)
}

fn decode(schema: &RecordSchema, row: &PgRow) -> RepositoryResult<Record> {
    let mut record = Record::new(schema.table);
    for column in schema.columns {
        let name = column.name;
        let value = match column.kind {
            ColumnKind::Text => row.try_get::<Option<String>, _>(name)?.map(Primitive::Text),
            ColumnKind::Integer => row.try_get::<Option<i64>, _>(name)?.map(Primitive::Int),
            ColumnKind::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Primitive::Bool),
            ColumnKind::Float => row.try_get::<Option<f64>, _>(name)?.map(Primitive::Float),
            ColumnKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(Primitive::Timestamp),
        };
        record.set(name, value.unwrap_or(Primitive::Null));
    }
    Ok(record)
}

fn id_column(schema: &'static RecordSchema) -> RepositoryResult<&'static Column> {
    schema
        .column(ID_COLUMN)
        .ok_or_else(|| RepositoryError::unexpected(format!("{} has no {ID_COLUMN} column", schema.table)))
}

fn version_column(schema: &'static RecordSchema) -> RepositoryResult<&'static Column> {
    schema
        .column(VERSION_COLUMN)
        .ok_or_else(|| RepositoryError::unexpected(format!("{} has no {VERSION_COLUMN} column", schema.table)))
}

fn record_id(schema: &RecordSchema, record: &Record) -> RepositoryResult<Primitive> {
    record
        .id()
        .cloned()
        .ok_or_else(|| RepositoryError::unexpected(format!("{}: row has no {ID_COLUMN}", schema.table)))
}

/// Columns written by an insert: null values with a default are left to the database.
fn written_columns<'a>(schema: &'static RecordSchema, record: &'a Record) -> impl Iterator<Item = (&'static Column, Primitive)> + 'a {
    schema.columns.iter().filter_map(move |column| {
        let value = record.get(column.name).cloned().unwrap_or(Primitive::Null);
        (!(value.is_null() && column.has_default())).then_some((column, value))
    })
}

fn select_by_id(schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<Statement> {
    let mut statement = Statement::new(String::new());
    let placeholder = statement.param(id_column(schema)?, id.clone());
    statement.sql = format!(
        "SELECT {} FROM {} WHERE {ID_COLUMN} = {placeholder}",
        schema.column_list(),
        schema.table
    );
    Ok(statement)
}

fn select_query(schema: &'static RecordSchema, query: &Query) -> RepositoryResult<Statement> {
    let mut statement = Statement::new(String::new());
    let mut conditions = Vec::with_capacity(query.filters.len());
    for (name, value) in &query.filters {
        let column = schema
            .column(name)
            .ok_or_else(|| RepositoryError::unexpected(format!("{} has no column '{name}'", schema.table)))?;
        if value.is_null() {
            conditions.push(format!("{name} IS NULL"));
        } else {
            let placeholder = statement.param(column, value.clone());
            conditions.push(format!("{name} = {placeholder}"));
        }
    }

    let mut sql = format!("SELECT {} FROM {}", schema.column_list(), schema.table);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if let Some((name, direction)) = query.order_by {
        if !schema.has_column(name) {
            return Err(RepositoryError::unexpected(format!("{} has no column '{name}'", schema.table)));
        }
        let direction = match direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        sql.push_str(&format!(" ORDER BY {name} {direction}"));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    statement.sql = sql;
    Ok(statement)
}

fn insert_statement(schema: &'static RecordSchema, record: &Record, on_conflict_update: bool) -> Statement {
    let mut statement = Statement::new(String::new());
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    for (column, value) in written_columns(schema, record) {
        names.push(column.name);
        placeholders.push(statement.param(column, value));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.table,
        names.join(", "),
        placeholders.join(", ")
    );
    if on_conflict_update {
        let assignments: Vec<String> = names
            .iter()
            .filter(|name| **name != ID_COLUMN)
            .map(|name| format!("{name} = EXCLUDED.{name}"))
            .collect();
        if assignments.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({ID_COLUMN}) DO NOTHING"));
        } else {
            sql.push_str(&format!(" ON CONFLICT ({ID_COLUMN}) DO UPDATE SET {}", assignments.join(", ")));
        }
    }
    sql.push_str(&format!(" RETURNING {}", schema.column_list()));

    statement.sql = sql;
    statement
}

fn update_statement(schema: &'static RecordSchema, record: &Record, expected: u64) -> RepositoryResult<Statement> {
    let id = record_id(schema, record)?;
    let expected = i64::try_from(expected)
        .map_err(|_| RepositoryError::unexpected(format!("{}: version out of range", schema.table)))?;
    let version = version_column(schema)?;

    let mut statement = Statement::new(String::new());
    let mut assignments = Vec::new();
    for (column, value) in written_columns(schema, record) {
        if column.name == ID_COLUMN || column.name == VERSION_COLUMN {
            continue;
        }
        let placeholder = statement.param(column, value);
        assignments.push(format!("{} = {placeholder}", column.name));
    }
    let next = statement.param(version, Primitive::Int(expected + 1));
    assignments.push(format!("{VERSION_COLUMN} = {next}"));
    let id_placeholder = statement.param(id_column(schema)?, id);
    let version_placeholder = statement.param(version, Primitive::Int(expected));

    statement.sql = format!(
        "UPDATE {} SET {} WHERE {ID_COLUMN} = {id_placeholder} AND {VERSION_COLUMN} = {version_placeholder}",
        schema.table,
        assignments.join(", ")
    );
    Ok(statement)
}

fn delete_statement(schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<Statement> {
    let mut statement = Statement::new(String::new());
    let placeholder = statement.param(id_column(schema)?, id.clone());
    statement.sql = format!("DELETE FROM {} WHERE {ID_COLUMN} = {placeholder}", schema.table);
    Ok(statement)
}

/// One PostgreSQL transaction.
pub struct PostgresSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Session for PostgresSession {
    async fn find(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<Option<Record>> {
        let statement = select_by_id(schema, id)?;
        debug!(sql = %statement.sql, "find");
        let row = statement.build()?.fetch_optional(&mut *self.tx).await?;
        row.map(|row| decode(schema, &row)).transpose()
    }

    async fn select(&mut self, schema: &'static RecordSchema, query: &Query) -> RepositoryResult<Vec<Record>> {
        let statement = select_query(schema, query)?;
        debug!(sql = %statement.sql, "select");
        let rows = statement.build()?.fetch_all(&mut *self.tx).await?;
        rows.iter().map(|row| decode(schema, row)).collect()
    }

    async fn insert(&mut self, schema: &'static RecordSchema, record: Record) -> RepositoryResult<Record> {
        let statement = insert_statement(schema, &record, false);
        debug!(sql = %statement.sql, "insert");
        let row = statement.build()?.fetch_one(&mut *self.tx).await?;
        decode(schema, &row)
    }

    async fn update_versioned(
        &mut self,
        schema: &'static RecordSchema,
        record: Record,
        expected: u64,
    ) -> RepositoryResult<u64> {
        let statement = update_statement(schema, &record, expected)?;
        debug!(sql = %statement.sql, expected, "update_versioned");
        let result = statement.build()?.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn upsert(&mut self, schema: &'static RecordSchema, record: Record) -> RepositoryResult<Record> {
        let statement = insert_statement(schema, &record, true);
        debug!(sql = %statement.sql, "upsert");
        let row = statement.build()?.fetch_one(&mut *self.tx).await?;
        decode(schema, &row)
    }

    async fn delete(&mut self, schema: &'static RecordSchema, id: &Primitive) -> RepositoryResult<u64> {
        let statement = delete_statement(schema, id)?;
        debug!(sql = %statement.sql, "delete");
        let result = statement.build()?.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.commit().await?;
        debug!("PostgreSQL transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.rollback().await?;
        debug!("PostgreSQL transaction rolled back");
        Ok(())
    }
}

/// Opens a transaction per session on the shared pool.
#[derive(Component)]
#[shaku(interface = SessionFactory)]
pub struct PostgresSessionFactory {
    pool: Option<PgPool>,
}

impl PostgresSessionFactory {
    /// Creates a factory over a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }
}

#[async_trait]
impl SessionFactory for PostgresSessionFactory {
    async fn open(&self) -> RepositoryResult<Box<dyn Session>> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| RepositoryError::unexpected("database pool not configured"))?;
        let tx = pool.begin().await?;
        Ok(Box::new(PostgresSession { tx }))
    }
}
