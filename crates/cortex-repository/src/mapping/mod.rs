//! Aggregate ↔ record mapping.
//!
//! Each aggregate implements [`EntityMapping`] by hand. The
//! [`MappingRegistry`] pairs aggregate types with their table schemas and
//! checks every conversion against the schema.

mod chat_message;
mod system_instruction;

pub use chat_message::CHAT_MESSAGES;
pub use system_instruction::SYSTEM_INSTRUCTIONS;

use crate::record::{Record, RecordReader, RecordSchema, RecordWriter};
use cortex_core::{Aggregate, ChatMessage, MappingError, Primitive, SystemInstruction};
use std::any::TypeId;
use std::collections::HashMap;
use tracing::debug;

/// Explicit conversion between an aggregate and its record.
pub trait EntityMapping: Aggregate {
    /// Writes every persisted field.
    fn write(&self, record: &mut RecordWriter);

    /// Rebuilds the aggregate from stored state, bypassing creation rules.
    fn read(record: &RecordReader<'_>) -> Result<Self, MappingError>;
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    type_id: TypeId,
    type_name: &'static str,
    schema: &'static RecordSchema,
}

/// Registry of aggregate ↔ table pairs.
///
/// Built once at startup and shared behind an `Arc`; a table maps to at
/// most one aggregate type, so the inverse lookup is unambiguous.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    registrations: HashMap<TypeId, Registration>,
}

impl MappingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every Cortex aggregate registered.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.insert::<ChatMessage>(&CHAT_MESSAGES);
        registry.insert::<SystemInstruction>(&SYSTEM_INSTRUCTIONS);
        registry
    }

    /// Registers `D` against a table schema.
    ///
    /// Registering the same type again replaces its schema.
    ///
    /// # Errors
    ///
    /// [`MappingError::DuplicateTable`] if another type already owns the table.
    pub fn register<D: EntityMapping>(&mut self, schema: &'static RecordSchema) -> Result<(), MappingError> {
        let type_id = TypeId::of::<D>();
        if let Some(existing) = self
            .registrations
            .values()
            .find(|r| r.schema.table == schema.table && r.type_id != type_id)
        {
            return Err(MappingError::DuplicateTable {
                table: schema.table,
                existing: existing.type_name,
            });
        }

        self.insert::<D>(schema);
        Ok(())
    }

    fn insert<D: EntityMapping>(&mut self, schema: &'static RecordSchema) {
        debug!(entity = D::NAME, table = schema.table, "Registered record mapping");
        self.registrations.insert(
            TypeId::of::<D>(),
            Registration {
                type_id: TypeId::of::<D>(),
                type_name: D::NAME,
                schema,
            },
        );
    }

    /// Returns the schema registered for `D`.
    pub fn schema<D: EntityMapping>(&self) -> Result<&'static RecordSchema, MappingError> {
        self.registrations
            .get(&TypeId::of::<D>())
            .map(|r| r.schema)
            .ok_or(MappingError::Unregistered(D::NAME))
    }

    /// Checks whether `D` is registered.
    #[must_use]
    pub fn contains<D: EntityMapping>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<D>())
    }

    /// Returns the aggregate type name registered for a table.
    #[must_use]
    pub fn domain_type_for(&self, table: &str) -> Option<&'static str> {
        self.registrations
            .values()
            .find(|r| r.schema.table == table)
            .map(|r| r.type_name)
    }

    /// Converts an aggregate to its record.
    ///
    /// Columns with a database default may be left unwritten; they are
    /// recorded as null. Any other gap, and any column the schema does not
    /// declare, is a [`MappingError::SchemaMismatch`].
    pub fn to_record<D: EntityMapping>(&self, entity: &D) -> Result<Record, MappingError> {
        let schema = self.schema::<D>()?;

        let mut writer = RecordWriter::new(schema.table);
        entity.write(&mut writer);
        let mut record = writer.finish()?;

        if let Some((unknown, _)) = record.columns().find(|(name, _)| !schema.has_column(name)) {
            return Err(MappingError::SchemaMismatch {
                table: schema.table,
                detail: format!("unknown column '{unknown}'"),
            });
        }

        for column in schema.columns {
            if record.contains(column.name) {
                continue;
            }
            if !column.has_default() {
                return Err(MappingError::SchemaMismatch {
                    table: schema.table,
                    detail: format!("column '{}' was not written", column.name),
                });
            }
            record.set(column.name, Primitive::Null);
        }

        Ok(record)
    }

    /// Rebuilds an aggregate from a record.
    ///
    /// # Errors
    ///
    /// [`MappingError::Unregistered`] if no type owns the record's table and
    /// [`MappingError::TypeMismatch`] if the table belongs to another type.
    pub fn from_record<D: EntityMapping>(&self, record: &Record) -> Result<D, MappingError> {
        let registration = self
            .registrations
            .values()
            .find(|r| r.schema.table == record.table())
            .ok_or(MappingError::Unregistered(record.table()))?;

        if registration.type_id != TypeId::of::<D>() {
            return Err(MappingError::TypeMismatch {
                table: record.table(),
                requested: D::NAME,
                actual: registration.type_name,
            });
        }

        D::read(&RecordReader::new(D::NAME, record))
    }
}
