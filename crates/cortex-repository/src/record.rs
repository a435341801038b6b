//! Persistence records and their schemas.
//!
//! A [`Record`] is the storage-side shape of an aggregate: a table name and
//! a map of column values. Aggregates write themselves through a
//! [`RecordWriter`] and rebuild themselves through a [`RecordReader`].

use cortex_core::{Generate, MappingError, Primitive, ValueObject};
use std::collections::BTreeMap;

/// Primary key column.
pub const ID_COLUMN: &str = "id";
/// Optimistic-locking column.
pub const VERSION_COLUMN: &str = "version";
/// Audit timestamp column.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Boolean,
    Float,
    Timestamp,
}

/// Value the database fills in when the column is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    /// Current transaction timestamp.
    Now,
}

/// One column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
}

impl Column {
    /// Creates a non-null column without a default.
    #[must_use]
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            default: None,
        }
    }

    /// Allows nulls.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Lets the database stamp the current time when the value is omitted.
    #[must_use]
    pub const fn default_now(mut self) -> Self {
        self.default = Some(ColumnDefault::Now);
        self
    }

    /// Checks whether the column may be left out of a write.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Table layout of one aggregate.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    pub table: &'static str,
    pub columns: &'static [Column],
}

impl RecordSchema {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Checks for a column.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Checks for the optimistic-locking column.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.has_column(VERSION_COLUMN)
    }

    /// Comma separated column list, in declaration order.
    #[must_use]
    pub fn column_list(&self) -> String {
        self.columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
    }
}

/// Column values of one stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    table: &'static str,
    values: BTreeMap<String, Primitive>,
}

impl Record {
    /// Creates an empty record for a table.
    #[must_use]
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    /// Returns a column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Primitive> {
        self.values.get(column)
    }

    /// Sets a column value, replacing any previous one.
    pub fn set(&mut self, column: impl Into<String>, value: Primitive) {
        self.values.insert(column.into(), value);
    }

    /// Checks for a column.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Returns the primary key, unless absent or null.
    #[must_use]
    pub fn id(&self) -> Option<&Primitive> {
        self.get(ID_COLUMN).filter(|value| !value.is_null())
    }

    /// Returns the stored version, if the record carries one.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.get(VERSION_COLUMN)
            .and_then(Primitive::as_int)
            .and_then(|v| u64::try_from(v).ok())
    }

    /// Iterates over the columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Primitive)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Consumes the record into its values.
    #[must_use]
    pub fn into_values(self) -> BTreeMap<String, Primitive> {
        self.values
    }
}

/// Collects the fields of an aggregate into a [`Record`].
#[derive(Debug)]
pub struct RecordWriter {
    record: Record,
    failure: Option<MappingError>,
}

impl RecordWriter {
    /// Starts a record for a table.
    #[must_use]
    pub fn new(table: &'static str) -> Self {
        Self {
            record: Record::new(table),
            failure: None,
        }
    }

    /// Writes one field under its public name.
    ///
    /// A value without a storable form is remembered and reported by
    /// [`finish`](Self::finish); later fields are still written.
    pub fn field(&mut self, name: &'static str, value: &impl ValueObject) -> &mut Self {
        match value.to_primitive() {
            Ok(primitive) => self.record.set(name, primitive),
            Err(source) => {
                self.failure.get_or_insert(MappingError::UnstorableField {
                    table: self.record.table(),
                    field: name,
                    source,
                });
            }
        }
        self
    }

    /// Finishes the record.
    ///
    /// # Errors
    ///
    /// [`MappingError::UnstorableField`] for the first field that could not
    /// be converted.
    pub fn finish(self) -> Result<Record, MappingError> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.record),
        }
    }
}

/// Reads typed fields out of a [`Record`].
#[derive(Debug, Clone, Copy)]
pub struct RecordReader<'a> {
    entity: &'static str,
    record: &'a Record,
}

impl<'a> RecordReader<'a> {
    /// Wraps a record being rebuilt into `entity`.
    #[must_use]
    pub const fn new(entity: &'static str, record: &'a Record) -> Self {
        Self { entity, record }
    }

    /// Reads a required field.
    ///
    /// # Errors
    ///
    /// [`MappingError::MissingField`] when the column is absent or null and
    /// `V` has no null representation, and [`MappingError::InvalidField`]
    /// when the value object rejects the stored value.
    pub fn value<V: ValueObject>(&self, name: &'static str) -> Result<V, MappingError> {
        match self.record.get(name) {
            None | Some(Primitive::Null) => {
                V::from_primitive(Primitive::Null).map_err(|_| MappingError::MissingField {
                    entity: self.entity,
                    field: name,
                })
            }
            Some(value) => self.convert(name, value.clone()),
        }
    }

    /// Reads a nullable field.
    pub fn optional<V: ValueObject>(&self, name: &'static str) -> Result<Option<V>, MappingError> {
        match self.record.get(name) {
            None | Some(Primitive::Null) => Ok(None),
            Some(value) => self.convert(name, value.clone()).map(Some),
        }
    }

    /// Reads an identifier, generating a fresh one for a null column.
    pub fn identifier<I: ValueObject + Generate>(&self, name: &'static str) -> Result<I, MappingError> {
        Ok(self.optional(name)?.unwrap_or_else(I::generate))
    }

    fn convert<V: ValueObject>(&self, name: &'static str, value: Primitive) -> Result<V, MappingError> {
        V::from_primitive(value).map_err(|source| MappingError::InvalidField {
            entity: self.entity,
            field: name,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{ChatMessageId, DomainError, Version};

    static SCHEMA: RecordSchema = RecordSchema {
        table: "things",
        columns: &[
            Column::new(ID_COLUMN, ColumnKind::Text),
            Column::new(VERSION_COLUMN, ColumnKind::Integer),
            Column::new("created_at", ColumnKind::Timestamp).default_now(),
        ],
    };

    #[test]
    fn test_schema_lookups() {
        assert!(SCHEMA.is_versioned());
        assert!(SCHEMA.column("created_at").unwrap().has_default());
        assert!(!SCHEMA.has_column("updated_at"));
        assert_eq!(SCHEMA.column_list(), "id, version, created_at");
    }

    #[test]
    fn test_writer_reports_first_unstorable_field() {
        let mut writer = RecordWriter::new("things");
        writer
            .field("note", &"kept".to_string())
            .field(VERSION_COLUMN, &Version::new(u64::MAX))
            .field("count", &Version::new(u64::MAX - 1));

        assert_eq!(
            writer.finish().unwrap_err(),
            MappingError::UnstorableField {
                table: "things",
                field: VERSION_COLUMN,
                source: DomainError::invalid_value("version", u64::MAX),
            }
        );
    }

    #[test]
    fn test_null_id_is_absent() {
        let mut record = Record::new("things");
        record.set(ID_COLUMN, Primitive::Null);
        assert!(record.id().is_none());

        record.set(ID_COLUMN, Primitive::Text("x".into()));
        assert_eq!(record.id(), Some(&Primitive::Text("x".into())));
    }

    #[test]
    fn test_writer_and_reader() {
        let mut writer = RecordWriter::new("things");
        writer.field(VERSION_COLUMN, &Version::new(3)).field("note", &Option::<String>::None);
        let record = writer.finish().unwrap();

        assert_eq!(record.version(), Some(3));

        let reader = RecordReader::new("Thing", &record);
        assert_eq!(reader.value::<Version>(VERSION_COLUMN).unwrap(), Version::new(3));
        assert_eq!(reader.optional::<String>("note").unwrap(), None);
        assert_eq!(
            reader.value::<String>("note").unwrap_err(),
            MappingError::MissingField {
                entity: "Thing",
                field: "note"
            }
        );
    }

    #[test]
    fn test_reader_reports_invalid_field() {
        let mut record = Record::new("things");
        record.set(VERSION_COLUMN, Primitive::Int(-1));

        let err = RecordReader::new("Thing", &record)
            .value::<Version>(VERSION_COLUMN)
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidField { field: "version", .. }));
    }

    #[test]
    fn test_identifier_generated_for_null() {
        let mut record = Record::new("things");
        record.set(ID_COLUMN, Primitive::Null);

        let reader = RecordReader::new("Thing", &record);
        let first: ChatMessageId = reader.identifier(ID_COLUMN).unwrap();
        let second: ChatMessageId = reader.identifier(ID_COLUMN).unwrap();
        assert_ne!(first, second);
    }
}
