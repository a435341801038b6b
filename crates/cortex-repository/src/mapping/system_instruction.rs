//! System instruction mapping.

use super::EntityMapping;
use crate::record::{
    Column, ColumnKind, RecordReader, RecordSchema, RecordWriter, ID_COLUMN, UPDATED_AT_COLUMN, VERSION_COLUMN,
};
use cortex_core::{Aggregate, MappingError, SystemInstruction, Version};

/// `system_instructions` table.
pub static SYSTEM_INSTRUCTIONS: RecordSchema = RecordSchema {
    table: "system_instructions",
    columns: &[
        Column::new(ID_COLUMN, ColumnKind::Text),
        Column::new("provider", ColumnKind::Text),
        Column::new("instruction", ColumnKind::Text),
        Column::new("is_active", ColumnKind::Boolean),
        Column::new(VERSION_COLUMN, ColumnKind::Integer),
        Column::new("created_at", ColumnKind::Timestamp).default_now(),
        Column::new(UPDATED_AT_COLUMN, ColumnKind::Timestamp).default_now(),
    ],
};

impl EntityMapping for SystemInstruction {
    fn write(&self, record: &mut RecordWriter) {
        record
            .field(ID_COLUMN, self.id())
            .field("provider", &self.provider())
            .field("instruction", &self.instruction().to_string())
            .field("is_active", &self.is_active())
            .field(VERSION_COLUMN, &self.version().unwrap_or(Version::INITIAL))
            .field("created_at", &self.created_at())
            .field(UPDATED_AT_COLUMN, &self.updated_at());
    }

    fn read(record: &RecordReader<'_>) -> Result<Self, MappingError> {
        Ok(Self::reconstruct(
            record.identifier(ID_COLUMN)?,
            record.value("provider")?,
            record.value("instruction")?,
            record.value("is_active")?,
            record.value(VERSION_COLUMN)?,
            record.value("created_at")?,
            record.value(UPDATED_AT_COLUMN)?,
        ))
    }
}
