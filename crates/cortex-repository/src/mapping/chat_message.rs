//! Chat message mapping.

use super::EntityMapping;
use crate::record::{Column, ColumnKind, RecordReader, RecordSchema, RecordWriter, ID_COLUMN};
use cortex_core::{ChatMessage, MappingError};

/// `chat_messages` table.
///
/// `created_at` is stamped by the database and never read back.
pub static CHAT_MESSAGES: RecordSchema = RecordSchema {
    table: "chat_messages",
    columns: &[
        Column::new(ID_COLUMN, ColumnKind::Text),
        Column::new("role", ColumnKind::Text),
        Column::new("content", ColumnKind::Text),
        Column::new("sent_at", ColumnKind::Timestamp),
        Column::new("created_at", ColumnKind::Timestamp).default_now(),
    ],
};

impl EntityMapping for ChatMessage {
    fn write(&self, record: &mut RecordWriter) {
        record
            .field(ID_COLUMN, &self.id)
            .field("role", &self.role)
            .field("content", &self.content)
            .field("sent_at", &self.sent_at);
    }

    fn read(record: &RecordReader<'_>) -> Result<Self, MappingError> {
        Ok(Self::reconstruct(
            record.identifier(ID_COLUMN)?,
            record.value("role")?,
            record.value("content")?,
            record.value("sent_at")?,
        ))
    }
}
