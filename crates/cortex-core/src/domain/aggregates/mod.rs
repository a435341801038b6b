//! Aggregate roots.

mod chat_message;
mod system_instruction;

pub use chat_message::ChatMessage;
pub use system_instruction::SystemInstruction;
