//! Value objects.

mod ai_provider;
mod chat_role;
mod identifier;
mod sent_at;
mod version;

pub use ai_provider::AiProvider;
pub use chat_role::ChatRole;
pub use identifier::{ChatMessageId, SystemInstructionId};
pub use sent_at::SentAt;
pub use version::Version;
