//! Application use cases.
//!
//! Each use case is a [`Request`](cortex_core::Request) paired with a
//! handler. Handlers are built per request by the mediator through their
//! `shaku::Provider` impl, open at most one unit-of-work scope, and commit
//! explicitly; a scope dropped on an error path rolls back.

mod change_active_system_instruction;
mod create_system_instruction;
mod generate_content;
mod get_embedding;
mod handle_heartbeat;
mod list_system_instructions;
mod publish_received_direct_message;
mod publish_received_message;
mod spontaneous_dialog;

pub use change_active_system_instruction::*;
pub use create_system_instruction::*;
pub use generate_content::*;
pub use get_embedding::*;
pub use handle_heartbeat::*;
pub use list_system_instructions::*;
pub use publish_received_direct_message::*;
pub use publish_received_message::*;
pub use spontaneous_dialog::*;
