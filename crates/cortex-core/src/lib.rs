//! # Cortex Core
//!
//! Foundation shared by every Cortex crate: error taxonomy, result
//! combinators, the async chaining wrapper, the request mediator and the
//! domain model.

pub mod chain;
pub mod domain;
pub mod error;
pub mod mediator;
pub mod primitive;
pub mod result;
pub mod validation;

pub use chain::*;
pub use domain::*;
pub use error::*;
pub use mediator::*;
pub use primitive::*;
pub use result::*;
pub use validation::*;

// Re-export shaku for dependency injection
pub use shaku::{module, Component, HasComponent, HasProvider, Interface, Module, Provider};
