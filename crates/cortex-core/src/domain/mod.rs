//! # Cortex Domain
//!
//! Aggregates and value objects of the chat backend.

pub mod aggregate;
pub mod aggregates;
pub mod value_objects;

pub use aggregate::*;
pub use aggregates::*;
pub use value_objects::*;
