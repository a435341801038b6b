//! # Cortex Server
//!
//! Process wiring for Cortex: the dependency injection module, the
//! mediator registrations and the heartbeat worker that lets the model
//! speak up on its own.

pub mod app;
pub mod di;
pub mod logging;
pub mod startup;
