//! # Cortex Config
//!
//! Layered configuration for Cortex: TOML files, `.env` and `CORTEX_*`
//! environment variables, validated on every load.

mod app_config;
mod backend;
mod loader;
mod validation;

pub use app_config::*;
pub use backend::*;
pub use loader::*;
pub use validation::*;
