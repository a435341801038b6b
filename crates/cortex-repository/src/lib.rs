//! # Cortex Repository
//!
//! Persistence for Cortex aggregates:
//!
//! ```text
//! Use case handler
//!   ↓  Arc<dyn UnitOfWork>          (begin → UnitOfWorkScope)
//! UnitOfWorkScope                   (one session, cached repositories)
//!   ↓  repository::<T>()
//! SystemInstructionRepository / ChatHistoryRepository
//!   ↓  GenericRepository<T>         (get / add / update / delete, version checks)
//! MappingRegistry                   (aggregate ↔ Record)
//!   ↓  Box<dyn Session>
//! PostgresSession | InMemorySession
//! ```
//!
//! ## Structure
//!
//! ```text
//! src/
//!   record.rs          ← Record, RecordSchema, RecordWriter/Reader
//!   mapping/           ← EntityMapping impls and MappingRegistry
//!   session/           ← Session trait, in-memory and Postgres sessions
//!   generic.rs         ← GenericRepository
//!   repositories/      ← aggregate-specific repositories
//!   unit_of_work.rs    ← UnitOfWork, UnitOfWorkScope
//!   pool.rs            ← DatabasePool
//! ```

pub mod generic;
pub mod mapping;
pub mod pool;
pub mod record;
pub mod repositories;
pub mod session;
pub mod unit_of_work;

pub use generic::*;
pub use mapping::*;
pub use pool::*;
pub use record::*;
pub use repositories::*;
pub use session::*;
pub use unit_of_work::*;
