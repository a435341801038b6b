//! Infrastructure backend selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage behind the unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// PostgreSQL through a `sqlx` pool.
    #[default]
    Postgres,
    /// Process-local store; data is lost on exit.
    Memory,
}

impl DatabaseBackend {
    /// Returns true if a connection pool is required.
    #[must_use]
    pub const fn needs_pool(&self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            _ => Err(format!("Invalid database backend: {s}")),
        }
    }
}

/// Transport used by the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventBusBackend {
    /// In-process dispatch.
    #[default]
    Memory,
    /// Redis pub/sub.
    Redis,
    /// PostgreSQL LISTEN/NOTIFY over the database pool.
    Postgres,
}

impl EventBusBackend {
    /// Returns true if the backend needs a Redis connection.
    #[must_use]
    pub const fn uses_redis(&self) -> bool {
        matches!(self, Self::Redis)
    }

    /// Returns true if the backend shares the database pool.
    #[must_use]
    pub const fn uses_postgres(&self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl fmt::Display for EventBusBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

impl FromStr for EventBusBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(format!("Invalid event bus backend: {s}")),
        }
    }
}
