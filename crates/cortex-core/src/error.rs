//! Error taxonomy for every layer of Cortex.
//!
//! Each layer owns its own enum: domain validation ([`DomainError`]), record
//! mapping ([`MappingError`]), persistence ([`RepositoryError`]), request
//! routing ([`MediatorError`]) and use cases ([`UseCaseError`]). The
//! process-level [`CortexError`] wraps infrastructure failures at the edge.

use std::fmt::Debug;
use thiserror::Error;

// ============ Domain ============

/// Failure to construct or validate a domain value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed identifier text.
    #[error("Invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// Version counters never go below zero.
    #[error("Version must be non-negative, got {0}")]
    InvalidVersion(i64),

    /// A value outside an enumerated set (role, provider, timestamp text).
    #[error("Invalid {kind}: {value}")]
    InvalidValue { kind: &'static str, value: String },

    /// The primitive has the wrong shape for the target type.
    #[error("Expected a {expected} primitive, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Aggregate invariant violation.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl DomainError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(kind: &'static str, value: impl ToString) -> Self {
        Self::InvalidValue {
            kind,
            value: value.to_string(),
        }
    }
}

// ============ Mapping ============

/// Failure converting between an aggregate and its persistence record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The aggregate type was never registered with the mapping registry.
    #[error("No record mapping registered for {0}")]
    Unregistered(&'static str),

    /// Two aggregate types claimed the same table.
    #[error("Table '{table}' is already mapped to {existing}")]
    DuplicateTable {
        table: &'static str,
        existing: &'static str,
    },

    /// The record belongs to a table registered for another aggregate type.
    #[error("Record of table '{table}' maps to {actual}, not {requested}")]
    TypeMismatch {
        table: &'static str,
        requested: &'static str,
        actual: &'static str,
    },

    /// A required column was absent or null.
    #[error("Cannot construct {entity}: field '{field}' is missing")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    /// A column held a value the field's type rejected.
    #[error("Cannot construct {entity}: invalid value for field '{field}': {source}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        source: DomainError,
    },

    /// A field value has no storable form.
    #[error("Cannot store field '{field}' of table '{table}': {source}")]
    UnstorableField {
        table: &'static str,
        field: &'static str,
        source: DomainError,
    },

    /// The written record does not line up with the declared schema.
    #[error("Record for table '{table}' does not match its schema: {detail}")]
    SchemaMismatch { table: &'static str, detail: String },
}

// ============ Repository ============

/// Coarse classification of [`RepositoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    NotFound,
    AlreadyExists,
    VersionConflict,
    Unexpected,
}

/// Errors returned by repositories and the unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No stored row for the identifier.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A row with the identifier is already stored.
    #[error("{entity} with id {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    /// The stored version moved on since the writer read it.
    #[error(
        "Concurrent modification detected for {entity} with id {id}. \
         Expected version {expected}, but current version is {actual}"
    )]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Misuse, mapping failures and driver errors.
    #[error("{0}")]
    Unexpected(String),
}

impl RepositoryError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> RepositoryErrorKind {
        match self {
            Self::NotFound { .. } => RepositoryErrorKind::NotFound,
            Self::AlreadyExists { .. } => RepositoryErrorKind::AlreadyExists,
            Self::VersionConflict { .. } => RepositoryErrorKind::VersionConflict,
            Self::Unexpected(_) => RepositoryErrorKind::Unexpected,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::Unexpected(_) => "UNEXPECTED",
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates an already exists error.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a version conflict error.
    #[must_use]
    pub fn version_conflict(entity: &'static str, id: impl ToString, expected: u64, actual: u64) -> Self {
        Self::VersionConflict {
            entity,
            id: id.to_string(),
            expected,
            actual,
        }
    }

    /// Creates an unexpected error.
    #[must_use]
    pub fn unexpected<T: Into<String>>(message: T) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unexpected(err.to_string())
    }
}

impl From<MappingError> for RepositoryError {
    fn from(err: MappingError) -> Self {
        Self::Unexpected(err.to_string())
    }
}

impl From<DomainError> for RepositoryError {
    fn from(err: DomainError) -> Self {
        Self::Unexpected(err.to_string())
    }
}

// ============ Mediator ============

/// Routing failures raised by the mediator.
///
/// These are configuration mistakes, never business outcomes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediatorError {
    /// No handler registered for the request type.
    #[error("Handler not found for request type: {request_type}")]
    HandlerNotFound { request_type: &'static str },

    /// A second handler was registered for the same request type.
    #[error("Handler already registered for request type: {request_type}")]
    DuplicateHandler { request_type: &'static str },

    /// The dependency resolver could not build the handler.
    #[error("Failed to resolve handler {handler} for request type {request_type}: {message}")]
    Resolution {
        request_type: &'static str,
        handler: &'static str,
        message: String,
    },
}

// ============ Use case ============

/// Coarse classification of [`UseCaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCaseErrorKind {
    NotFound,
    Validation,
    ConcurrencyConflict,
    Unexpected,
}

/// Errors returned by use-case handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UseCaseError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// The caller may re-read and retry.
    #[error("{0}")]
    ConcurrencyConflict(String),

    #[error("{0}")]
    Unexpected(String),

    /// The request never reached a handler.
    #[error(transparent)]
    Dispatch(#[from] MediatorError),
}

impl UseCaseError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> UseCaseErrorKind {
        match self {
            Self::NotFound(_) => UseCaseErrorKind::NotFound,
            Self::Validation(_) => UseCaseErrorKind::Validation,
            Self::ConcurrencyConflict(_) => UseCaseErrorKind::ConcurrencyConflict,
            Self::Unexpected(_) | Self::Dispatch(_) => UseCaseErrorKind::Unexpected,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self.kind() {
            UseCaseErrorKind::NotFound => "NOT_FOUND",
            UseCaseErrorKind::Validation => "VALIDATION_ERROR",
            UseCaseErrorKind::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            UseCaseErrorKind::Unexpected => "UNEXPECTED",
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found<T: Into<String>>(message: T) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an unexpected error.
    #[must_use]
    pub fn unexpected<T: Into<String>>(message: T) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<RepositoryError> for UseCaseError {
    fn from(err: RepositoryError) -> Self {
        match err.kind() {
            RepositoryErrorKind::NotFound => Self::NotFound(err.to_string()),
            RepositoryErrorKind::VersionConflict => Self::ConcurrencyConflict(err.to_string()),
            RepositoryErrorKind::AlreadyExists | RepositoryErrorKind::Unexpected => {
                Self::Unexpected(err.to_string())
            }
        }
    }
}

impl From<DomainError> for UseCaseError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

// ============ Process ============

/// Infrastructure error raised while wiring and running the process.
#[derive(Error, Debug)]
pub enum CortexError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Event bus error
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// External service error
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Mediator(#[from] MediatorError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CortexError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::EventBus(_) => "EVENT_BUS_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Repository(err) => err.error_code(),
            Self::Mediator(_) => "DISPATCH_ERROR",
            Self::Mapping(_) => "MAPPING_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::EventBus(_) | Self::ExternalService { .. }
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for CortexError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CortexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}
