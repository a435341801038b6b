//! Aggregate root contract used by the persistence layer.

use crate::{ValueObject, Version};
use std::fmt::Display;

/// An aggregate root stored and loaded as one unit.
///
/// Optional capabilities change how repositories write the aggregate:
/// returning `Some` from [`version`](Aggregate::version) opts into
/// optimistic locking, and setting [`AUDITED`](Aggregate::AUDITED) makes
/// every update stamp `updated_at`.
pub trait Aggregate: Clone + Send + Sync + 'static {
    /// Identifier type.
    type Id: ValueObject + Clone + Display + Send + Sync + 'static;

    /// Name used in error messages.
    const NAME: &'static str;

    /// Whether updates stamp the `updated_at` column.
    const AUDITED: bool = false;

    /// Returns the identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the version the holder last observed, if versioned.
    fn version(&self) -> Option<Version> {
        None
    }
}
