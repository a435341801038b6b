//! Optimistic-locking version counter.

use crate::{DomainError, Primitive, ValueObject};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative counter bumped once per successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly created aggregate.
    pub const INITIAL: Self = Self(0);

    /// Creates a version from a raw counter.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0 + 1)
    }
}

impl TryFrom<i64> for Version {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| DomainError::InvalidVersion(value))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ValueObject for Version {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        i64::try_from(self.0)
            .map(Primitive::Int)
            .map_err(|_| DomainError::invalid_value("version", self.0))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Int(raw) => Self::try_from(raw),
            other => Err(DomainError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_returns_new_instance() {
        let v0 = Version::INITIAL;
        let v1 = v0.increment();
        assert_eq!(v0.value(), 0);
        assert_eq!(v1.value(), 1);
    }

    #[test]
    fn test_negative_rejected() {
        let err = Version::from_primitive(Primitive::Int(-1)).unwrap_err();
        assert_eq!(err, DomainError::InvalidVersion(-1));
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn test_round_trip() {
        let version = Version::new(12);
        assert_eq!(Version::from_primitive(version.to_primitive().unwrap()).unwrap(), version);
    }

    #[test]
    fn test_beyond_storable_range_rejected() {
        let err = Version::new(u64::MAX).to_primitive().unwrap_err();
        assert_eq!(err, DomainError::invalid_value("version", u64::MAX));

        let largest = Version::new(i64::MAX.unsigned_abs());
        assert_eq!(largest.to_primitive().unwrap(), Primitive::Int(i64::MAX));
    }
}
