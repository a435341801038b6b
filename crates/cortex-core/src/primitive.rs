//! Primitive values and the value-object conversion contract.

use crate::DomainError;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

/// A storable scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Primitive {
    /// Returns the variant name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Checks for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer value, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text value, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> DomainError {
        DomainError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Timestamp(value) => write!(f, "{}", value.to_rfc3339()),
        }
    }
}

/// A domain value convertible to and from a [`Primitive`].
///
/// `from_primitive` validates; a stored value that breaks the type's rules
/// is rejected rather than trusted.
pub trait ValueObject: Sized {
    /// Converts the value to its storable form.
    ///
    /// Fails when the value has no faithful storable form.
    fn to_primitive(&self) -> Result<Primitive, DomainError>;

    /// Validates and rebuilds the value from its storable form.
    fn from_primitive(value: Primitive) -> Result<Self, DomainError>;
}

/// Value types that can mint a fresh instance, such as identifiers.
pub trait Generate {
    /// Creates a new, unique value.
    fn generate() -> Self;
}

impl ValueObject for String {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Text(self.clone()))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }
}

impl ValueObject for bool {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Bool(*self))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Bool(flag) => Ok(flag),
            Primitive::Int(0) => Ok(false),
            Primitive::Int(1) => Ok(true),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl ValueObject for i64 {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Int(*self))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Int(number) => Ok(number),
            other => Err(other.mismatch("int")),
        }
    }
}

impl ValueObject for f64 {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Float(*self))
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Float(number) => Ok(number),
            Primitive::Int(number) => Ok(number as f64),
            other => Err(other.mismatch("float")),
        }
    }
}

/// Timestamps are always stored and rebuilt as UTC.
///
/// Naive text is read as UTC, matching how rows written without an offset
/// are interpreted.
impl ValueObject for DateTime<Utc> {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Timestamp(*self))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Timestamp(at) => Ok(at),
            Primitive::Text(text) => parse_timestamp(&text),
            other => Err(other.mismatch("timestamp")),
        }
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, DomainError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| DomainError::invalid_value("timestamp", text))
}

impl<V: ValueObject> ValueObject for Option<V> {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        self.as_ref().map_or(Ok(Primitive::Null), ValueObject::to_primitive)
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        match value {
            Primitive::Null => Ok(None),
            other => V::from_primitive(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_string_round_trip() {
        let value = "hello".to_string();
        assert_eq!(String::from_primitive(value.to_primitive().unwrap()).unwrap(), value);
    }

    #[test]
    fn test_type_mismatch() {
        let err = String::from_primitive(Primitive::Int(3)).unwrap_err();
        assert_eq!(
            err,
            DomainError::TypeMismatch {
                expected: "text",
                found: "int"
            }
        );
    }

    #[test]
    fn test_bool_accepts_integer_flags() {
        assert!(bool::from_primitive(Primitive::Int(1)).unwrap());
        assert!(!bool::from_primitive(Primitive::Int(0)).unwrap());
        assert!(bool::from_primitive(Primitive::Int(2)).is_err());
    }

    #[test]
    fn test_option_null() {
        assert_eq!(Option::<String>::from_primitive(Primitive::Null).unwrap(), None);
        assert_eq!(None::<String>.to_primitive().unwrap(), Primitive::Null);
        assert_eq!(
            Option::<i64>::from_primitive(Primitive::Int(9)).unwrap(),
            Some(9)
        );
    }

    #[test]
    fn test_timestamp_text_parsing() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let aware = DateTime::<Utc>::from_primitive(Primitive::Text("2024-05-01T14:30:00+02:00".into())).unwrap();
        assert_eq!(aware, expected);

        let naive = DateTime::<Utc>::from_primitive(Primitive::Text("2024-05-01 12:30:00".into())).unwrap();
        assert_eq!(naive, expected);

        assert!(DateTime::<Utc>::from_primitive(Primitive::Text("yesterday".into())).is_err());
    }
}
