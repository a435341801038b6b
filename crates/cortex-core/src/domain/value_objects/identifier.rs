//! Typed identifiers for aggregates.
//!
//! Identifiers are UUID v7 values, so they sort by creation time. They are
//! stored as text.

use crate::{DomainError, Generate, Primitive, ValueObject};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Creates a new time-ordered identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// Parses an identifier from its text form.
            pub fn parse(s: &str) -> Result<Self, DomainError> {
                uuid::Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| DomainError::InvalidIdentifier {
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Generate for $name {
            fn generate() -> Self {
                Self::new()
            }
        }

        impl ValueObject for $name {
            fn to_primitive(&self) -> Result<Primitive, DomainError> {
                Ok(Primitive::Text(self.0.to_string()))
            }

            fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
                match value {
                    Primitive::Text(text) => Self::parse(&text),
                    other => Err(DomainError::TypeMismatch {
                        expected: "text",
                        found: other.type_name(),
                    }),
                }
            }
        }
    };
}

define_id!(
    /// Identifier of a [`ChatMessage`](crate::ChatMessage).
    ChatMessageId
);

define_id!(
    /// Identifier of a [`SystemInstruction`](crate::SystemInstruction).
    SystemInstructionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let first = ChatMessageId::generate();
        let second = ChatMessageId::generate();
        assert_ne!(first, second);
        assert_eq!(first.into_inner().get_version_num(), 7);
    }

    #[test]
    fn test_primitive_round_trip() {
        let id = SystemInstructionId::new();
        let restored = SystemInstructionId::from_primitive(id.to_primitive().unwrap()).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn test_malformed_text_rejected() {
        let err = ChatMessageId::from_primitive(Primitive::Text("not-a-uuid".into())).unwrap_err();
        assert!(matches!(err, DomainError::InvalidIdentifier { ref value, .. } if value == "not-a-uuid"));
    }

    #[test]
    fn test_non_text_rejected() {
        assert!(ChatMessageId::from_primitive(Primitive::Int(1)).is_err());
    }

    #[test]
    fn test_parse_and_display() {
        let id = ChatMessageId::new();
        let parsed: ChatMessageId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
