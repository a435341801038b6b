//! Chat participant role.

use crate::{DomainError, Primitive, ValueObject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// A human participant.
    User,
    /// The language model.
    Model,
}

impl ChatRole {
    /// Returns the stored form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl FromStr for ChatRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            _ => Err(DomainError::invalid_value("chat role", s)),
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValueObject for ChatRole {
    fn to_primitive(&self) -> Result<Primitive, DomainError> {
        Ok(Primitive::Text(self.as_str().to_string()))
    }

    fn from_primitive(value: Primitive) -> Result<Self, DomainError> {
        String::from_primitive(value)?.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("USER".parse::<ChatRole>().unwrap(), ChatRole::User);
        assert_eq!("Model".parse::<ChatRole>().unwrap(), ChatRole::Model);
    }

    #[test]
    fn test_invalid_role() {
        let err = ChatRole::from_primitive(Primitive::Text("robot".into())).unwrap_err();
        assert_eq!(err.to_string(), "Invalid chat role: robot");
    }
}
