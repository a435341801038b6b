//! Language model provider.

use crate::{DomainError, Primitive, ValueObject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend that generates content or embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AiProvider {
    Gemini,
    #[serde(rename = "GPT")]
    Gpt,
    Ollama,
    /// Canned responses, used for local runs and tests.
    #[default]
    Mock,
}

impl AiProvider {
    /// Returns the stored form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::Gpt => "GPT",
            Self::Ollama => "Ollama",
            Self::Mock => "Mock",
        }
    }

    /// Returns all providers.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Gemini, Self::Gpt, Self::Ollama, Self::Mock]
    }
}

impl FromStr for AiProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "gpt" => Ok(Self::Gpt),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(DomainError::invalid_value("AI provider", s)),
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ValueObject for AiProvider {
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
    fn test_stored_form_round_trips() {
        for provider in AiProvider::all() {
            assert_eq!(AiProvider::from_primitive(provider.to_primitive().unwrap()).unwrap(), provider);
        }
    }

    #[test]
    fn test_invalid_provider() {
        let err = "claude-9000".parse::<AiProvider>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid AI provider: claude-9000");
    }
}
