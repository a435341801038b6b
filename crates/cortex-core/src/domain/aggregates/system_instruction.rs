//! System instruction aggregate.

use crate::{Aggregate, AiProvider, DomainError, SystemInstructionId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A system prompt for one AI provider.
///
/// At most one instruction per provider is expected to be active; the
/// use cases enforce that by deactivating the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInstruction {
    id: SystemInstructionId,
    provider: AiProvider,
    instruction: String,
    is_active: bool,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SystemInstruction {
    /// Creates a new instruction at the initial version.
    pub fn create(provider: AiProvider, instruction: impl Into<String>, is_active: bool) -> Result<Self, DomainError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(DomainError::validation("Instruction cannot be empty"));
        }

        let now = Utc::now();
        Ok(Self {
            id: SystemInstructionId::new(),
            provider,
            instruction,
            is_active,
            version: Version::INITIAL,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a stored instruction without validation.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn reconstruct(
        id: SystemInstructionId,
        provider: AiProvider,
        instruction: String,
        is_active: bool,
        version: Version,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            provider,
            instruction,
            is_active,
            version,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub const fn provider(&self) -> AiProvider {
        self.provider
    }

    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Marks the instruction active. Persisting is the caller's job.
    pub fn activate(&mut self) {
        self.is_active = true;
    }

    /// Marks the instruction inactive. Persisting is the caller's job.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

impl Aggregate for SystemInstruction {
    type Id = SystemInstructionId;

    const NAME: &'static str = "SystemInstruction";
    const AUDITED: bool = true;

    fn id(&self) -> &SystemInstructionId {
        &self.id
    }

    fn version(&self) -> Option<Version> {
        Some(self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_at_initial_version() {
        let instruction = SystemInstruction::create(AiProvider::Mock, "Be terse.", false).unwrap();
        assert_eq!(instruction.version(), Some(Version::INITIAL));
        assert_eq!(instruction.created_at(), instruction.updated_at());
        assert!(!instruction.is_active());
    }

    #[test]
    fn test_blank_instruction_rejected() {
        let err = SystemInstruction::create(AiProvider::Gemini, "  ", true).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_activation_transitions() {
        let mut instruction = SystemInstruction::create(AiProvider::Gpt, "You are helpful.", false).unwrap();
        instruction.activate();
        assert!(instruction.is_active());
        instruction.deactivate();
        assert!(!instruction.is_active());
        assert_eq!(instruction.version(), Some(Version::INITIAL));
    }
}
