//! Validation utilities.

use crate::UseCaseError;
use validator::{Validate, ValidationErrors};

/// Extension trait for validating command structs.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns a [`UseCaseError::Validation`] on failure.
    fn validate_request(&self) -> Result<(), UseCaseError> {
        self.validate().map_err(validation_errors_to_use_case_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Converts `validator::ValidationErrors` into a single validation error.
///
/// Fields are reported in name order so the message is stable.
#[must_use]
pub fn validation_errors_to_use_case_error(errors: ValidationErrors) -> UseCaseError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    let message = fields
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let detail = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                format!("{field}: {detail}")
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    UseCaseError::Validation(message)
}

/// Common validation functions.
pub mod rules {
    use validator::ValidationError;

    /// Validates that a string is not blank (not empty after trimming).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("not_blank"));
        }
        Ok(())
    }
}
