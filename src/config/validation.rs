//! Settings validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: TraceSettings → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::TraceSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be a plain file name, got '{value}'")]
    NotAFileName { field: &'static str, value: String },

    #[error("max_log_bytes must be greater than zero")]
    ZeroLogLimit,

    #[error("primary and always-on provider ids must differ")]
    DuplicateProviderId,
}

pub fn validate_settings(settings: &TraceSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("process_name", &settings.process_name),
        ("config_file", &settings.config_file),
        ("problems.file_name", &settings.problems.file_name),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty { field });
        } else if value.contains(['/', '\\']) {
            errors.push(ValidationError::NotAFileName {
                field,
                value: value.clone(),
            });
        }
    }

    if settings.max_log_bytes == 0 {
        errors.push(ValidationError::ZeroLogLimit);
    }

    if settings.provider.primary_id == settings.provider.always_on_id {
        errors.push(ValidationError::DuplicateProviderId);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&TraceSettings::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut settings = TraceSettings::default();
        settings.process_name = " ".into();
        settings.config_file = "../log.conf".into();
        settings.max_log_bytes = 0;
        settings.provider.always_on_id = settings.provider.primary_id;

        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroLogLimit));
    }
}
