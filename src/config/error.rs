//! Configuration Error Types
//!
//! Specific, actionable error messages for configuration loading and validation.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {error}")]
    LoadError { error: String },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    /// Create a missing required field error
    pub fn missing_required_field<F: Into<String>, C: Into<String>>(field: F, context: C) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: Into<String>, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        Self::LoadError {
            error: err.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_field_error() {
        let error = ConfigurationError::missing_required_field("database.url", "database configuration");

        let error_string = error.to_string();
        assert!(error_string.contains("Missing required configuration field 'database.url'"));
        assert!(error_string.contains("database configuration"));
    }

    #[test]
    fn test_invalid_value_error() {
        let error = ConfigurationError::invalid_value(
            "database.max_connections",
            "0",
            "pool size must be greater than 0",
        );
        assert_eq!(
            error.to_string(),
            "Invalid value '0' for field 'database.max_connections': pool size must be greater than 0"
        );
    }
}
