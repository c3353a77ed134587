use std::time::Duration;

use thiserror::Error;

/// Core domain errors
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Batch error: {message}")]
    Batch { message: String },

    #[error("Timed out after {}ms: {message}", .after.as_millis())]
    Timeout { message: String, after: Duration },

    #[error("Vector index error: {message}")]
    VectorIndex { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn batch(message: impl Into<String>) -> Self {
        Self::Batch {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            message: message.into(),
            after,
        }
    }

    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Timeout { .. } | Self::VectorIndex { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("text must not be empty");
        assert_eq!(error.to_string(), "Validation error: text must not be empty");
        assert!(!error.is_transient());
    }

    #[test]
    fn test_provider_error_is_transient() {
        let error = DomainError::provider("openai", "HTTP 503");
        assert_eq!(error.to_string(), "Provider error: openai - HTTP 503");
        assert!(error.is_transient());
    }

    #[test]
    fn test_timeout_error_message() {
        let error = DomainError::timeout("batch result", Duration::from_millis(250));
        assert_eq!(error.to_string(), "Timed out after 250ms: batch result");
        assert!(error.is_transient());
    }

    #[test]
    fn test_batch_error_is_not_transient() {
        assert!(!DomainError::batch("response count mismatch").is_transient());
    }
}
