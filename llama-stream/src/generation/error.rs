//! Error types for text generation operations.

use crate::backend::{BackendError, TokenizeError};
use llama_loader::ErrorCategory;
use thiserror::Error;

/// Errors that can occur during text generation operations.
///
/// Only the fatal-before-loop variants ever leave
/// [`Generator::generate_stream`](super::Generator::generate_stream); a failed
/// decode inside the loop ends generation normally instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Configuration validation failed.
    #[error("Invalid generation configuration: {0}")]
    InvalidConfig(String),

    /// No model is attached to the engine.
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Failed to tokenize the input prompt.
    #[error("Failed to tokenize prompt: {0}")]
    TokenizationFailed(String),

    /// The prompt does not fit the decode batch.
    #[error("Prompt of {tokens} tokens exceeds batch capacity {capacity}")]
    PromptTooLong { tokens: usize, capacity: usize },

    /// The initial prompt decode failed.
    #[error("Prompt decoding failed: {0}")]
    PromptDecodeFailed(String),

    /// A single-token decode step failed.
    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),
}

impl GenerationError {
    /// Create a new tokenization error from a source error.
    pub fn tokenization<E: std::error::Error>(err: E) -> Self {
        Self::TokenizationFailed(err.to_string())
    }

    /// Create a new prompt decoding error from a source error.
    pub fn prompt_decoding<E: std::error::Error>(err: E) -> Self {
        Self::PromptDecodeFailed(err.to_string())
    }

    /// Create a new decoding error from a source error.
    pub fn decoding<E: std::error::Error>(err: E) -> Self {
        Self::DecodingFailed(err.to_string())
    }

    /// Text delivered to the sink when this error aborts a request.
    pub fn error_fragment(&self) -> &'static str {
        match self {
            GenerationError::ModelNotLoaded => "Error: Model not loaded",
            GenerationError::TokenizationFailed(_) => "Error: Tokenization failed",
            GenerationError::InvalidConfig(_) => "Error: Invalid configuration",
            GenerationError::PromptTooLong { .. }
            | GenerationError::PromptDecodeFailed(_)
            | GenerationError::DecodingFailed(_) => "Error: Decode failed",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::InvalidConfig(_) => ErrorCategory::User,
            GenerationError::ModelNotLoaded => ErrorCategory::User,
            GenerationError::PromptTooLong { .. } => ErrorCategory::User,
            GenerationError::TokenizationFailed(_) => ErrorCategory::System,
            GenerationError::PromptDecodeFailed(_) => ErrorCategory::System,
            GenerationError::DecodingFailed(_) => ErrorCategory::System,
        }
    }
}

impl From<TokenizeError> for GenerationError {
    fn from(err: TokenizeError) -> Self {
        Self::tokenization(err)
    }
}

impl From<BackendError> for GenerationError {
    fn from(err: BackendError) -> Self {
        Self::decoding(err)
    }
}

// Provide conversion from configuration validation errors
impl From<String> for GenerationError {
    fn from(msg: String) -> Self {
        Self::InvalidConfig(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fragments() {
        assert_eq!(
            GenerationError::ModelNotLoaded.error_fragment(),
            "Error: Model not loaded"
        );
        assert_eq!(
            GenerationError::prompt_decoding(BackendError::Decode("kv full".to_string()))
                .error_fragment(),
            "Error: Decode failed"
        );
        assert_eq!(
            GenerationError::PromptTooLong {
                tokens: 5000,
                capacity: 4096
            }
            .error_fragment(),
            "Error: Decode failed"
        );
    }

    #[test]
    fn test_conversions() {
        let err: GenerationError = TokenizeError::Failed("bad utf8".to_string()).into();
        assert!(matches!(err, GenerationError::TokenizationFailed(ref m) if m.contains("bad utf8")));

        let err: GenerationError = BackendError::Decode("oops".to_string()).into();
        assert!(matches!(err, GenerationError::DecodingFailed(_)));

        let err: GenerationError = "max_tokens must be greater than 0".to_string().into();
        assert_eq!(err.category(), ErrorCategory::User);
    }
}
