use thiserror::Error;

/// Category of error for consistent handling and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input or configuration error - can be fixed by user
    User,
    /// System resource or environmental error - may be temporary
    System,
    /// Internal logic error - indicates a bug
    Internal,
}

/// Errors that can occur while provisioning a model or context
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model loading failed
    #[error("Model loading failed: {0}\n🔧 Check available memory and verify GGUF file integrity")]
    LoadingFailed(String),

    /// Model not found at the specified location
    #[error("Model not found: {0}\n📁 Verify file path is correct, file exists and is readable")]
    NotFound(String),

    /// Invalid model configuration
    #[error("Invalid model config: {0}\n⚙️ Ensure n_ctx > 0, n_threads > 0 and the model path points at a .gguf file")]
    InvalidConfig(String),

    /// Context creation failed
    #[error("Context creation failed: {0}\n🧠 Try a smaller n_ctx or fewer GPU layers")]
    ContextFailed(String),

    /// I/O error during file operations
    #[error("I/O error: {0}\n💾 Check file permissions and storage availability")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Create a new ModelError from a string message
    pub fn new(message: impl Into<String>) -> Self {
        Self::LoadingFailed(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::LoadingFailed(_) => ErrorCategory::System,
            ModelError::NotFound(_) => ErrorCategory::User,
            ModelError::InvalidConfig(_) => ErrorCategory::User,
            ModelError::ContextFailed(_) => ErrorCategory::System,
            ModelError::Io(_) => ErrorCategory::System,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ModelError::LoadingFailed(_) => "MODEL_LOADING_FAILED",
            ModelError::NotFound(_) => "MODEL_NOT_FOUND",
            ModelError::InvalidConfig(_) => "MODEL_INVALID_CONFIG",
            ModelError::ContextFailed(_) => "MODEL_CONTEXT_FAILED",
            ModelError::Io(_) => "MODEL_IO_ERROR",
        }
    }

    /// Check if this is a user-correctable error
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }
}

// Convert from llama-cpp-2 errors
impl From<llama_cpp_2::LlamaCppError> for ModelError {
    fn from(err: llama_cpp_2::LlamaCppError) -> Self {
        match err {
            llama_cpp_2::LlamaCppError::BackendAlreadyInitialized => {
                ModelError::LoadingFailed("Backend already initialized".to_string())
            }
            other => ModelError::LoadingFailed(format!("llama-cpp-2 error: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_model_error_creation() {
        let err = ModelError::new("test error");
        assert!(matches!(err, ModelError::LoadingFailed(_)));
    }

    #[test]
    fn test_error_categories() {
        assert!(ModelError::NotFound("x".to_string()).is_user_error());
        assert!(ModelError::InvalidConfig("x".to_string()).is_user_error());
        assert_eq!(
            ModelError::ContextFailed("x".to_string()).category(),
            ErrorCategory::System
        );
        assert!(!ModelError::LoadingFailed("x".to_string()).is_user_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let model_err = ModelError::from(io_err);
        assert!(matches!(model_err, ModelError::Io(_)));
        assert_eq!(model_err.error_code(), "MODEL_IO_ERROR");
    }

    #[test]
    fn test_llama_cpp_error_conversion() {
        let llama_err = llama_cpp_2::LlamaCppError::BackendAlreadyInitialized;
        let model_err = ModelError::from(llama_err);
        assert!(matches!(model_err, ModelError::LoadingFailed(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ModelError::ContextFailed("n_ctx too large".to_string());
        let display_str = format!("{}", err);
        assert!(display_str.contains("n_ctx too large"));
        assert!(display_str.contains("🧠"));
    }
}
