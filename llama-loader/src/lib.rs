//! # Llama Loader
//!
//! Model and context provisioning for llama-stream. Validates a [`ModelConfig`],
//! initializes the process-wide llama.cpp backend, loads a local GGUF file and
//! creates inference contexts sized from the configuration.

pub mod error;
pub mod loader;
pub mod types;

// Re-export main types for convenience
pub use error::{ErrorCategory, ModelError};
pub use loader::{default_model_params, ModelLoader};
pub use types::{LoadedModel, ModelConfig, ModelMetadata};
