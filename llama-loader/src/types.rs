use crate::error::ModelError;
use llama_cpp_2::{
    context::{params::LlamaContextParams, LlamaContext},
    llama_backend::LlamaBackend,
    model::LlamaModel,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default context window, in tokens.
pub const DEFAULT_N_CTX: u32 = 2048;

/// Default number of CPU threads used for decoding.
pub const DEFAULT_N_THREADS: i32 = 4;

/// A loaded model with associated metadata
pub struct LoadedModel {
    /// The loaded LLAMA model
    pub model: LlamaModel,
    /// Path to the model file
    pub path: PathBuf,
    /// Metadata about the model loading process
    pub metadata: ModelMetadata,
    pub(crate) backend: Arc<LlamaBackend>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl LoadedModel {
    /// Create a fresh inference context for this model.
    ///
    /// The context window and thread counts come from `config`. `n_batch` is set
    /// to the full context window so a prompt can be submitted in a single decode.
    pub fn create_context(&self, config: &ModelConfig) -> Result<LlamaContext<'_>, ModelError> {
        config.validate_runtime()?;

        let n_ctx = NonZeroU32::new(config.n_ctx)
            .ok_or_else(|| ModelError::InvalidConfig("n_ctx must be greater than 0".to_string()))?;

        let context_params = LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_batch(config.n_ctx)
            .with_n_threads(config.n_threads)
            .with_n_threads_batch(config.n_threads_batch);

        debug!(
            "Creating context with n_ctx={}, n_threads={}, n_threads_batch={}",
            config.n_ctx, config.n_threads, config.n_threads_batch
        );

        self.model
            .new_context(&self.backend, context_params)
            .map_err(|e| ModelError::ContextFailed(format!("Failed to create context: {}", e)))
    }
}

/// Metadata about a loaded model
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// The filename of the model
    pub filename: String,
    /// Size of the model file in bytes
    pub size_bytes: u64,
    /// Time taken to load the model
    pub load_time: Duration,
    /// Context window the model was trained with
    pub context_size: usize,
    /// Number of entries in the model vocabulary
    pub vocab_size: usize,
}

/// Configuration for model loading and context creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to a local GGUF model file
    pub model_path: PathBuf,
    /// Context window size in tokens
    pub n_ctx: u32,
    /// Number of threads for single-token decoding
    pub n_threads: i32,
    /// Number of threads for prompt (batch) decoding
    pub n_threads_batch: i32,
    /// Layers to offload to the GPU; `i32::MAX` requests all of them
    pub n_gpu_layers: u32,
    /// Lock model weights in RAM
    pub use_mlock: bool,
    /// Forward llama.cpp's own logging to tracing
    pub debug: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            n_ctx: DEFAULT_N_CTX,
            n_threads: DEFAULT_N_THREADS,
            n_threads_batch: DEFAULT_N_THREADS,
            n_gpu_layers: i32::MAX as u32,
            use_mlock: false,
            debug: false,
        }
    }
}

impl ModelConfig {
    /// Create a configuration for the given model file with default runtime settings
    pub fn for_path(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// Validate the model configuration, including that the model file exists
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ModelError::InvalidConfig(
                "model_path must be set".to_string(),
            ));
        }

        match self.model_path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("gguf") => {}
            _ => {
                return Err(ModelError::InvalidConfig(format!(
                    "Model file must have .gguf extension: {}",
                    self.model_path.display()
                )))
            }
        }

        if !self.model_path.is_file() {
            return Err(ModelError::NotFound(format!(
                "Model file does not exist: {}",
                self.model_path.display()
            )));
        }

        self.validate_runtime()
    }

    /// Validate only the context/runtime parameters
    pub fn validate_runtime(&self) -> Result<(), ModelError> {
        if self.n_ctx == 0 {
            return Err(ModelError::InvalidConfig(
                "n_ctx must be greater than 0".to_string(),
            ));
        }

        if self.n_threads <= 0 || self.n_threads_batch <= 0 {
            return Err(ModelError::InvalidConfig(
                "Thread counts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
