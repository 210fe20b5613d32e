use crate::error::ModelError;
use crate::types::{LoadedModel, ModelConfig, ModelMetadata};
use llama_cpp_2::{
    llama_backend::LlamaBackend,
    model::{params::LlamaModelParams, LlamaModel},
    send_logs_to_tracing, LogOptions,
};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tracing::{debug, info};

static GLOBAL_BACKEND: OnceLock<Arc<LlamaBackend>> = OnceLock::new();
static BACKEND_INIT: Mutex<()> = Mutex::new(());

/// Build model parameters from the configuration.
///
/// `n_gpu_layers = i32::MAX` requests that every layer be offloaded.
pub fn default_model_params(config: &ModelConfig) -> LlamaModelParams {
    LlamaModelParams::default()
        .with_n_gpu_layers(config.n_gpu_layers)
        .with_use_mlock(config.use_mlock)
}

/// Loads GGUF models from the local filesystem
pub struct ModelLoader {
    backend: Arc<LlamaBackend>,
}

impl ModelLoader {
    /// Create a loader, initializing the llama.cpp backend on first use.
    ///
    /// llama.cpp allows a single backend per process, so every loader shares it.
    pub fn new() -> Result<Self, ModelError> {
        if let Some(backend) = GLOBAL_BACKEND.get() {
            return Ok(Self {
                backend: backend.clone(),
            });
        }

        let _guard = BACKEND_INIT
            .lock()
            .map_err(|_| ModelError::LoadingFailed("Backend init lock poisoned".to_string()))?;

        // Another loader may have finished initializing while we waited
        if let Some(backend) = GLOBAL_BACKEND.get() {
            return Ok(Self {
                backend: backend.clone(),
            });
        }

        debug!("Initializing llama.cpp backend");
        let backend = Arc::new(LlamaBackend::init()?);
        let backend = GLOBAL_BACKEND.get_or_init(|| backend).clone();

        Ok(Self { backend })
    }

    /// Route llama.cpp's own log output through tracing.
    ///
    /// Without this llama.cpp writes directly to stderr.
    pub fn forward_native_logs(debug: bool) {
        send_logs_to_tracing(LogOptions::default().with_logs_enabled(debug));
    }

    /// Load the model described by `config`
    pub async fn load_model(&self, config: &ModelConfig) -> Result<LoadedModel, ModelError> {
        config.validate()?;

        let start_time = Instant::now();
        let model_path = config.model_path.clone();
        info!("Loading model from path: {:?}", model_path);

        let file_metadata = tokio::fs::metadata(&model_path).await?;
        let size_bytes = file_metadata.len();

        let model_params = default_model_params(config);
        let model =
            LlamaModel::load_from_file(&self.backend, &model_path, &model_params).map_err(|e| {
                ModelError::LoadingFailed(format!(
                    "Failed to load model from {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        let load_time = start_time.elapsed();
        let filename = model_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let metadata = ModelMetadata {
            filename,
            size_bytes,
            load_time,
            context_size: model.n_ctx_train() as usize,
            vocab_size: model.n_vocab().max(0) as usize,
        };

        debug!(
            "Model loaded in {:?} ({} bytes, vocab {}, trained ctx {})",
            metadata.load_time, metadata.size_bytes, metadata.vocab_size, metadata.context_size
        );

        Ok(LoadedModel {
            model,
            path: model_path,
            metadata,
            backend: self.backend.clone(),
        })
    }
}
