//! Layered configuration for the llama-stream CLI.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, or `llama-stream.toml` in the working directory)
//! 3. `LLAMA_STREAM_` environment variables, `__` separating nested keys
//!    (`LLAMA_STREAM_GENERATION__MAX_TOKENS=64`)
//! 4. Command-line flags, applied by [`Cli::apply_overrides`](crate::Cli::apply_overrides)

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use llama_loader::{ModelConfig, ModelError};
use llama_stream::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, trace};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "llama-stream.toml";

/// Prefix of environment variables read as configuration.
pub const ENV_PREFIX: &str = "LLAMA_STREAM_";

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub model: ModelConfig,
    pub generation: GenerationConfig,
}

impl StreamConfig {
    /// Check the runtime parameters; the model file itself is checked at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate_runtime()?;
        self.generation
            .validate()
            .map_err(ConfigError::InvalidGeneration)
    }
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] Box<figment::Error>),

    #[error(transparent)]
    InvalidModel(#[from] ModelError),

    #[error("Invalid generation configuration: {0}")]
    InvalidGeneration(String),
}

/// Builds a [`StreamConfig`] from defaults, a config file and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    search_dir: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader that looks for the default file in the working directory.
    pub fn new() -> Self {
        Self {
            config_file: None,
            search_dir: PathBuf::from("."),
        }
    }

    /// Use `path` instead of the default file; it must exist.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Directory searched for the default file.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    /// Build the figment with every source in precedence order.
    pub fn figment(&self) -> Result<Figment, ConfigError> {
        debug!("Building figment configuration with precedence order");

        let mut figment = Figment::from(Serialized::defaults(StreamConfig::default()));

        if let Some(file) = self.config_file()? {
            debug!("Loading configuration file {}", file.display());
            figment = figment.merge(Toml::file(file));
        }

        trace!("Reading {}* environment variables", ENV_PREFIX);
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(&self) -> Result<StreamConfig, ConfigError> {
        let config: StreamConfig = self.figment()?.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn config_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        match &self.config_file {
            Some(path) if path.is_file() => Ok(Some(path.clone())),
            Some(path) => Err(ConfigError::FileNotFound(path.clone())),
            None => Ok(Some(self.search_dir.join(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file())),
        }
    }
}
