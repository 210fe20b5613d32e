//! CLI definition for the llama-stream command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::StreamConfig;

/// Stream a greedy completion from a GGUF model.
///
/// Generated text goes to stdout as it is produced; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "llama-stream")]
#[command(version)]
#[command(about = "Stream a greedy completion from a GGUF model")]
pub struct Cli {
    /// Path to the GGUF model file
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Prompt text; read from stdin when omitted
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Extra stop sequence, checked before the built-in markers
    #[arg(short, long)]
    pub stop: Option<String>,

    /// Maximum number of tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Context size in tokens
    #[arg(long)]
    pub n_ctx: Option<u32>,

    /// Configuration file (defaults to ./llama-stream.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug output to stderr
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line flags on top of the layered configuration.
    pub fn apply_overrides(&self, config: &mut StreamConfig) {
        if let Some(model) = &self.model {
            config.model.model_path = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.generation.max_tokens = max_tokens;
        }
        if let Some(n_ctx) = self.n_ctx {
            config.model.n_ctx = n_ctx;
        }
        if self.debug {
            config.model.debug = true;
        }
    }
}
