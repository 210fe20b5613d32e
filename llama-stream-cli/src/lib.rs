//! llama-stream CLI: configuration layering, argument parsing and output
//! streaming for the `llama-stream` binary.

pub mod cli;
pub mod config;
pub mod run;

pub use cli::Cli;
pub use config::{ConfigError, ConfigLoader, StreamConfig};
pub use run::{read_prompt, stream_completion};
