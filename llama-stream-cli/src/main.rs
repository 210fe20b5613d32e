//! llama-stream - stream a greedy completion from a GGUF model.
//!
//! The prompt comes from `--prompt` or stdin. Generated text is written to
//! stdout as it is produced, with stop sequences removed; logs go to stderr.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error (the error fragment, if any, has already been written to stdout)

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use llama_loader::ModelLoader;
use llama_stream::{CompletionEngine, LlamaCppBackend};
use llama_stream_cli::{read_prompt, stream_completion, Cli, ConfigLoader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level
    let filter = if cli.debug {
        EnvFilter::new("llama_stream=debug,llama_loader=debug,llama_stream_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = ConfigLoader::new()
        .with_config_file(cli.config.clone())
        .load()?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let prompt = read_prompt(cli.prompt.clone(), io::stdin().lock())
        .context("Failed to read prompt from stdin")?;

    ModelLoader::forward_native_logs(config.model.debug);
    let loader = ModelLoader::new()?;
    let loaded = loader.load_model(&config.model).await?;
    info!(
        "Loaded {} ({} bytes) in {:?}",
        loaded.metadata.filename, loaded.metadata.size_bytes, loaded.metadata.load_time
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling generation");
            ctrl_c.cancel();
        }
    });

    // Generation is synchronous and borrows the loaded model
    let result = tokio::task::block_in_place(|| -> anyhow::Result<_> {
        let backend = LlamaCppBackend::new(&loaded, &config.model)?
            .with_batch_capacity(config.generation.batch_capacity);
        let mut engine = CompletionEngine::new();
        engine.set_cancellation(Some(cancel.clone()));
        engine.attach(backend, config.generation.clone())?;

        let mut stdout = io::stdout().lock();
        let result = stream_completion(
            &mut engine,
            &prompt,
            cli.stop.as_deref(),
            &mut stdout,
            &cancel,
        );
        writeln!(stdout).ok();
        Ok(result)
    })?;

    match result {
        Ok(response) => {
            info!(
                tokens_generated = response.tokens_generated,
                prompt_tokens = response.prompt_tokens,
                "Finished in {:?}: {}",
                response.generation_time,
                response.finish_reason
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
