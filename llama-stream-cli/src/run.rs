//! Streaming a completion to a writer.

use llama_stream::{CompletionEngine, GenerationError, GenerationResponse, ModelBackend};
use std::io::{self, Read, Write};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Prompt from the flag, or all of stdin when the flag is absent.
pub fn read_prompt(flag: Option<String>, mut stdin: impl Read) -> io::Result<String> {
    match flag {
        Some(prompt) => Ok(prompt),
        None => {
            let mut prompt = String::new();
            stdin.read_to_string(&mut prompt)?;
            Ok(prompt)
        }
    }
}

/// Run one completion, writing each fragment to `out` as it arrives.
///
/// A failed write (for example a closed pipe) cancels `cancel`, which ends
/// generation at the next step, and later fragments are dropped. Cancellation
/// from elsewhere does not stop output, so the text released when generation
/// finalizes is still written.
pub fn stream_completion<B, W>(
    engine: &mut CompletionEngine<B>,
    prompt: &str,
    stop: Option<&str>,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<GenerationResponse, GenerationError>
where
    B: ModelBackend,
    W: Write,
{
    let mut broken = false;
    let mut sink = |fragment: &str| {
        if broken {
            return;
        }
        if let Err(e) = out.write_all(fragment.as_bytes()).and_then(|_| out.flush()) {
            warn!("Failed to write output, cancelling generation: {}", e);
            broken = true;
            cancel.cancel();
        }
    };

    engine.complete(prompt, stop, &mut sink)
}
