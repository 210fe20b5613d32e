//! Output streaming tests using a scripted backend in place of a real model.

use llama_stream::{CompletionEngine, FinishReason, GenerationConfig, RecordedBackend};
use llama_stream_cli::stream_completion;
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;

fn engine(pieces: &[&str], outputs: &[i32]) -> CompletionEngine<RecordedBackend> {
    let mut engine = CompletionEngine::new();
    engine
        .attach(
            RecordedBackend::scripted(pieces, outputs),
            GenerationConfig::default(),
        )
        .unwrap();
    engine
}

#[test]
fn test_stream_writes_filtered_text() {
    let mut engine = engine(&["Hi", " there", "User:", " bye"], &[1, 2, 3]);
    let mut out: Vec<u8> = Vec::new();
    let cancel = CancellationToken::new();

    let response = stream_completion(&mut engine, "Hi", Some("User:"), &mut out, &cancel).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), " there");
    assert_eq!(
        response.finish_reason,
        FinishReason::StopSequence("User:".to_string())
    );
}

#[test]
fn test_stream_reports_missing_model() {
    let mut engine: CompletionEngine<RecordedBackend> = CompletionEngine::new();
    let mut out: Vec<u8> = Vec::new();
    let cancel = CancellationToken::new();

    let result = stream_completion(&mut engine, "Hi", None, &mut out, &cancel);

    assert!(result.is_err());
    assert_eq!(String::from_utf8(out).unwrap(), "Error: Model not loaded");
}

/// Writer that accepts a fixed number of writes, then fails like a closed pipe.
struct ClosingPipe {
    written: Vec<u8>,
    writes_left: usize,
}

impl Write for ClosingPipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        self.writes_left -= 1;
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_failure_cancels_generation() {
    let mut engine = engine(&["a"], &[0; 20]);
    let mut pipe = ClosingPipe {
        written: Vec::new(),
        writes_left: 2,
    };
    let cancel = CancellationToken::new();
    engine.set_cancellation(Some(cancel.clone()));

    let response = stream_completion(&mut engine, "a", None, &mut pipe, &cancel).unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(response.finish_reason, FinishReason::Cancelled);
    assert_eq!(pipe.written, b"aa");
}

/// Writer that cancels the token on its first write, as Ctrl-C would mid-stream.
struct InterruptingWriter {
    written: Vec<u8>,
    cancel: CancellationToken,
}

impl Write for InterruptingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cancel.cancel();
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_interrupt_still_writes_finalized_text() {
    // The second piece pushes pending text past the flush threshold while it
    // still ends like "<|im_end|>", so part of it is held back
    let mut engine = engine(&["<|im_", "0123456789abcdef<"], &[0, 1, 1]);
    let cancel = CancellationToken::new();
    engine.set_cancellation(Some(cancel.clone()));
    let mut writer = InterruptingWriter {
        written: Vec::new(),
        cancel: cancel.clone(),
    };

    let response = stream_completion(&mut engine, "go", None, &mut writer, &cancel).unwrap();

    assert_eq!(response.finish_reason, FinishReason::Cancelled);
    assert_eq!(response.generated_text, "<|im_0123456789abcdef<");
    assert_eq!(
        String::from_utf8(writer.written).unwrap(),
        "<|im_0123456789abcdef<"
    );
}
