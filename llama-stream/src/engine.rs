//! Completion engine: an explicit handle for the loaded model.

use crate::backend::ModelBackend;
use crate::generation::{GenerationConfig, GenerationError, Generator};
use crate::sink::EmissionSink;
use crate::types::GenerationResponse;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns at most one attached backend and serves completions from it.
///
/// Completions requested while nothing is attached report
/// [`GenerationError::ModelNotLoaded`] and send `"Error: Model not loaded"` to
/// the sink.
#[derive(Debug)]
pub struct CompletionEngine<B: ModelBackend> {
    generator: Option<Generator<B>>,
    cancellation: Option<CancellationToken>,
}

impl<B: ModelBackend> Default for CompletionEngine<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ModelBackend> CompletionEngine<B> {
    /// An engine with no model attached.
    pub fn new() -> Self {
        Self {
            generator: None,
            cancellation: None,
        }
    }

    /// Attach `backend`, replacing any backend attached before.
    pub fn attach(&mut self, backend: B, config: GenerationConfig) -> Result<(), GenerationError> {
        let mut generator = Generator::new(backend, config)?;
        generator.set_cancellation(self.cancellation.clone());

        if self.generator.replace(generator).is_some() {
            info!("Replaced attached model backend");
        } else {
            info!("Model backend attached");
        }
        Ok(())
    }

    /// Detach and return the current backend, if any.
    pub fn detach(&mut self) -> Option<B> {
        let backend = self.generator.take().map(Generator::into_backend);
        if backend.is_some() {
            debug!("Model backend detached");
        }
        backend
    }

    pub fn is_loaded(&self) -> bool {
        self.generator.is_some()
    }

    /// Cancel running and future completions through `token`.
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        if let Some(generator) = self.generator.as_mut() {
            generator.set_cancellation(token.clone());
        }
        self.cancellation = token;
    }

    pub fn generator(&self) -> Option<&Generator<B>> {
        self.generator.as_ref()
    }

    /// Stream a completion for `prompt` into `sink`.
    pub fn complete<S: EmissionSink + ?Sized>(
        &mut self,
        prompt: &str,
        stop: Option<&str>,
        sink: &mut S,
    ) -> Result<GenerationResponse, GenerationError> {
        match self.generator.as_mut() {
            Some(generator) => generator.generate_stream(prompt, stop, sink),
            None => {
                let error = GenerationError::ModelNotLoaded;
                warn!("Completion requested with no model attached");
                sink.emit(error.error_fragment());
                Err(error)
            }
        }
    }

    /// Run a completion and return the text instead of streaming it.
    pub fn complete_text(
        &mut self,
        prompt: &str,
        stop: Option<&str>,
    ) -> Result<GenerationResponse, GenerationError> {
        let mut discard = String::new();
        self.complete(prompt, stop, &mut discard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordedBackend;

    #[test]
    fn test_complete_without_model() {
        let mut engine: CompletionEngine<RecordedBackend> = CompletionEngine::new();
        let mut fragments: Vec<String> = Vec::new();

        let err = engine.complete("hi", None, &mut fragments).unwrap_err();
        assert_eq!(err, GenerationError::ModelNotLoaded);
        assert_eq!(fragments, vec!["Error: Model not loaded"]);
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_attach_complete_detach() {
        let mut engine = CompletionEngine::new();
        engine
            .attach(
                RecordedBackend::scripted(&["hi", "!"], &[1]),
                GenerationConfig::default(),
            )
            .unwrap();
        assert!(engine.is_loaded());

        let response = engine.complete_text("hi", None).unwrap();
        assert_eq!(response.generated_text, "!");

        let backend = engine.detach().unwrap();
        assert_eq!(backend.cache_clears(), 1);
        assert!(!engine.is_loaded());
        assert!(engine.detach().is_none());
    }

    #[test]
    fn test_cancellation_applies_to_attached_generator() {
        let token = CancellationToken::new();
        let mut engine = CompletionEngine::new();
        engine.set_cancellation(Some(token.clone()));
        engine
            .attach(
                RecordedBackend::scripted(&["a"], &[0, 0, 0]),
                GenerationConfig::default(),
            )
            .unwrap();

        token.cancel();
        let response = engine.complete_text("a", None).unwrap();
        assert_eq!(response.finish_reason, crate::types::FinishReason::Cancelled);
        assert!(response.generated_text.is_empty());
    }
}
