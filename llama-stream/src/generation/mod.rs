//! # Text Generation
//!
//! Greedy, token-by-token generation with streaming output. [`Generator`] owns a
//! [`ModelBackend`] and runs one request at a time:
//!
//! 1. The backend's cache is cleared and the prompt tokenized and decoded
//! 2. Each step reads the scores for the last decoded slot, picks the argmax
//!    token, and stops on an end-of-generation token
//! 3. The token's text goes through a [`StopSequenceFilter`], which forwards
//!    safe text to the caller's sink and ends generation on a stop sequence
//! 4. The token is decoded at the next position and the loop repeats until the
//!    iteration budget runs out
//!
//! Failures before the loop starts are returned as [`GenerationError`] after a
//! short error fragment has been sent to the sink. A decode failure inside the
//! loop is the normal way generation ends at the context limit, so it finishes
//! the request with [`FinishReason::DecodeFailed`] instead.
//!
//! ## Usage
//!
//! ```rust
//! use llama_stream::backend::RecordedBackend;
//! use llama_stream::generation::{GenerationConfig, Generator};
//! use llama_stream::types::FinishReason;
//!
//! let backend = RecordedBackend::scripted(&["Hi", " there", "</s>"], &[0, 1, 2]);
//! let mut generator = Generator::new(backend, GenerationConfig::default()).unwrap();
//!
//! let mut fragments: Vec<String> = Vec::new();
//! let response = generator.generate_stream("Hi", None, &mut fragments).unwrap();
//!
//! assert_eq!(fragments.concat(), "Hi there");
//! assert_eq!(
//!     response.finish_reason,
//!     FinishReason::StopSequence("</s>".to_string())
//! );
//! ```

pub mod config;
pub mod error;


pub use config::{GenerationConfig, BUILTIN_STOP_MARKERS};
pub use error::GenerationError;

use crate::backend::ModelBackend;
use crate::decoder::DecoderDriver;
use crate::selector::GreedySelector;
use crate::sink::{EmissionSink, Recording};
use crate::stopper::{FilterOutcome, MaxTokensStopper, StopSequenceFilter, StopSet};
use crate::types::{FinishReason, GenerationResponse, GenerationState};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Runs generation requests against one backend.
///
/// Every method that generates takes `&mut self`, so requests on the same
/// backend never overlap.
#[derive(Debug)]
pub struct Generator<B: ModelBackend> {
    backend: B,
    config: GenerationConfig,
    selector: GreedySelector,
    state: GenerationState,
    cancellation: Option<CancellationToken>,
}

impl<B: ModelBackend> Generator<B> {
    /// Create a generator after validating `config`.
    pub fn new(backend: B, config: GenerationConfig) -> Result<Self, GenerationError> {
        config.validate()?;
        debug!(
            "Creating Generator: max_tokens={}, batch_capacity={}, {} built-in stops",
            config.max_tokens,
            config.batch_capacity,
            config.builtin_stops.len()
        );

        Ok(Self {
            backend,
            config,
            selector: GreedySelector::new(),
            state: GenerationState::Idle,
            cancellation: None,
        })
    }

    /// Stop generating, between steps, once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancellation = token;
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// State of the current or most recent request.
    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Generate a completion for `prompt`, streaming text to `sink`.
    ///
    /// `dynamic_stop` is checked before the configured built-in stop sequences;
    /// an empty string is ignored.
    pub fn generate_stream<S: EmissionSink + ?Sized>(
        &mut self,
        prompt: &str,
        dynamic_stop: Option<&str>,
        sink: &mut S,
    ) -> Result<GenerationResponse, GenerationError> {
        let start_time = Instant::now();
        let mut sink = Recording::new(sink);

        self.state = GenerationState::Idle;
        self.backend.clear_cache();

        let tokens = match self.backend.tokenize(prompt) {
            Ok(tokens) => tokens,
            Err(e) => return Err(self.abort(e.into(), &mut sink)),
        };
        debug!("Tokenized prompt to {} tokens", tokens.len());

        let mut driver = DecoderDriver::new(self.config.batch_capacity);
        if let Err(e) = driver.submit_prompt(&mut self.backend, &tokens) {
            return Err(self.abort(e, &mut sink));
        }
        self.state = GenerationState::PromptSubmitted;

        let policy = self.config.flush_policy();
        if let Some(stop) = dynamic_stop.filter(|stop| policy.may_leak(stop)) {
            warn!(
                "Stop sequence {:?} is longer than retained_tail + 1 ({}); a forced flush may emit part of it",
                stop,
                policy.retained_tail + 1
            );
        }
        let stops = StopSet::new(dynamic_stop, self.config.builtin_stops.as_slice());
        let mut filter = StopSequenceFilter::new(stops, policy);
        let mut budget = MaxTokensStopper::new(self.config.max_tokens as usize);

        self.state = GenerationState::Generating;
        debug!("Prompt processed, starting generation");

        let finish_reason = loop {
            if let Some(reason) = budget.should_stop() {
                break reason;
            }

            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                debug!("Cancellation token triggered");
                break FinishReason::Cancelled;
            }

            let selected = self
                .backend
                .scores(driver.logits_slot())
                .and_then(|scores| self.selector.select(scores));
            let Some(token) = selected else {
                warn!(
                    "No scores for slot {} at position {}, stopping generation",
                    driver.logits_slot(),
                    driver.position()
                );
                break FinishReason::ScoresUnavailable;
            };

            if self.backend.is_end_of_generation(token) {
                debug!("End of generation token {} detected", token);
                break FinishReason::EndOfGeneration;
            }

            // The token still advances the model even when it has no text
            let piece = match self.backend.detokenize(token) {
                Ok(piece) => piece,
                Err(e) => {
                    trace!("Failed to convert token {} to text: {}", token, e);
                    String::new()
                }
            };
            budget.record_token();

            if let FilterOutcome::Stop { matched } = filter.ingest(&piece, &mut sink) {
                break FinishReason::StopSequence(matched);
            }

            if let Err(e) = driver.feed_token(&mut self.backend, token) {
                warn!("{}, stopping generation", e);
                break FinishReason::DecodeFailed;
            }
        };

        filter.finalize(&mut sink);
        self.state = GenerationState::Stopped;

        let generation_time = start_time.elapsed();
        let tokens_generated = u32::try_from(budget.tokens_generated()).unwrap_or(u32::MAX);
        info!(
            tokens_generated,
            prompt_tokens = tokens.len(),
            "Completed generation in {:?} ({})",
            generation_time,
            finish_reason
        );

        Ok(GenerationResponse {
            generated_text: sink.into_text(),
            tokens_generated,
            prompt_tokens: tokens.len(),
            generation_time,
            finish_reason,
        })
    }

    /// Generate a completion for `prompt` and return it whole.
    ///
    /// Runs exactly the same loop and stop-sequence filtering as
    /// [`generate_stream`](Self::generate_stream).
    pub fn generate_text(
        &mut self,
        prompt: &str,
        dynamic_stop: Option<&str>,
    ) -> Result<GenerationResponse, GenerationError> {
        let mut discard = String::new();
        self.generate_stream(prompt, dynamic_stop, &mut discard)
    }

    fn abort<S: EmissionSink + ?Sized>(&mut self, error: GenerationError, sink: &mut S) -> GenerationError {
        warn!(
            category = ?error.category(),
            "Generation failed before the first token: {}",
            error
        );
        sink.emit(error.error_fragment());
        self.state = GenerationState::Stopped;
        error
    }
}
