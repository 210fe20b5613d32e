//! # Llama Stream
//!
//! Greedy text generation against llama.cpp models with streaming output and
//! stop-sequence suppression.
//!
//! A [`Generator`] drives one [`ModelBackend`]: it tokenizes the prompt, decodes
//! it, and repeatedly picks the highest-scoring token until the model signals the
//! end, a stop sequence appears, or the token budget runs out. Generated text is
//! delivered to an [`EmissionSink`] as soon as it is known not to belong to a
//! stop sequence. [`CompletionEngine`] wraps a generator in an attach/detach
//! handle for callers that may not have a model yet.

pub mod backend;
pub mod decoder;
pub mod engine;
pub mod generation;
pub mod selector;
pub mod sink;
pub mod stopper;
pub mod types;

// Re-export main types for convenience
pub use backend::{BackendError, Batch, LlamaCppBackend, ModelBackend, RecordedBackend, TokenizeError};
pub use decoder::DecoderDriver;
pub use engine::CompletionEngine;
pub use generation::{GenerationConfig, GenerationError, Generator, BUILTIN_STOP_MARKERS};
pub use selector::GreedySelector;
pub use sink::EmissionSink;
pub use stopper::{FilterOutcome, FlushPolicy, MaxTokensStopper, StopSequenceFilter, StopSet};
pub use types::{FinishReason, GenerationResponse, GenerationState, TokenId};
