//! # Model backends
//!
//! The generation loop talks to the model only through [`ModelBackend`]. Two
//! implementations ship with the crate:
//!
//! - [`LlamaCppBackend`] runs real inference through `llama-cpp-2`
//! - [`RecordedBackend`] plays back scores from a JSON fixture, so the loop and
//!   the stop-sequence filter can be exercised without loading a model
//!
//! ```rust
//! use llama_stream::backend::{ModelBackend, RecordedBackend};
//!
//! let backend = RecordedBackend::scripted(&["Hello", " world"], &[0, 1]);
//! assert_eq!(backend.vocab_size(), 3);
//! ```

use crate::types::TokenId;
use thiserror::Error;

pub mod llama;
pub mod recorded;

pub use llama::LlamaCppBackend;
pub use recorded::{RecordedBackend, RecordedSession};

/// Extra token slots reserved on the first tokenization attempt.
const TOKENIZE_HEADROOM: usize = 32;

/// Errors reported by a backend operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("detokenize failed: {0}")]
    Detokenize(String),

    #[error("tokenize failed: {0}")]
    Tokenize(String),

    #[error("batch capacity {capacity} exceeded")]
    BatchFull { capacity: usize },
}

/// Errors from [`ModelBackend::tokenize_into`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// The output buffer was too small; `required` slots are needed.
    #[error("token buffer too small, {required} slots required")]
    InsufficientCapacity { required: usize },

    #[error("{0}")]
    Failed(String),
}

/// One token slot in a [`Batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEntry {
    pub token: TokenId,
    pub position: usize,
    /// Whether the model should produce scores for this slot.
    pub logits: bool,
}

/// Reusable set of token slots submitted to one decode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<BatchEntry>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn add(&mut self, token: TokenId, position: usize, logits: bool) -> Result<(), BackendError> {
        if self.entries.len() >= self.capacity {
            return Err(BackendError::BatchFull {
                capacity: self.capacity,
            });
        }
        self.entries.push(BatchEntry {
            token,
            position,
            logits,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The model/context collaborator driven by the generation loop.
///
/// A backend owns the model's running state (the key-value cache). It is used by
/// exactly one generation call at a time; every method that advances that state
/// takes `&mut self`.
pub trait ModelBackend {
    /// Tokenize `text` into `out`, returning the number of tokens written.
    ///
    /// Returns [`TokenizeError::InsufficientCapacity`] when `out` is too small.
    fn tokenize_into(&self, text: &str, out: &mut [TokenId]) -> Result<usize, TokenizeError>;

    fn vocab_size(&self) -> usize;

    /// Whether `token` signals end of generation.
    fn is_end_of_generation(&self, token: TokenId) -> bool;

    /// Convert a token into the text fragment it stands for.
    fn detokenize(&mut self, token: TokenId) -> Result<String, BackendError>;

    /// Run the model over `batch`, updating the running state.
    fn decode(&mut self, batch: &Batch) -> Result<(), BackendError>;

    /// Scores for batch slot `slot` from the last decode, one per vocabulary entry.
    fn scores(&self, slot: usize) -> Option<&[f32]>;

    /// Forget all cached state from previous calls.
    fn clear_cache(&mut self);

    /// Tokenize `text`, resizing the buffer once if the first attempt is too small.
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, TokenizeError> {
        let mut tokens = vec![0; text.len() + TOKENIZE_HEADROOM];
        let written = match self.tokenize_into(text, &mut tokens) {
            Ok(n) => n,
            Err(TokenizeError::InsufficientCapacity { required }) => {
                tracing::debug!(
                    "Token buffer of {} too small, retrying with {}",
                    tokens.len(),
                    required
                );
                tokens.resize(required, 0);
                self.tokenize_into(text, &mut tokens)?
            }
            Err(e) => return Err(e),
        };
        tokens.truncate(written);
        Ok(tokens)
    }
}
