//! Recorded backend for fixture playback

use super::{Batch, BackendError, ModelBackend, TokenizeError};
use crate::types::TokenId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading a recorded session fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse fixture JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Recorded model behavior for one generation call.
///
/// `steps[i]` holds the scores produced by the `i`-th decode call (the prompt
/// decode is call 0), or `null` when the model produced none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedSession {
    /// Text piece for each token id.
    pub vocab: Vec<String>,
    /// Token ids that signal end of generation.
    #[serde(default)]
    pub end_of_generation: Vec<TokenId>,
    /// Token used for prompt text that matches no vocabulary piece.
    #[serde(default)]
    pub unknown_token: TokenId,
    pub steps: Vec<Option<Vec<f32>>>,
    /// Decode call indices that report failure.
    #[serde(default)]
    pub failing_decodes: Vec<usize>,
}

/// Backend that plays back from a recorded fixture
///
/// Every generation call starts by clearing the cache, which rewinds playback
/// to the first step. Each decoded batch is kept so tests can inspect the
/// positions and logits flags the decoder driver produced.
#[derive(Debug, Clone)]
pub struct RecordedBackend {
    session: RecordedSession,
    decode_calls: usize,
    decoded: Vec<Batch>,
    cache_clears: usize,
}

impl RecordedBackend {
    /// Create a new recorded backend from a fixture
    pub fn new(session: RecordedSession) -> Self {
        Self {
            session,
            decode_calls: 0,
            decoded: Vec::new(),
            cache_clears: 0,
        }
    }

    /// Load a recorded session from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let session: RecordedSession = serde_json::from_str(json)?;
        Ok(Self::new(session))
    }

    /// Build a backend whose greedy choices spell out `outputs`.
    ///
    /// `pieces` become token ids `0..pieces.len()`; one extra end-of-generation
    /// token follows them. The prompt decode yields `outputs[0]`, each fed token
    /// yields the next output, and once the outputs run out the model emits the
    /// end-of-generation token.
    pub fn scripted(pieces: &[&str], outputs: &[TokenId]) -> Self {
        let mut vocab: Vec<String> = pieces.iter().map(|p| p.to_string()).collect();
        let eog = vocab.len() as TokenId;
        vocab.push(String::new());

        let vocab_size = vocab.len();
        let steps = outputs
            .iter()
            .chain(std::iter::once(&eog))
            .map(|&token| Some(one_hot(vocab_size, token)))
            .collect();

        Self::new(RecordedSession {
            vocab,
            end_of_generation: vec![eog],
            unknown_token: 0,
            steps,
            failing_decodes: Vec::new(),
        })
    }

    /// Make decode call `call` (0 = prompt decode) fail.
    pub fn with_failing_decode(mut self, call: usize) -> Self {
        self.session.failing_decodes.push(call);
        self
    }

    /// Make decode call `call` produce no scores.
    pub fn with_missing_scores(mut self, call: usize) -> Self {
        if call < self.session.steps.len() {
            self.session.steps[call] = None;
        }
        self
    }

    pub fn session(&self) -> &RecordedSession {
        &self.session
    }

    /// Batches passed to `decode` since the last cache clear.
    pub fn decoded_batches(&self) -> &[Batch] {
        &self.decoded
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears
    }

    /// Greedy longest-match of `text` against the vocabulary.
    fn split(&self, text: &str) -> Vec<TokenId> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let best = self
                .session
                .vocab
                .iter()
                .enumerate()
                .filter(|(_, piece)| !piece.is_empty() && rest.starts_with(piece.as_str()))
                .max_by_key(|(id, piece)| (piece.len(), std::cmp::Reverse(*id)));

            match best {
                Some((id, piece)) => {
                    tokens.push(id as TokenId);
                    rest = &rest[piece.len()..];
                }
                None => {
                    tokens.push(self.session.unknown_token);
                    let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                    rest = &rest[skip..];
                }
            }
        }
        tokens
    }
}

fn one_hot(size: usize, hot: TokenId) -> Vec<f32> {
    let mut scores = vec![0.0; size];
    if let Some(slot) = usize::try_from(hot).ok().and_then(|i| scores.get_mut(i)) {
        *slot = 1.0;
    }
    scores
}

impl ModelBackend for RecordedBackend {
    fn tokenize_into(&self, text: &str, out: &mut [TokenId]) -> Result<usize, TokenizeError> {
        let tokens = self.split(text);
        if tokens.len() > out.len() {
            return Err(TokenizeError::InsufficientCapacity {
                required: tokens.len(),
            });
        }
        out[..tokens.len()].copy_from_slice(&tokens);
        Ok(tokens.len())
    }

    fn vocab_size(&self) -> usize {
        self.session.vocab.len()
    }

    fn is_end_of_generation(&self, token: TokenId) -> bool {
        self.session.end_of_generation.contains(&token)
    }

    fn detokenize(&mut self, token: TokenId) -> Result<String, BackendError> {
        usize::try_from(token)
            .ok()
            .and_then(|i| self.session.vocab.get(i))
            .cloned()
            .ok_or_else(|| BackendError::Detokenize(format!("unknown token {}", token)))
    }

    fn decode(&mut self, batch: &Batch) -> Result<(), BackendError> {
        let call = self.decode_calls;
        self.decode_calls += 1;
        self.decoded.push(batch.clone());

        if self.session.failing_decodes.contains(&call) {
            tracing::debug!("RecordedBackend: failing decode call {}", call);
            return Err(BackendError::Decode(format!(
                "recorded failure at decode call {}",
                call
            )));
        }
        Ok(())
    }

    fn scores(&self, slot: usize) -> Option<&[f32]> {
        let last = self.decoded.last()?;
        if !last.entries().get(slot)?.logits {
            return None;
        }
        let call = self.decode_calls.checked_sub(1)?;
        self.session.steps.get(call)?.as_deref()
    }

    fn clear_cache(&mut self) {
        self.decode_calls = 0;
        self.decoded.clear();
        self.cache_clears += 1;
    }
}
