//! llama.cpp backend using `llama-cpp-2`.

use super::{Batch, BackendError, ModelBackend, TokenizeError};
use crate::types::TokenId;
use encoding_rs::{Decoder, UTF_8};
use llama_cpp_2::{
    context::LlamaContext,
    llama_batch::LlamaBatch,
    model::{AddBos, LlamaModel, Special},
    token::LlamaToken,
};
use llama_loader::{LoadedModel, ModelConfig, ModelError};
use tracing::{debug, trace};

/// Backend that runs inference on a loaded llama.cpp model.
///
/// Owns one context (and therefore one key-value cache) borrowed from the
/// [`LoadedModel`], and one `LlamaBatch` that is cleared and refilled on every
/// decode. Token pieces are decoded with a streaming UTF-8 decoder so a
/// character whose bytes span several tokens comes out whole once its last byte
/// arrives, instead of as replacement characters.
pub struct LlamaCppBackend<'m> {
    model: &'m LlamaModel,
    context: LlamaContext<'m>,
    batch: LlamaBatch<'m>,
    batch_slots: usize,
    utf8: Decoder,
    /// Logits flags of the last decoded batch, by slot.
    logits_slots: Vec<bool>,
    vocab_size: usize,
}

impl<'m> LlamaCppBackend<'m> {
    /// Create a backend with a fresh context for `loaded`.
    ///
    /// The batch buffer starts with one slot per context position.
    pub fn new(loaded: &'m LoadedModel, config: &ModelConfig) -> Result<Self, ModelError> {
        let context = loaded.create_context(config)?;
        let vocab_size = loaded.model.n_vocab().max(0) as usize;
        let batch_slots = (config.n_ctx as usize).max(1);
        debug!(
            "LlamaCppBackend ready, vocab size {}, {} batch slots",
            vocab_size, batch_slots
        );

        Ok(Self {
            model: &loaded.model,
            context,
            batch: LlamaBatch::new(batch_slots, 1),
            batch_slots,
            utf8: UTF_8.new_decoder(),
            logits_slots: Vec::new(),
            vocab_size,
        })
    }

    /// Reallocate the batch buffer with `capacity` slots, usually the
    /// generation `batch_capacity`.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_slots = capacity.max(1);
        self.batch = LlamaBatch::new(self.batch_slots, 1);
        self
    }

    /// Slots in the reusable batch buffer.
    pub fn batch_slots(&self) -> usize {
        self.batch_slots
    }
}

impl ModelBackend for LlamaCppBackend<'_> {
    fn tokenize_into(&self, text: &str, out: &mut [TokenId]) -> Result<usize, TokenizeError> {
        let tokens = self
            .model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| TokenizeError::Failed(e.to_string()))?;

        if tokens.len() > out.len() {
            return Err(TokenizeError::InsufficientCapacity {
                required: tokens.len(),
            });
        }

        for (slot, token) in out.iter_mut().zip(&tokens) {
            *slot = token.0;
        }
        Ok(tokens.len())
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn is_end_of_generation(&self, token: TokenId) -> bool {
        self.model.is_eog_token(LlamaToken(token))
    }

    fn detokenize(&mut self, token: TokenId) -> Result<String, BackendError> {
        let bytes = self
            .model
            .token_to_bytes(LlamaToken(token), Special::Tokenize)
            .map_err(|e| BackendError::Detokenize(e.to_string()))?;

        let capacity = self
            .utf8
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        let mut piece = String::with_capacity(capacity);
        let (_, _, replaced) = self.utf8.decode_to_string(&bytes, &mut piece, false);
        if replaced {
            trace!("Token {} contained invalid UTF-8", token);
        }
        Ok(piece)
    }

    fn decode(&mut self, batch: &Batch) -> Result<(), BackendError> {
        if batch.len() > self.batch_slots {
            debug!(
                "Growing batch buffer from {} to {} slots",
                self.batch_slots,
                batch.len()
            );
            self.batch_slots = batch.len();
            self.batch = LlamaBatch::new(self.batch_slots, 1);
        }

        self.batch.clear();
        for entry in batch.entries() {
            self.batch
                .add(
                    LlamaToken(entry.token),
                    entry.position as i32,
                    &[0],
                    entry.logits,
                )
                .map_err(|e| BackendError::Decode(format!("batch add failed: {}", e)))?;
        }

        self.logits_slots.clear();
        self.context
            .decode(&mut self.batch)
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        self.logits_slots
            .extend(batch.entries().iter().map(|entry| entry.logits));
        Ok(())
    }

    fn scores(&self, slot: usize) -> Option<&[f32]> {
        if !self.logits_slots.get(slot).copied().unwrap_or(false) {
            return None;
        }
        let logits = self.context.get_logits_ith(slot as i32);
        if logits.is_empty() {
            None
        } else {
            Some(logits)
        }
    }

    fn clear_cache(&mut self) {
        self.context.clear_kv_cache();
        self.utf8 = UTF_8.new_decoder();
        self.logits_slots.clear();
    }
}
