//! Incremental decode driver.

use crate::backend::{Batch, ModelBackend};
use crate::generation::GenerationError;
use crate::types::TokenId;
use tracing::{debug, trace};

/// Feeds tokens to a backend at consecutive positions.
///
/// The prompt occupies positions `0..n`; each generated token is decoded at the
/// next position. The batch is reused across calls.
#[derive(Debug)]
pub struct DecoderDriver {
    batch: Batch,
    position: usize,
}

impl DecoderDriver {
    pub fn new(capacity: usize) -> Self {
        Self {
            batch: Batch::new(capacity),
            position: 0,
        }
    }

    /// Decode the whole prompt in one call, asking for scores on its last token.
    pub fn submit_prompt<B: ModelBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        tokens: &[TokenId],
    ) -> Result<(), GenerationError> {
        if tokens.is_empty() {
            return Err(GenerationError::PromptDecodeFailed(
                "prompt produced no tokens".to_string(),
            ));
        }
        if tokens.len() > self.batch.capacity() {
            return Err(GenerationError::PromptTooLong {
                tokens: tokens.len(),
                capacity: self.batch.capacity(),
            });
        }

        self.batch.clear();
        self.position = 0;
        let last = tokens.len() - 1;
        for (position, &token) in tokens.iter().enumerate() {
            self.batch
                .add(token, position, position == last)
                .map_err(GenerationError::prompt_decoding)?;
        }

        debug!("Decoding prompt of {} tokens", tokens.len());
        backend
            .decode(&self.batch)
            .map_err(GenerationError::prompt_decoding)?;

        self.position = tokens.len();
        Ok(())
    }

    /// Decode one generated token at the next position.
    pub fn feed_token<B: ModelBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        token: TokenId,
    ) -> Result<(), GenerationError> {
        self.batch.clear();
        self.batch
            .add(token, self.position, true)
            .map_err(GenerationError::decoding)?;

        trace!("Decoding token {} at position {}", token, self.position);
        backend.decode(&self.batch).map_err(GenerationError::decoding)?;

        self.position += 1;
        Ok(())
    }

    /// Batch slot whose scores describe the next token.
    pub fn logits_slot(&self) -> usize {
        self.batch.len().saturating_sub(1)
    }

    /// Next position to be filled.
    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordedBackend;

    #[test]
    fn test_prompt_positions_and_logits() {
        let mut backend = RecordedBackend::scripted(&["a", "b"], &[0, 1]);
        let mut driver = DecoderDriver::new(16);

        driver.submit_prompt(&mut backend, &[0, 1, 1]).unwrap();
        assert_eq!(driver.position(), 3);
        assert_eq!(driver.logits_slot(), 2);

        let batch = &backend.decoded_batches()[0];
        let positions: Vec<usize> = batch.entries().iter().map(|e| e.position).collect();
        let logits: Vec<bool> = batch.entries().iter().map(|e| e.logits).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(logits, vec![false, false, true]);
    }

    #[test]
    fn test_feed_advances_position() {
        let mut backend = RecordedBackend::scripted(&["a"], &[0, 0, 0]);
        let mut driver = DecoderDriver::new(8);

        driver.submit_prompt(&mut backend, &[0, 0]).unwrap();
        driver.feed_token(&mut backend, 0).unwrap();
        driver.feed_token(&mut backend, 0).unwrap();

        assert_eq!(driver.position(), 4);
        assert_eq!(driver.logits_slot(), 0);
        let fed: Vec<usize> = backend.decoded_batches()[1..]
            .iter()
            .map(|b| b.entries()[0].position)
            .collect();
        assert_eq!(fed, vec![2, 3]);
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let mut backend = RecordedBackend::scripted(&["a"], &[]);
        let mut driver = DecoderDriver::new(8);
        let err = driver.submit_prompt(&mut backend, &[]).unwrap_err();
        assert!(matches!(err, GenerationError::PromptDecodeFailed(_)));
        assert!(backend.decoded_batches().is_empty());
    }

    #[test]
    fn test_prompt_longer_than_batch() {
        let mut backend = RecordedBackend::scripted(&["a"], &[]);
        let mut driver = DecoderDriver::new(2);
        let err = driver.submit_prompt(&mut backend, &[0, 0, 0]).unwrap_err();
        assert_eq!(
            err,
            GenerationError::PromptTooLong {
                tokens: 3,
                capacity: 2
            }
        );
    }

    #[test]
    fn test_failed_feed_keeps_position() {
        let mut backend = RecordedBackend::scripted(&["a"], &[0, 0]).with_failing_decode(1);
        let mut driver = DecoderDriver::new(8);

        driver.submit_prompt(&mut backend, &[0]).unwrap();
        let err = driver.feed_token(&mut backend, 0).unwrap_err();
        assert!(matches!(err, GenerationError::DecodingFailed(_)));
        assert_eq!(driver.position(), 1);
    }

    #[test]
    fn test_failed_prompt_decode() {
        let mut backend = RecordedBackend::scripted(&["a"], &[0]).with_failing_decode(0);
        let mut driver = DecoderDriver::new(8);
        let err = driver.submit_prompt(&mut backend, &[0]).unwrap_err();
        assert!(matches!(err, GenerationError::PromptDecodeFailed(_)));
    }
}
