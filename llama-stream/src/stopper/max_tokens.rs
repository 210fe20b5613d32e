use crate::types::FinishReason;
use tracing::{debug, info, warn};

/// Stopper that limits generation to a maximum number of tokens.
///
/// Counts loop iterations that produced a token. Once the count reaches the
/// limit, [`should_stop`](Self::should_stop) reports [`FinishReason::MaxTokens`].
///
/// # Examples
///
/// ```rust
/// use llama_stream::stopper::MaxTokensStopper;
///
/// let mut stopper = MaxTokensStopper::new(2);
/// assert!(stopper.should_stop().is_none());
/// stopper.record_token();
/// stopper.record_token();
/// assert!(stopper.should_stop().is_some());
/// ```
#[derive(Debug)]
pub struct MaxTokensStopper {
    max_tokens: usize,
    tokens_generated: usize,
}

impl MaxTokensStopper {
    /// Create a new max tokens stopper with the specified limit.
    ///
    /// A limit of 0 stops before the first token.
    pub fn new(max_tokens: usize) -> Self {
        debug!("Creating MaxTokensStopper with limit: {} tokens", max_tokens);

        if max_tokens == 0 {
            warn!("MaxTokensStopper created with 0 token limit - will stop immediately");
        } else if max_tokens > 50000 {
            warn!(
                "MaxTokensStopper created with very high token limit ({}), consider if this is intentional",
                max_tokens
            );
        }

        Self {
            max_tokens,
            tokens_generated: 0,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn tokens_generated(&self) -> usize {
        self.tokens_generated
    }

    /// Tokens left before the limit is reached.
    pub fn tokens_remaining(&self) -> usize {
        self.max_tokens.saturating_sub(self.tokens_generated)
    }

    pub fn is_limit_reached(&self) -> bool {
        self.tokens_generated >= self.max_tokens
    }

    /// Count one generated token.
    pub fn record_token(&mut self) {
        self.tokens_generated = self.tokens_generated.saturating_add(1);

        if self.tokens_generated % 100 == 0 && !self.is_limit_reached() {
            debug!(
                "Generation progress: {}/{} tokens ({}% complete)",
                self.tokens_generated,
                self.max_tokens,
                self.tokens_generated * 100 / self.max_tokens
            );
        }
    }

    /// `Some(FinishReason::MaxTokens)` once the limit has been reached.
    pub fn should_stop(&self) -> Option<FinishReason> {
        if self.is_limit_reached() {
            info!(
                max_tokens = self.max_tokens,
                tokens_generated = self.tokens_generated,
                "MaxTokensStopper triggered - stopping generation"
            );
            Some(FinishReason::MaxTokens)
        } else {
            None
        }
    }
}
