//! Shared generation types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Token id as used by llama.cpp.
pub type TokenId = i32;

/// Reason why text generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FinishReason {
    /// The model produced an end-of-generation token.
    EndOfGeneration,
    /// A configured stop sequence appeared in the generated text.
    StopSequence(String),
    /// The iteration budget ran out.
    MaxTokens,
    /// A decode step after the prompt failed, usually at the context limit.
    DecodeFailed,
    /// The score source returned nothing for the current step.
    ScoresUnavailable,
    /// The caller cancelled generation between steps.
    Cancelled,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::EndOfGeneration => write!(f, "End of sequence token detected"),
            FinishReason::StopSequence(stop) => write!(f, "Stop sequence detected: {:?}", stop),
            FinishReason::MaxTokens => write!(f, "Maximum tokens reached"),
            FinishReason::DecodeFailed => write!(f, "Decode failed"),
            FinishReason::ScoresUnavailable => write!(f, "No scores available"),
            FinishReason::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

/// Lifecycle of a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    Idle,
    PromptSubmitted,
    Generating,
    Stopped,
}

/// Response from a completed generation call.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Concatenation of every fragment delivered to the sink.
    pub generated_text: String,
    /// Tokens selected and accepted, excluding the end-of-generation token.
    pub tokens_generated: u32,
    /// Length of the tokenized prompt.
    pub prompt_tokens: usize,
    pub generation_time: Duration,
    pub finish_reason: FinishReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_serialization() {
        let json = serde_json::to_string(&FinishReason::StopSequence("</s>".to_string())).unwrap();
        assert_eq!(json, r#"{"reason":"stop_sequence","detail":"</s>"}"#);

        let parsed: FinishReason = serde_json::from_str(r#"{"reason":"max_tokens"}"#).unwrap();
        assert_eq!(parsed, FinishReason::MaxTokens);
    }

    #[test]
    fn test_finish_reason_display() {
        assert_eq!(FinishReason::MaxTokens.to_string(), "Maximum tokens reached");
        assert!(FinishReason::StopSequence("<|im_end|>".to_string())
            .to_string()
            .contains("<|im_end|>"));
    }
}
