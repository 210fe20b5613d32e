//! Generation configuration.

use crate::stopper::FlushPolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stop markers applied to every request in addition to the caller's own.
///
/// ChatML turn boundaries, a generic user-role marker and the Llama end-of-text marker.
pub const BUILTIN_STOP_MARKERS: [&str; 4] = ["<|im_end|>", "<|user|>", "<|im_start|>", "</s>"];

/// Configuration for text generation operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate per call.
    pub max_tokens: u32,

    /// Pending text longer than this many characters is partially flushed even
    /// while it looks like the start of a stop sequence.
    pub flush_threshold: usize,

    /// Characters kept back after such a flush.
    pub retained_tail: usize,

    /// Token slots in the decode batch; bounds the prompt length.
    pub batch_capacity: usize,

    /// Stop sequences added to every request.
    pub builtin_stops: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            flush_threshold: 20,
            retained_tail: 10,
            batch_capacity: 4096,
            builtin_stops: BUILTIN_STOP_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GenerationConfig {
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            threshold: self.flush_threshold,
            retained_tail: self.retained_tail,
        }
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }

        if self.max_tokens > 100_000 {
            return Err("max_tokens cannot exceed 100,000".to_string());
        }

        if self.batch_capacity == 0 {
            return Err("batch_capacity must be greater than 0".to_string());
        }

        if self.retained_tail == 0 {
            return Err("retained_tail must be greater than 0".to_string());
        }

        if self.retained_tail >= self.flush_threshold {
            return Err("retained_tail must be smaller than flush_threshold".to_string());
        }

        for stop in &self.builtin_stops {
            if stop.is_empty() {
                return Err("Stop sequences cannot be empty".to_string());
            }
            if self.flush_policy().may_leak(stop) {
                warn!(
                    "Stop sequence {:?} is longer than retained_tail + 1 ({}); a forced flush may emit part of it",
                    stop,
                    self.retained_tail + 1
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_default() {
        let config = GenerationConfig::default();

        assert_eq!(config.max_tokens, 400);
        assert_eq!(config.flush_threshold, 20);
        assert_eq!(config.retained_tail, 10);
        assert_eq!(config.batch_capacity, 4096);
        assert_eq!(
            config.builtin_stops,
            vec!["<|im_end|>", "<|user|>", "<|im_start|>", "</s>"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flush_policy_from_config() {
        let config = GenerationConfig {
            flush_threshold: 32,
            retained_tail: 12,
            ..Default::default()
        };
        assert_eq!(
            config.flush_policy(),
            FlushPolicy {
                threshold: 32,
                retained_tail: 12
            }
        );
    }

    #[test]
    fn test_validation_zero_tokens() {
        let config = GenerationConfig {
            max_tokens: 0,
            ..Default::default()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .contains("max_tokens must be greater than 0"));
    }

    #[test]
    fn test_validation_excessive_tokens() {
        let config = GenerationConfig {
            max_tokens: 200_000,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("cannot exceed 100,000"));
    }

    #[test]
    fn test_validation_tail_not_below_threshold() {
        let config = GenerationConfig {
            flush_threshold: 10,
            retained_tail: 10,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("retained_tail"));
    }

    #[test]
    fn test_validation_empty_builtin_stop() {
        let config = GenerationConfig {
            builtin_stops: vec!["</s>".to_string(), String::new()],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("cannot be empty"));
    }

    #[test]
    fn test_partial_toml_style_deserialization() {
        let config: GenerationConfig = serde_json::from_str(r#"{"max_tokens": 64}"#).unwrap();
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.flush_threshold, 20);
        assert_eq!(config.builtin_stops.len(), 4);
    }
}
