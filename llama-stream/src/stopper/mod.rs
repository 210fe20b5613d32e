//! # Generation Stoppers Module
//!
//! Conditions that end a generation call, evaluated once per generated token:
//!
//! - **Stop sequences**: [`StopSequenceFilter`] holds back text that might be the
//!   start of a stop string and cuts the output at the first full match
//! - **Maximum token limiting**: [`MaxTokensStopper`] bounds the number of loop
//!   iterations
//!
//! End-of-generation tokens are recognized by the backend itself
//! ([`ModelBackend::is_end_of_generation`](crate::backend::ModelBackend::is_end_of_generation)).
//!
//! ```rust
//! use llama_stream::stopper::{FilterOutcome, FlushPolicy, StopSequenceFilter, StopSet};
//!
//! let stops = StopSet::new(Some("###"), &["</s>"]);
//! let mut filter = StopSequenceFilter::new(stops, FlushPolicy::default());
//! let mut out = String::new();
//!
//! assert_eq!(filter.ingest("Hello", &mut out), FilterOutcome::Continue);
//! assert!(!filter.ingest(" there##", &mut out).is_stop());
//! assert!(filter.ingest("# more", &mut out).is_stop());
//! assert_eq!(out, "Hello there");
//! ```

use tracing::{debug, warn};

pub mod max_tokens;
pub mod stop_sequence;

pub use max_tokens::MaxTokensStopper;
pub use stop_sequence::{FilterOutcome, FlushPolicy, StopSequenceFilter};

/// Ordered, immutable set of stop strings for one generation call.
///
/// Entries are never empty. Order matters only for breaking ties between matches
/// that start at the same position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopSet {
    sequences: Vec<String>,
}

impl StopSet {
    /// Build the set from the caller's stop string followed by `builtins`.
    ///
    /// Empty strings are skipped.
    pub fn new<S: AsRef<str>>(dynamic: Option<&str>, builtins: &[S]) -> Self {
        let mut sequences = Vec::with_capacity(builtins.len() + 1);

        match dynamic {
            Some("") => warn!("Ignoring empty stop sequence"),
            Some(stop) => sequences.push(stop.to_string()),
            None => {}
        }

        for stop in builtins.iter().map(AsRef::as_ref) {
            if stop.is_empty() {
                debug!("Skipping empty built-in stop sequence");
                continue;
            }
            sequences.push(stop.to_string());
        }

        Self { sequences }
    }

    pub fn from_sequences<I, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sequences: sequences
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sequences.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Length in characters of the longest stop string.
    pub fn longest(&self) -> usize {
        self.sequences
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::BUILTIN_STOP_MARKERS;

    #[test]
    fn test_dynamic_stop_comes_first() {
        let stops = StopSet::new(Some("User:"), &BUILTIN_STOP_MARKERS);
        let all: Vec<&str> = stops.iter().collect();
        assert_eq!(
            all,
            vec!["User:", "<|im_end|>", "<|user|>", "<|im_start|>", "</s>"]
        );
    }

    #[test]
    fn test_empty_strings_skipped() {
        let stops = StopSet::new(Some(""), &["", "</s>"]);
        assert_eq!(stops.iter().collect::<Vec<_>>(), vec!["</s>"]);

        let stops = StopSet::from_sequences(["", "x"]);
        assert_eq!(stops.len(), 1);
    }

    #[test]
    fn test_duplicates_kept() {
        let stops = StopSet::new(Some("</s>"), &["</s>"]);
        assert_eq!(stops.len(), 2);
    }

    #[test]
    fn test_no_stops() {
        let stops = StopSet::new::<&str>(None, &[]);
        assert!(stops.is_empty());
        assert_eq!(stops.longest(), 0);
    }

    #[test]
    fn test_longest_counts_chars() {
        let stops = StopSet::from_sequences(["ab", "ééé"]);
        assert_eq!(stops.longest(), 3);
    }
}
