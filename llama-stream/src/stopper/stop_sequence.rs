use super::StopSet;
use crate::sink::EmissionSink;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// When pending text is released while it still looks like a stop-sequence prefix.
///
/// Both values count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Pending text longer than this is partially flushed.
    pub threshold: usize,
    /// Characters kept back after a partial flush.
    pub retained_tail: usize,
}

impl FlushPolicy {
    /// Whether a threshold flush can release the first characters of `stop`.
    ///
    /// A partial match longer than `retained_tail + 1` characters is cut by a
    /// flush, so part of the stop string reaches the sink before it completes.
    pub fn may_leak(&self, stop: &str) -> bool {
        stop.chars().count() > self.retained_tail + 1
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            threshold: 20,
            retained_tail: 10,
        }
    }
}

/// Result of feeding one piece to the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Continue,
    /// A stop sequence was found; everything before it has been emitted.
    Stop { matched: String },
}

impl FilterOutcome {
    pub fn is_stop(&self) -> bool {
        matches!(self, FilterOutcome::Stop { .. })
    }
}

/// Streaming filter that withholds stop sequences from the output.
///
/// Generated pieces are appended to a pending buffer. Text is forwarded to the
/// sink as soon as it can no longer be part of a stop sequence. A buffer that
/// ends with the beginning of some stop string is held back until it either
/// completes the match, stops looking like one, or grows past the flush
/// threshold, in which case all but the last `retained_tail` characters go out.
///
/// Everything emitted so far is free of complete stop sequences; the pending
/// buffer plus future pieces is the only place one can still appear.
#[derive(Debug)]
pub struct StopSequenceFilter {
    stops: StopSet,
    policy: FlushPolicy,
    pending: String,
}

impl StopSequenceFilter {
    pub fn new(stops: StopSet, policy: FlushPolicy) -> Self {
        debug!(
            "Creating StopSequenceFilter with {} sequences, longest {} chars",
            stops.len(),
            stops.longest()
        );
        Self {
            stops,
            policy,
            pending: String::new(),
        }
    }

    /// Text held back and not yet emitted.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn stops(&self) -> &StopSet {
        &self.stops
    }

    /// Append `piece` and emit whatever is now known to be safe.
    pub fn ingest<S: EmissionSink + ?Sized>(&mut self, piece: &str, sink: &mut S) -> FilterOutcome {
        self.pending.push_str(piece);

        if let Some((cut, matched)) = self.earliest_match() {
            debug!(
                "Stop sequence {:?} found at byte {} of pending text",
                matched, cut
            );
            if cut > 0 {
                sink.emit(&self.pending[..cut]);
            }
            let matched = matched.to_string();
            self.pending.clear();
            return FilterOutcome::Stop { matched };
        }

        if !self.ends_with_partial_stop() {
            if !self.pending.is_empty() {
                sink.emit(&self.pending);
                self.pending.clear();
            }
            return FilterOutcome::Continue;
        }

        let chars = self.pending.chars().count();
        if chars > self.policy.threshold {
            let keep_from = chars.saturating_sub(self.policy.retained_tail);
            let split = self
                .pending
                .char_indices()
                .nth(keep_from)
                .map(|(index, _)| index)
                .unwrap_or(self.pending.len());
            trace!(
                "Pending text of {} chars exceeds threshold, flushing {} bytes",
                chars,
                split
            );
            if split > 0 {
                sink.emit(&self.pending[..split]);
                self.pending.drain(..split);
            }
        } else {
            trace!("Holding {} chars that may start a stop sequence", chars);
        }

        FilterOutcome::Continue
    }

    /// Release or discard what is left at the end of generation.
    ///
    /// Pending text containing a stop sequence is dropped entirely; anything else
    /// is emitted as is. Does nothing when there is no pending text.
    pub fn finalize<S: EmissionSink + ?Sized>(&mut self, sink: &mut S) {
        if self.pending.is_empty() {
            return;
        }

        if self.stops.iter().any(|stop| self.pending.contains(stop)) {
            debug!(
                "Discarding {} pending bytes containing a stop sequence",
                self.pending.len()
            );
        } else {
            sink.emit(&self.pending);
        }
        self.pending.clear();
    }

    /// Start of the earliest stop-sequence occurrence; ties go to the earlier entry.
    fn earliest_match(&self) -> Option<(usize, &str)> {
        let mut best: Option<(usize, &str)> = None;
        for stop in self.stops.iter() {
            if let Some(position) = self.pending.find(stop) {
                match best {
                    Some((best_position, _)) if position >= best_position => {}
                    _ => best = Some((position, stop)),
                }
            }
        }
        best
    }

    /// Whether the pending text ends with a proper prefix of some stop string.
    fn ends_with_partial_stop(&self) -> bool {
        let pending = self.pending.as_bytes();
        self.stops.iter().any(|stop| {
            let stop = stop.as_bytes();
            let longest = (stop.len() - 1).min(pending.len());
            (1..=longest).any(|len| pending.ends_with(&stop[..len]))
        })
    }
}
