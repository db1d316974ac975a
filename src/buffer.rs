//! In-memory window of samples for one named series.
//! Append-only within a cycle; eviction drops the aged prefix.

use chrono::{Duration, NaiveDateTime};

use crate::sample::Sample;

/// Timestamp-ordered sequence of samples. Ordering holds by construction:
/// the only producer appends "now", and the sequence is never re-sorted.
#[derive(Debug, Default)]
pub struct WindowBuffer {
    samples: Vec<Sample>,
}

impl WindowBuffer {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Appends the newest sample. The caller contract is monotonic
    /// timestamps; a regression means the host clock was stepped backward,
    /// which we surface but do not treat as fatal (the sample is still the
    /// most recent observation).
    pub fn append(&mut self, sample: Sample) {
        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                log::warn!(
                    "sample timestamp {} is behind the last recorded {} (clock stepped back?)",
                    sample.timestamp,
                    last.timestamp
                );
            }
        }
        self.samples.push(sample);
    }

    /// Removes every sample strictly older than `window_seconds` relative to
    /// `now`. Age exactly equal to the window is retained. Returns the number
    /// of evicted samples.
    ///
    /// Ordering makes this a prefix scan: the first young-enough sample ends
    /// the search.
    pub fn evict_older_than(&mut self, window_seconds: u64, now: NaiveDateTime) -> usize {
        let window = Duration::seconds(window_seconds as i64);
        let keep_from = self
            .samples
            .iter()
            .position(|s| now.signed_duration_since(s.timestamp) <= window)
            .unwrap_or(self.samples.len());
        self.samples.drain(..keep_from);
        keep_from
    }
}
