//! Time-ordered history of running totals
//!
//! The history is kept newest-first. New samples are pushed to the front and
//! expired samples are pruned from the back. Because the accumulator reads its
//! clock and its total inside one critical section, every push carries a
//! timestamp and a total no smaller than the sample before it.

use std::collections::VecDeque;

use tokio::time::{Duration, Instant};

/// The minimum number of samples pruning will leave behind. Two samples are
/// enough for any rate query to have a start and an end.
pub(crate) const MINIMUM_RETAINED: usize = 2;

/// The cumulative total, in sub-units, observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// When the total was observed.
    pub timestamp: Instant,
    /// The cumulative total in sub-units.
    pub total: u64,
}

#[derive(Debug)]
pub(crate) struct History {
    samples: VecDeque<Sample>,
}

impl History {
    /// Create a new `History` holding a single initial sample.
    pub(crate) fn new(initial: Sample) -> Self {
        let mut samples = VecDeque::with_capacity(MINIMUM_RETAINED);
        samples.push_front(initial);
        Self { samples }
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    /// Iterate samples newest to oldest.
    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> {
        self.samples.iter()
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        debug_assert!(
            self.samples
                .front()
                .is_none_or(|newest| newest.timestamp <= sample.timestamp
                    && newest.total <= sample.total),
            "sample pushed out of order"
        );
        self.samples.push_front(sample);
    }

    /// Drop samples strictly older than `now - retention` from the oldest end,
    /// never leaving fewer than [`MINIMUM_RETAINED`] behind. Returns the number
    /// of samples dropped.
    pub(crate) fn prune(&mut self, now: Instant, retention: Duration) -> usize {
        // If the cutoff would precede the clock's epoch nothing can be older
        // than it.
        let Some(cutoff) = now.checked_sub(retention) else {
            return 0;
        };

        let mut pruned = 0;
        while self.samples.len() > MINIMUM_RETAINED {
            match self.samples.back() {
                Some(oldest) if oldest.timestamp < cutoff => {
                    self.samples.pop_back();
                    pruned += 1;
                }
                _ => break,
            }
        }
        pruned
    }

    /// Find the oldest sample whose timestamp is at or after `since`.
    ///
    /// The walk runs newest to oldest and stops at the first sample outside
    /// the window. Returns `None` if even the newest sample is too old.
    pub(crate) fn oldest_since(&self, since: Instant) -> Option<&Sample> {
        self.samples
            .iter()
            .take_while(|sample| sample.timestamp >= since)
            .last()
    }
}
