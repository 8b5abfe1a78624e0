//! Ordered queue of scheduled adjustments.
//!
//! Entries are kept sorted by `(execute_at, sequence)`. Because `sequence`
//! grows with every submission, two adjustments scheduled for the same
//! instant come out in the order they were submitted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use partledger_types::{PartledgerError, Result, ScheduledAdjustment, constants};

/// Bounded, time-ordered queue of future adjustments.
#[derive(Debug, Clone)]
pub struct AdjustmentQueue {
    /// Sorted by `order_key()`; front is the next to execute.
    entries: VecDeque<ScheduledAdjustment>,
    /// Sequence number handed to the next submission.
    next_sequence: u64,
    /// Maximum number of entries before `push` is rejected.
    max_pending: usize,
}

impl AdjustmentQueue {
    /// Create a queue with the default cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(constants::DEFAULT_MAX_PENDING_ADJUSTMENTS)
    }

    /// Create a queue with a custom cap.
    #[must_use]
    pub fn with_capacity(max_pending: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 0,
            max_pending,
        }
    }

    /// Insert a new adjustment in execution order.
    ///
    /// # Errors
    /// Returns `TooManyPendingAdjustments` if the queue is at capacity.
    pub fn push(
        &mut self,
        execute_at: DateTime<Utc>,
        factor: u64,
        decimals: u8,
    ) -> Result<ScheduledAdjustment> {
        if self.entries.len() >= self.max_pending {
            return Err(PartledgerError::TooManyPendingAdjustments {
                max: self.max_pending,
            });
        }
        let entry = ScheduledAdjustment {
            sequence: self.next_sequence,
            execute_at,
            factor,
            decimals,
        };
        self.next_sequence += 1;

        let key = entry.order_key();
        let pos = self.entries.partition_point(|e| e.order_key() < key);
        self.entries.insert(pos, entry);
        Ok(entry)
    }

    /// Remove and return the front entry if it is due at `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ScheduledAdjustment> {
        if self.entries.front().is_some_and(|e| e.is_due(now)) {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Whether anything is due at `now`.
    #[must_use]
    pub fn has_due(&self, now: DateTime<Utc>) -> bool {
        self.entries.front().is_some_and(|e| e.is_due(now))
    }

    /// Next execution instant, if any.
    #[must_use]
    pub fn next_execution(&self) -> Option<DateTime<Utc>> {
        self.entries.front().map(|e| e.execute_at)
    }

    /// Pending entries in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledAdjustment> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }
}

impl Default for AdjustmentQueue {
    fn default() -> Self {
        Self::new()
    }
}
