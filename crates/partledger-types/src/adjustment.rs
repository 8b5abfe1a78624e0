//! Balance adjustment types.
//!
//! A balance adjustment (stock split, consolidation, ...) multiplies every
//! balance in the token by an integer `factor`. Instead of rewriting every
//! account, each stored quantity is a [`StampedAmount`]: the raw value plus
//! the [`AdjustmentEpoch`] it was last written in. The true amount is
//! recovered on touch by multiplying with every factor applied since.
//!
//! ```text
//! true_amount = stored_amount × Π factor[stamp+1 ..= now]
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AdjustmentEpoch, PartledgerError, Result};

/// A quantity tagged with the adjustment epoch it was last rebased to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedAmount {
    /// Value expressed in units of `stamp`.
    pub amount: Decimal,
    /// Epoch in effect when `amount` was last written.
    pub stamp: AdjustmentEpoch,
}

impl StampedAmount {
    #[must_use]
    pub fn new(amount: Decimal, stamp: AdjustmentEpoch) -> Self {
        Self { amount, stamp }
    }

    #[must_use]
    pub fn zero(stamp: AdjustmentEpoch) -> Self {
        Self::new(Decimal::ZERO, stamp)
    }

    /// Value of this amount after multiplying by `ratio`, without mutating.
    pub fn scaled(&self, ratio: Decimal) -> Result<Decimal> {
        if ratio == Decimal::ONE {
            return Ok(self.amount);
        }
        self.amount
            .checked_mul(ratio)
            .ok_or_else(|| PartledgerError::overflow(format!("rescaling {} by {ratio}", self.amount)))
    }

    /// Multiply by `ratio` and move the stamp to `epoch`.
    ///
    /// The stamp never moves backwards.
    pub fn rescale(&mut self, ratio: Decimal, epoch: AdjustmentEpoch) -> Result<Decimal> {
        debug_assert!(epoch >= self.stamp, "stamp must not decrease");
        self.amount = self.scaled(ratio)?;
        self.stamp = epoch;
        Ok(self.amount)
    }
}

/// A corporate action queued for a future instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAdjustment {
    /// Submission order; breaks ties between equal timestamps (FIFO).
    pub sequence: u64,
    /// Applied the first time any operation observes `now >= execute_at`.
    pub execute_at: DateTime<Utc>,
    /// Raw integer multiplier.
    pub factor: u64,
    /// Decimal-place shift published alongside the factor.
    pub decimals: u8,
}

impl ScheduledAdjustment {
    /// Whether this adjustment should have been applied by `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.execute_at <= now
    }

    /// Queue ordering key: timestamp first, then submission order.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.execute_at, self.sequence)
    }
}

/// Record of one applied adjustment, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    /// Epoch this adjustment opened.
    pub epoch: AdjustmentEpoch,
    pub factor: u64,
    pub decimals: u8,
    /// When it took effect (scheduled time, or the instant of an immediate apply).
    pub effective_at: DateTime<Utc>,
}
