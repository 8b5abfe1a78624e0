//! Balance tracking types for the partitioned ledger.
//!
//! Every (holder, partition) pair has a `free` balance (spendable), a
//! `locked` balance (sum of active locks) and a `held` balance (sum of
//! active holds). All three are reported in current, fully rebased units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A snapshot of one holder's balance in one partition (or aggregated
/// across partitions).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionBalance {
    /// Spendable balance.
    pub free: Decimal,
    /// Encumbered by active locks.
    pub locked: Decimal,
    /// Encumbered by active holds.
    pub held: Decimal,
}

impl PartitionBalance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            free: Decimal::ZERO,
            locked: Decimal::ZERO,
            held: Decimal::ZERO,
        }
    }

    /// Total balance (free + locked + held).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.free + self.locked + self.held
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.free.is_zero() && self.locked.is_zero() && self.held.is_zero()
    }

    /// Component-wise sum, used to aggregate partitions.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            free: self.free + other.free,
            locked: self.locked + other.locked,
            held: self.held + other.held,
        }
    }
}

impl Default for PartitionBalance {
    fn default() -> Self {
        Self::new()
    }
}
