//! # Lock: time-boxed self-encumbrance
//!
//! A lock moves part of a holder's free balance in one partition into the
//! locked bucket until it is released back. Locks never move funds to
//! anyone else.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐ partial release ┌────────┐
//!   │ ACTIVE ├────────────────▶│ ACTIVE │
//!   └───┬────┘                 └────────┘
//!       │ full release
//!       ▼
//!   ┌──────────┐
//!   │ RELEASED │  (amount reported as 0, id never reused)
//!   └──────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, LockId, Partition, PartledgerError, StampedAmount};

/// The lifecycle state of a lock. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    /// Funds are locked.
    Active,
    /// All funds have been returned to free balance. Terminal.
    Released,
}

impl LockState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Active, Self::Released))
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Released => write!(f, "RELEASED"),
        }
    }
}

/// A lock on part of a holder's partitioned balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub id: LockId,
    pub partition: Partition,
    pub holder: Address,
    /// Remaining locked amount, stamped with its last rebase epoch.
    pub amount: StampedAmount,
    pub expiration: DateTime<Utc>,
    pub state: LockState,
    pub created_at: DateTime<Utc>,
}

impl Lock {
    /// Whether `now` is at or past the expiration.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == LockState::Active
    }

    /// Transition to RELEASED.
    ///
    /// # Errors
    /// Returns `WrongLockId` if the lock is not ACTIVE.
    pub fn mark_released(&mut self) -> crate::Result<()> {
        if !self.state.can_transition_to(LockState::Released) {
            return Err(PartledgerError::WrongLockId(self.id));
        }
        self.state = LockState::Released;
        Ok(())
    }
}
