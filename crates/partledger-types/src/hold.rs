//! # Hold: third-party escrowed encumbrance
//!
//! A hold moves part of a holder's free balance into the held bucket under
//! the control of an **escrow**. Before expiration the escrow may execute
//! it (pay a target) or release it (return funds). After expiration anyone
//! may reclaim the remainder back to the holder.
//!
//! ## State Machine
//!
//! ```text
//!                 partial execute / partial release
//!               ┌─────────────────────────────────┐
//!               ▼                                 │
//!           ┌────────┐  full execute   ┌──────────┐
//!           │ ACTIVE ├────────────────▶│ EXECUTED │
//!           └─┬────┬─┘                 └──────────┘
//!  full release│    │reclaim (expired)
//!             ▼    ▼
//!   ┌──────────┐  ┌───────────┐
//!   │ RELEASED │  │ RECLAIMED │
//!   └──────────┘  └───────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Address, HoldId, Partition, PartledgerError, StampedAmount};

/// The lifecycle state of a hold. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoldState {
    /// Funds are held and can be executed, released, or reclaimed.
    Active,
    /// The escrow paid out the whole remaining amount.
    Executed,
    /// The escrow returned the whole remaining amount to the holder.
    Released,
    /// The remaining amount was returned after expiration.
    Reclaimed,
}

impl HoldState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Executed | Self::Released | Self::Reclaimed)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for HoldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Released => write!(f, "RELEASED"),
            Self::Reclaimed => write!(f, "RECLAIMED"),
        }
    }
}

/// Who created the hold on the holder's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThirdPartyType {
    /// The holder created it.
    None,
    /// A spender with an allowance from the holder.
    ApprovedFrom,
    /// An operator of the holder.
    Operator,
    /// A controller override.
    Controller,
    /// A participant submitting a holder-signed authorization.
    Protected,
}

impl std::fmt::Display for ThirdPartyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::ApprovedFrom => write!(f, "APPROVED_FROM"),
            Self::Operator => write!(f, "OPERATOR"),
            Self::Controller => write!(f, "CONTROLLER"),
            Self::Protected => write!(f, "PROTECTED"),
        }
    }
}

/// Creator tag of a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldThirdParty {
    pub kind: ThirdPartyType,
    /// Creator identity; `None` iff `kind == ThirdPartyType::None`.
    pub address: Option<Address>,
}

impl HoldThirdParty {
    #[must_use]
    pub fn holder() -> Self {
        Self {
            kind: ThirdPartyType::None,
            address: None,
        }
    }

    #[must_use]
    pub fn new(kind: ThirdPartyType, address: Address) -> Self {
        Self {
            kind,
            address: Some(address),
        }
    }
}

/// Locates a hold: holds are numbered per (holder, partition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoldIdentifier {
    pub partition: Partition,
    pub holder: Address,
    pub id: HoldId,
}

impl HoldIdentifier {
    #[must_use]
    pub fn new(partition: Partition, holder: Address, id: HoldId) -> Self {
        Self {
            partition,
            holder,
            id,
        }
    }
}

impl std::fmt::Display for HoldIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.holder, self.partition, self.id)
    }
}

/// The caller-supplied fields of a new hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRequest {
    pub partition: Partition,
    pub amount: Decimal,
    pub escrow: Address,
    /// Fixed payout target. `None` (or the zero address) lets the escrow choose.
    pub destination: Option<Address>,
    pub expiration: DateTime<Utc>,
    /// Opaque audit payload.
    pub data: Vec<u8>,
}

impl HoldRequest {
    /// Destination with the zero address folded into `None`.
    #[must_use]
    pub fn fixed_destination(&self) -> Option<Address> {
        self.destination.filter(|d| !d.is_zero())
    }
}

/// A hold on part of a holder's partitioned balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: HoldId,
    pub partition: Partition,
    /// Source of the held funds.
    pub holder: Address,
    /// Remaining held amount, stamped with its last rebase epoch.
    pub amount: StampedAmount,
    pub escrow: Address,
    pub destination: Option<Address>,
    pub expiration: DateTime<Utc>,
    pub third_party: HoldThirdParty,
    /// Allowance still charged to this hold, in allowance units. These do
    /// not rebase. Zero unless the hold was created from an allowance.
    #[serde(default)]
    pub allowance_consumed: Decimal,
    pub data: Vec<u8>,
    pub operator_data: Vec<u8>,
    pub state: HoldState,
    pub created_at: DateTime<Utc>,
}

impl Hold {
    /// Whether `now` is at or past the expiration.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == HoldState::Active
    }

    /// Part of the charged allowance that belongs to `amount` out of the
    /// `remaining` held amount. Settling the whole remainder returns all of it.
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the proportion cannot be computed.
    pub fn allowance_share(&self, amount: Decimal, remaining: Decimal) -> crate::Result<Decimal> {
        if self.allowance_consumed.is_zero() || amount.is_zero() {
            return Ok(Decimal::ZERO);
        }
        if amount >= remaining {
            return Ok(self.allowance_consumed);
        }
        self.allowance_consumed
            .checked_mul(amount)
            .and_then(|scaled| scaled.checked_div(remaining))
            .ok_or_else(|| {
                PartledgerError::overflow(format!("allowance share of hold {}", self.id))
            })
    }

    /// Transition to a terminal state.
    ///
    /// # Errors
    /// Returns `WrongHoldId` if the hold is not ACTIVE.
    pub fn finish(&mut self, target: HoldState) -> crate::Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(PartledgerError::WrongHoldId(self.id));
        }
        self.state = target;
        Ok(())
    }
}
