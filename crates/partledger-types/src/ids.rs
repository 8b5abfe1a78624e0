//! Identifiers used throughout partledger.
//!
//! Accounts are addressed by a raw 32-byte key (the holder's ed25519 public
//! key), partitions by an opaque 32-byte id. Locks and holds are numbered
//! by a 1-based sequence scoped to one (holder, partition) pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Account identity. Also the ed25519 public key used to verify signed
/// authorizations from this account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The zero address. Never a valid holder, escrow, or recipient.
    pub const ZERO: Self = Self([0u8; 32]);

    #[must_use]
    pub fn from_pubkey(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{}", hex::encode(&self.0[..8]))
    }
}

/// Random addresses for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Address {
    pub fn random() -> Self {
        Self(rand::random::<[u8; 32]>())
    }
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Opaque sub-ledger identifier scoping a holder's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Partition(pub [u8; 32]);

impl Partition {
    /// The reserved partition of a single-partition token.
    pub const DEFAULT: Self = Self(constants::DEFAULT_PARTITION_BYTES);

    /// Deterministic partition id derived from a human-readable label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"partledger:partition:");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            write!(f, "part:default")
        } else {
            write!(f, "part:{}", hex::encode(&self.0[..8]))
        }
    }
}

// ---------------------------------------------------------------------------
// LockId / HoldId
// ---------------------------------------------------------------------------

/// Lock sequence number within one (holder, partition). Starts at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LockId(pub u64);

impl LockId {
    #[must_use]
    pub fn first() -> Self {
        Self(constants::FIRST_SEQUENCE_ID)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock:{}", self.0)
    }
}

/// Hold sequence number within one (holder, partition). Starts at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct HoldId(pub u64);

impl HoldId {
    #[must_use]
    pub fn first() -> Self {
        Self(constants::FIRST_SEQUENCE_ID)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for HoldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hold:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AdjustmentEpoch
// ---------------------------------------------------------------------------

/// Monotonically increasing count of balance adjustments applied so far.
///
/// Epoch 0 is genesis (cumulative factor 1). Every stored amount is stamped
/// with the epoch it was last written in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct AdjustmentEpoch(pub u64);

impl AdjustmentEpoch {
    pub const GENESIS: Self = Self(0);

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AdjustmentEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adj-epoch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Capabilities the ledger asks the role registry about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May mint new balance.
    Issuer,
    /// May apply and schedule balance adjustments.
    CorporateActions,
    /// May override holder authorization for regulatory enforcement.
    Controller,
    /// May submit signed operations on a protected partition.
    ProtectedPartitionParticipant(Partition),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issuer => write!(f, "ISSUER"),
            Self::CorporateActions => write!(f, "CORPORATE_ACTIONS"),
            Self::Controller => write!(f, "CONTROLLER"),
            Self::ProtectedPartitionParticipant(p) => write!(f, "PROTECTED_PARTICIPANT({p})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
