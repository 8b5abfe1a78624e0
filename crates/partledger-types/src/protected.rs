//! Signed authorization for holds on protected partitions.
//!
//! When partitions are protected, a participant may create a hold on a
//! holder's behalf only by presenting a structured message signed by that
//! holder. The message binds every hold field plus a deadline and the
//! holder's next nonce, so a captured authorization cannot be replayed or
//! altered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, HoldRequest, constants};

/// A holder-signed request to place a hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHoldAuthorization {
    /// The signer, whose funds will be held.
    pub holder: Address,
    pub hold: HoldRequest,
    /// The authorization is void after this instant.
    pub deadline: DateTime<Utc>,
    /// Must equal the holder's next nonce when submitted.
    pub nonce: u64,
}

impl ProtectedHoldAuthorization {
    /// Canonical message bytes.
    ///
    /// Format: `holder || partition || escrow || destination_or_zero ||
    /// amount(str) || expiration(i64 le) || len(data) || data || deadline(i64 le) || nonce(u64 le)`
    ///
    /// Timestamps are encoded as microseconds since the Unix epoch.
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let destination = self.hold.fixed_destination().unwrap_or(Address::ZERO);
        let mut payload = Vec::with_capacity(256 + self.hold.data.len());
        payload.extend_from_slice(self.holder.as_bytes());
        payload.extend_from_slice(self.hold.partition.as_bytes());
        payload.extend_from_slice(self.hold.escrow.as_bytes());
        payload.extend_from_slice(destination.as_bytes());
        payload.extend_from_slice(self.hold.amount.normalize().to_string().as_bytes());
        payload.extend_from_slice(&self.hold.expiration.timestamp_micros().to_le_bytes());
        payload.extend_from_slice(&(self.hold.data.len() as u64).to_le_bytes());
        payload.extend_from_slice(&self.hold.data);
        payload.extend_from_slice(&self.deadline.timestamp_micros().to_le_bytes());
        payload.extend_from_slice(&self.nonce.to_le_bytes());
        payload
    }

    /// Domain-separated SHA-256 digest of the payload. This is what gets signed.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::PROTECTED_HOLD_DOMAIN);
        hasher.update(self.signing_payload());
        hasher.finalize().into()
    }

    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}
