//! Error types for the partledger ledger.
//!
//! All errors use the `PL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by category:
//! - 1xx: Authorization errors
//! - 2xx: Validation errors
//! - 3xx: State errors
//! - 4xx: Resource errors
//! - 9xx: General / internal errors
//!
//! Every failure is synchronous and aborts the whole operation; nothing is
//! retried or recovered inside the ledger.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Address, HoldId, LockId, Partition, Role};

/// Coarse classification of a [`PartledgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The caller lacks the right to perform the operation.
    Authorization,
    /// The request itself is malformed.
    Validation,
    /// The ledger or token is not in a state that allows the operation.
    State,
    /// Not enough balance, allowance, or encumbered amount.
    Resource,
    /// Arithmetic, configuration, or serialization failure.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::State => write!(f, "STATE"),
            Self::Resource => write!(f, "RESOURCE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all partledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartledgerError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller is not allowed to act on behalf of the account.
    #[error("PL_ERR_100: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The account does not hold the role the operation requires.
    #[error("PL_ERR_101: Account {account} has no role {role}")]
    AccountHasNoRole { account: Address, role: Role },

    /// Only the escrow of a hold may execute or release it.
    #[error("PL_ERR_102: {caller} is not the escrow of hold {hold_id}")]
    IsNotEscrow { caller: Address, hold_id: HoldId },

    // =================================================================
    // Validation Errors (2xx)
    // =================================================================
    /// A zero address was supplied where a real account is required.
    #[error("PL_ERR_200: Zero address not allowed")]
    ZeroAddressNotAllowed,

    /// The partition id is not acceptable.
    #[error("PL_ERR_201: Invalid partition: {0}")]
    InvalidPartition(Partition),

    /// Only the default partition exists on a single-partition token.
    #[error("PL_ERR_202: Partition {0} not allowed in single-partition mode")]
    PartitionNotAllowedInSinglePartitionMode(Partition),

    /// Expiration must lie strictly in the future.
    #[error("PL_ERR_203: Wrong expiration timestamp: {expiration} is not after {now}")]
    WrongExpirationTimestamp { expiration: i64, now: i64 },

    /// Adjustment factors must be strictly positive.
    #[error("PL_ERR_204: Invalid adjustment factor: {0}")]
    InvalidFactor(u64),

    /// Scheduled adjustments must execute in the future.
    #[error("PL_ERR_205: Invalid execution time: {execution} is not after {now}")]
    InvalidExecutionTime { execution: i64, now: i64 },

    /// The execution target does not match the hold's fixed destination.
    #[error("PL_ERR_206: Invalid destination address: {0}")]
    InvalidDestinationAddress(Address),

    /// Amounts must be strictly positive.
    #[error("PL_ERR_207: Zero amount not allowed")]
    ZeroAmountNotAllowed,

    /// The signed authorization's nonce is not the holder's next nonce.
    #[error("PL_ERR_208: Wrong nonce for {holder}: expected {expected}, got {actual}")]
    WrongNonce {
        holder: Address,
        expected: u64,
        actual: u64,
    },

    /// The signed authorization does not verify against the holder.
    #[error("PL_ERR_209: Signature verification failed for {0}")]
    WrongSignature(Address),

    /// The signed authorization's deadline has passed.
    #[error("PL_ERR_210: Signature deadline expired at {deadline}")]
    SignatureDeadlineExpired { deadline: i64 },

    // =================================================================
    // State Errors (3xx)
    // =================================================================
    /// No hold with this id exists, or it is no longer active.
    #[error("PL_ERR_300: Wrong hold id: {0}")]
    WrongHoldId(HoldId),

    /// No lock with this id exists.
    #[error("PL_ERR_301: Wrong lock id: {0}")]
    WrongLockId(LockId),

    /// The hold's expiration has been reached.
    #[error("PL_ERR_302: Hold {0} expiration reached")]
    HoldExpirationReached(HoldId),

    /// The hold can only be reclaimed after its expiration.
    #[error("PL_ERR_303: Hold {0} expiration not reached")]
    HoldExpirationNotReached(HoldId),

    /// The lock's expiration has been reached.
    #[error("PL_ERR_304: Lock {0} expiration reached")]
    LockExpirationReached(LockId),

    /// The lock can only be released after its expiration.
    #[error("PL_ERR_305: Lock {0} expiration not reached")]
    LockExpirationNotReached(LockId),

    /// The token is paused.
    #[error("PL_ERR_306: Token is paused")]
    TokenIsPaused,

    /// Clearing mode is active; direct holds are disabled.
    #[error("PL_ERR_307: Clearing is activated")]
    ClearingIsActivated,

    /// Controller operations are disabled on this token.
    #[error("PL_ERR_308: Token is not controllable")]
    TokenIsNotControllable,

    /// Partitions are protected and the caller lacks the participant role.
    #[error("PL_ERR_309: Partitions are protected and {account} has no role for {partition}")]
    PartitionsAreProtectedAndNoRole {
        account: Address,
        partition: Partition,
    },

    /// A protected-only path was used on an unprotected token.
    #[error("PL_ERR_310: Partitions are unprotected")]
    PartitionsAreUnProtected,

    /// The account is locked by the wallet-recovery process.
    #[error("PL_ERR_311: Wallet {0} has been recovered")]
    WalletRecovered(Address),

    /// Scheduling would exceed the pending adjustment queue cap.
    #[error("PL_ERR_312: Too many pending adjustments (max {max})")]
    TooManyPendingAdjustments { max: usize },

    // =================================================================
    // Resource Errors (4xx)
    // =================================================================
    /// Not enough free balance.
    #[error("PL_ERR_400: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Not enough amount left on the hold.
    #[error("PL_ERR_401: Insufficient hold balance: need {needed}, have {available}")]
    InsufficientHoldBalance { needed: Decimal, available: Decimal },

    /// Not enough amount left on the lock.
    #[error("PL_ERR_402: Insufficient locked balance: need {needed}, have {available}")]
    InsufficientLockedBalance { needed: Decimal, available: Decimal },

    /// The spender's allowance does not cover the amount.
    #[error("PL_ERR_403: Insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: Decimal, available: Decimal },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// An amount or factor computation left the representable range.
    #[error("PL_ERR_900: Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// An audit found a supply or encumbrance total out of balance.
    #[error("PL_ERR_901: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("PL_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("PL_ERR_903: Serialization error: {0}")]
    Serialization(String),
}

impl PartledgerError {
    /// Classify the error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } | Self::AccountHasNoRole { .. } | Self::IsNotEscrow { .. } => {
                ErrorCategory::Authorization
            }
            Self::ZeroAddressNotAllowed
            | Self::InvalidPartition(_)
            | Self::PartitionNotAllowedInSinglePartitionMode(_)
            | Self::WrongExpirationTimestamp { .. }
            | Self::InvalidFactor(_)
            | Self::InvalidExecutionTime { .. }
            | Self::InvalidDestinationAddress(_)
            | Self::ZeroAmountNotAllowed
            | Self::WrongNonce { .. }
            | Self::WrongSignature(_)
            | Self::SignatureDeadlineExpired { .. } => ErrorCategory::Validation,
            Self::WrongHoldId(_)
            | Self::WrongLockId(_)
            | Self::HoldExpirationReached(_)
            | Self::HoldExpirationNotReached(_)
            | Self::LockExpirationReached(_)
            | Self::LockExpirationNotReached(_)
            | Self::TokenIsPaused
            | Self::ClearingIsActivated
            | Self::TokenIsNotControllable
            | Self::PartitionsAreProtectedAndNoRole { .. }
            | Self::PartitionsAreUnProtected
            | Self::WalletRecovered(_)
            | Self::TooManyPendingAdjustments { .. } => ErrorCategory::State,
            Self::InsufficientBalance { .. }
            | Self::InsufficientHoldBalance { .. }
            | Self::InsufficientLockedBalance { .. }
            | Self::InsufficientAllowance { .. } => ErrorCategory::Resource,
            Self::ArithmeticOverflow(_)
            | Self::SupplyInvariantViolation { .. }
            | Self::Configuration(_)
            | Self::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// Shorthand for an overflow raised while computing `what`.
    #[must_use]
    pub fn overflow(what: impl Into<String>) -> Self {
        Self::ArithmeticOverflow(what.into())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PartledgerError>;

impl From<serde_json::Error> for PartledgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
