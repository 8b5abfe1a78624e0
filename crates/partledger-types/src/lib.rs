//! # partledger-types
//!
//! Shared types, errors, and configuration for the **partledger**
//! partitioned security-token ledger.
//!
//! This crate is the leaf dependency of the workspace. Every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`Partition`], [`LockId`], [`HoldId`], [`AdjustmentEpoch`], [`Role`]
//! - **Balance model**: [`PartitionBalance`], [`StampedAmount`]
//! - **Adjustment model**: [`ScheduledAdjustment`]
//! - **Lock model**: [`Lock`], [`LockState`]
//! - **Hold model**: [`Hold`], [`HoldState`], [`HoldRequest`], [`HoldIdentifier`], [`ThirdPartyType`], [`HoldThirdParty`]
//! - **Signed authorizations**: [`ProtectedHoldAuthorization`]
//! - **Configuration**: [`LedgerConfig`], [`PartitionMode`], [`LockReleasePolicy`]
//! - **Errors**: [`PartledgerError`] with `PL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod adjustment;
pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod hold;
pub mod ids;
pub mod lock;
pub mod protected;

// Re-export all primary types at crate root for ergonomic imports:
//   use partledger_types::{Address, Partition, Hold, Lock, ...};

pub use adjustment::*;
pub use balance::*;
pub use config::*;
pub use error::*;
pub use hold::*;
pub use ids::*;
pub use lock::*;
pub use protected::*;

// Constants are accessed via `partledger_types::constants::FOO`
// (not re-exported to avoid name collisions).
