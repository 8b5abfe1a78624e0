//! # partledger-ledger
//!
//! The partitioned ledger: per-(holder, partition) balances split into
//! free, locked, and held buckets, plus the lock and hold encumbrances
//! that move value between them.
//!
//! - [`Ledger`]: the single-writer facade. Issuance, transfers, corporate
//!   actions, locks, holds, and every read go through it.
//! - [`LedgerStore`]: keyed storage of [`AccountPartition`] entries and
//!   partition supply. Knows nothing about authorization.
//! - [`Collaborators`]: the external capabilities the ledger consults
//!   (roles, token gates, allowances, operators, signatures, recovery,
//!   nonces). [`InMemoryCollaborators`] implements all of them.
//! - [`Clock`]: injected time source; [`ManualClock`] for tests.
//!
//! ## Operation shape
//!
//! ```text
//!  clock.now() ─▶ settle_due ─▶ validate (projections only) ─▶ commit
//!                                     │
//!                                     └─ any failure: nothing written
//! ```
//!
//! Every stored amount is a `StampedAmount`. Reads project it through the
//! adjustment engine; writes store the new value stamped with the current
//! epoch. Settling due adjustments happens before validation and is never
//! rolled back, since it does not change any true amount.

pub mod audit;
pub mod clock;
pub mod collaborators;
pub mod hold;
pub mod ledger;
pub mod lock;
pub mod query;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    AllowanceBook, Collaborators, Ed25519Verifier, InMemoryCollaborators, NonceRegistry,
    OperatorRegistry, RoleRegistry, SignatureVerifier, TokenGates, WalletRecovery,
};
pub use hold::AuthorizationMode;
pub use ledger::Ledger;
pub use store::{AccountPartition, LedgerStore};
