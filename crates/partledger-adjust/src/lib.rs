//! # partledger-adjust
//!
//! **Balance adjustment engine for partledger.**
//!
//! Corporate actions (splits, consolidations) multiply every balance in the
//! token by an integer factor. Rewriting every account would be O(n), so
//! the engine only keeps:
//!
//! - **The applied history**: one factor per adjustment epoch
//! - **The schedule**: adjustments queued for a future instant, ordered by
//!   execution time and FIFO among ties
//!
//! Every stored quantity carries the epoch it was last written in. On the
//! next touch it is multiplied by the product of the factors applied since
//! that epoch (rebase-on-touch), so all untouched amounts stay correct
//! without ever being visited.
//!
//! The engine is pure: it never reads a clock and never self-triggers.
//! Callers pass `now`, and due adjustments are folded in lazily by
//! [`AdjustmentEngine::settle_due`].

pub mod engine;
pub mod queue;

pub use engine::AdjustmentEngine;
pub use queue::AdjustmentQueue;
