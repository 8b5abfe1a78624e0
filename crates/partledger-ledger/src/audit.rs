//! Conservation checks.
//!
//! ```text
//! ∀ partition: Σ_holders (free + locked + held) == supply
//! ∀ (holder, partition): locked == Σ active locks, held == Σ active holds
//! ```
//!
//! All sides are projected to the current epoch before comparing, so the
//! checks hold across any number of adjustments. A failure means the
//! ledger itself is broken.

use partledger_types::{Address, Partition, PartledgerError, Result};
use rust_decimal::Decimal;

use crate::collaborators::Collaborators;
use crate::ledger::{Ledger, add_amount};

impl<C: Collaborators> Ledger<C> {
    /// Compare the sum of all balances in `partition` with its supply.
    ///
    /// # Errors
    /// Returns [`PartledgerError::SupplyInvariantViolation`] if they differ.
    pub fn verify_partition_supply(&mut self, partition: Partition) -> Result<()> {
        self.begin();
        let mut actual = Decimal::ZERO;
        for (_, account) in self.store.accounts_in(partition) {
            let total = account.balance(&self.engine)?.total();
            actual = add_amount(actual, total, "summing partition balances")?;
        }
        let expected = self.store.supply(&self.engine, &partition)?;
        if actual != expected {
            tracing::error!(
                partition = %partition,
                actual = %actual,
                expected = %expected,
                "Supply invariant violated"
            );
            return Err(PartledgerError::SupplyInvariantViolation {
                reason: format!("Partition {partition}: balances {actual} != supply {expected}"),
            });
        }
        Ok(())
    }

    /// [`verify_partition_supply`](Self::verify_partition_supply) for every
    /// partition that has ever been issued into.
    pub fn verify_supply(&mut self) -> Result<()> {
        let partitions: Vec<Partition> = self.store.supplied_partitions().copied().collect();
        for partition in partitions {
            self.verify_partition_supply(partition)?;
        }
        Ok(())
    }

    /// Check that the locked and held buckets match their active entries.
    pub fn verify_account(&mut self, holder: &Address, partition: Partition) -> Result<()> {
        self.begin();
        let Some(account) = self.store.account(holder, &partition) else {
            return Ok(());
        };
        let balance = account.balance(&self.engine)?;

        let mut locks = Decimal::ZERO;
        for lock in account.active_locks() {
            locks = add_amount(locks, self.engine.project(&lock.amount)?, "summing locks")?;
        }
        let mut holds = Decimal::ZERO;
        for hold in account.active_holds() {
            holds = add_amount(holds, self.engine.project(&hold.amount)?, "summing holds")?;
        }

        if balance.locked != locks || balance.held != holds {
            return Err(PartledgerError::SupplyInvariantViolation {
                reason: format!(
                    "Account {holder} in {partition}: locked {} vs locks {locks}, \
                     held {} vs holds {holds}",
                    balance.locked, balance.held
                ),
            });
        }
        if balance.free < Decimal::ZERO {
            return Err(PartledgerError::SupplyInvariantViolation {
                reason: format!("Account {holder} in {partition}: negative free {}", balance.free),
            });
        }
        Ok(())
    }
}
