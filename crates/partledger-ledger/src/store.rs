//! Keyed storage for partitioned balances.
//!
//! ```text
//! (holder, partition) → AccountPartition { free, locked, held, locks, holds }
//! partition           → supply
//! holder              → {partitions with an entry}
//! ```
//!
//! The store holds stamped amounts and never interprets them on its own:
//! every read takes the [`AdjustmentEngine`] and projects through it.
//! Authorization and balance checks belong to the ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use partledger_adjust::AdjustmentEngine;
use partledger_types::{
    Address, Hold, HoldId, Lock, LockId, Partition, PartitionBalance, Result, StampedAmount,
};
use rust_decimal::Decimal;

/// One holder's state in one partition.
#[derive(Debug, Clone, Default)]
pub struct AccountPartition {
    pub(crate) free: StampedAmount,
    /// Sum of active lock amounts.
    pub(crate) locked: StampedAmount,
    /// Sum of active hold amounts.
    pub(crate) held: StampedAmount,
    pub(crate) locks: BTreeMap<LockId, Lock>,
    pub(crate) last_lock_id: u64,
    pub(crate) holds: BTreeMap<HoldId, Hold>,
    pub(crate) last_hold_id: u64,
}

impl AccountPartition {
    /// True free/locked/held at the engine's current epoch.
    pub fn balance(&self, engine: &AdjustmentEngine) -> Result<PartitionBalance> {
        Ok(PartitionBalance {
            free: engine.project(&self.free)?,
            locked: engine.project(&self.locked)?,
            held: engine.project(&self.held)?,
        })
    }

    /// Re-stamp all three buckets at the current epoch.
    ///
    /// All projections are computed before anything is written.
    pub fn rebase(&mut self, engine: &AdjustmentEngine) -> Result<PartitionBalance> {
        let balance = self.balance(engine)?;
        self.free = engine.stamp(balance.free);
        self.locked = engine.stamp(balance.locked);
        self.held = engine.stamp(balance.held);
        Ok(balance)
    }

    /// Id the next lock will receive.
    #[must_use]
    pub fn next_lock_id(&self) -> LockId {
        LockId(self.last_lock_id + 1)
    }

    #[must_use]
    pub fn next_hold_id(&self) -> HoldId {
        HoldId(self.last_hold_id + 1)
    }

    pub fn lock(&self, id: LockId) -> Option<&Lock> {
        self.locks.get(&id)
    }

    pub fn hold(&self, id: HoldId) -> Option<&Hold> {
        self.holds.get(&id)
    }

    /// Active locks in creation order.
    pub fn active_locks(&self) -> impl Iterator<Item = &Lock> {
        self.locks.values().filter(|l| l.is_active())
    }

    /// Active holds in creation order.
    pub fn active_holds(&self) -> impl Iterator<Item = &Hold> {
        self.holds.values().filter(|h| h.is_active())
    }

    pub(crate) fn insert_lock(&mut self, lock: Lock) {
        self.last_lock_id = lock.id.0;
        self.locks.insert(lock.id, lock);
    }

    pub(crate) fn insert_hold(&mut self, hold: Hold) {
        self.last_hold_id = hold.id.0;
        self.holds.insert(hold.id, hold);
    }
}

/// All balances, encumbrances, and partition supply of one token.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    accounts: HashMap<(Address, Partition), AccountPartition>,
    holder_partitions: HashMap<Address, BTreeSet<Partition>>,
    supply: BTreeMap<Partition, StampedAmount>,
}

impl LedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, holder: &Address, partition: &Partition) -> Option<&AccountPartition> {
        self.accounts.get(&(*holder, *partition))
    }

    pub(crate) fn account_mut(
        &mut self,
        holder: &Address,
        partition: &Partition,
    ) -> Option<&mut AccountPartition> {
        self.accounts.get_mut(&(*holder, *partition))
    }

    /// Entry for `(holder, partition)`, created empty if absent.
    pub(crate) fn entry(&mut self, holder: Address, partition: Partition) -> &mut AccountPartition {
        self.holder_partitions
            .entry(holder)
            .or_default()
            .insert(partition);
        self.accounts.entry((holder, partition)).or_default()
    }

    /// Projected balance, zero for an unknown account.
    pub fn balance(
        &self,
        engine: &AdjustmentEngine,
        holder: &Address,
        partition: &Partition,
    ) -> Result<PartitionBalance> {
        match self.account(holder, partition) {
            Some(acc) => acc.balance(engine),
            None => Ok(PartitionBalance::new()),
        }
    }

    /// Rebase an existing entry and return its balance.
    pub(crate) fn rebase(
        &mut self,
        engine: &AdjustmentEngine,
        holder: &Address,
        partition: &Partition,
    ) -> Result<PartitionBalance> {
        match self.account_mut(holder, partition) {
            Some(acc) => acc.rebase(engine),
            None => Ok(PartitionBalance::new()),
        }
    }

    /// Overwrite the free bucket.
    pub(crate) fn set_free(
        &mut self,
        engine: &AdjustmentEngine,
        holder: Address,
        partition: Partition,
        free: Decimal,
    ) {
        self.entry(holder, partition).free = engine.stamp(free);
    }

    /// Partitions in which `holder` has ever had an entry.
    #[must_use]
    pub fn partitions_of(&self, holder: &Address) -> Vec<Partition> {
        self.holder_partitions
            .get(holder)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every account entry in `partition`.
    pub fn accounts_in(
        &self,
        partition: Partition,
    ) -> impl Iterator<Item = (&Address, &AccountPartition)> {
        self.accounts
            .iter()
            .filter(move |((_, p), _)| *p == partition)
            .map(|((holder, _), acc)| (holder, acc))
    }

    /// Partitions that have ever had supply.
    pub fn supplied_partitions(&self) -> impl Iterator<Item = &Partition> {
        self.supply.keys()
    }

    /// Projected supply of `partition`.
    pub fn supply(&self, engine: &AdjustmentEngine, partition: &Partition) -> Result<Decimal> {
        match self.supply.get(partition) {
            Some(s) => engine.project(s),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Re-stamp every partition supply at the current epoch.
    pub(crate) fn rebase_supply(&mut self, engine: &AdjustmentEngine) -> Result<()> {
        let refreshed = self
            .supply
            .iter()
            .map(|(p, s)| Ok((*p, engine.project(s)?)))
            .collect::<Result<Vec<_>>>()?;
        for (p, amount) in refreshed {
            self.supply.insert(p, engine.stamp(amount));
        }
        Ok(())
    }

    pub(crate) fn set_supply(
        &mut self,
        engine: &AdjustmentEngine,
        partition: Partition,
        amount: Decimal,
    ) {
        self.supply.insert(partition, engine.stamp(amount));
    }

    /// Number of (holder, partition) entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.accounts.len()
    }
}
