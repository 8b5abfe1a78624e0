//! Query facade: balances, encumbrance enumerations, adjustment state.
//!
//! Reads take `&mut self` because each one settles due adjustments and
//! re-stamps the entries it touches. Neither changes a true amount, so
//! two identical reads with no time passing in between return the same
//! result.

use partledger_types::{
    Address, AdjustmentEpoch, Hold, HoldId, HoldIdentifier, HoldThirdParty, Lock, LockId,
    Partition, PartitionBalance, PartledgerError, Result, ScheduledAdjustment,
};
use rust_decimal::Decimal;

use crate::collaborators::Collaborators;
use crate::ledger::{Ledger, add_amount};

impl<C: Collaborators> Ledger<C> {
    /// Settle and rebase one entry, returning its balance.
    fn touch(&mut self, holder: &Address, partition: &Partition) -> Result<PartitionBalance> {
        self.begin();
        self.store.rebase(&self.engine, holder, partition)
    }

    // =================================================================
    // Balances
    // =================================================================

    /// Free, locked, and held of `holder` in `partition`.
    pub fn partition_balance(
        &mut self,
        holder: &Address,
        partition: Partition,
    ) -> Result<PartitionBalance> {
        self.touch(holder, &partition)
    }

    /// Free, locked, and held of `holder` summed over all partitions.
    pub fn account_balance(&mut self, holder: &Address) -> Result<PartitionBalance> {
        self.begin();
        let mut total = PartitionBalance::new();
        for partition in self.store.partitions_of(holder) {
            let b = self.store.rebase(&self.engine, holder, &partition)?;
            total = PartitionBalance {
                free: add_amount(total.free, b.free, "aggregating free")?,
                locked: add_amount(total.locked, b.locked, "aggregating locked")?,
                held: add_amount(total.held, b.held, "aggregating held")?,
            };
        }
        Ok(total)
    }

    /// Total balance of `holder` in `partition`.
    pub fn balance_of_by_partition(
        &mut self,
        partition: Partition,
        holder: &Address,
    ) -> Result<Decimal> {
        let b = self.touch(holder, &partition)?;
        total_of(&b)
    }

    /// Total balance of `holder` across partitions.
    pub fn balance_of(&mut self, holder: &Address) -> Result<Decimal> {
        let b = self.account_balance(holder)?;
        total_of(&b)
    }

    /// Partitions in which `holder` has an entry.
    #[must_use]
    pub fn partitions_of(&self, holder: &Address) -> Vec<Partition> {
        self.store.partitions_of(holder)
    }

    pub fn total_supply_by_partition(&mut self, partition: Partition) -> Result<Decimal> {
        self.begin();
        self.store.rebase_supply(&self.engine)?;
        self.store.supply(&self.engine, &partition)
    }

    /// Sum of every partition's supply.
    pub fn total_supply(&mut self) -> Result<Decimal> {
        self.begin();
        self.store.rebase_supply(&self.engine)?;
        let partitions: Vec<Partition> = self.store.supplied_partitions().copied().collect();
        partitions.iter().try_fold(Decimal::ZERO, |acc, p| {
            add_amount(acc, self.store.supply(&self.engine, p)?, "aggregating supply")
        })
    }

    // =================================================================
    // Locks
    // =================================================================

    pub fn locked_amount_for_by_partition(
        &mut self,
        partition: Partition,
        holder: &Address,
    ) -> Result<Decimal> {
        Ok(self.touch(holder, &partition)?.locked)
    }

    pub fn locked_amount_for(&mut self, holder: &Address) -> Result<Decimal> {
        Ok(self.account_balance(holder)?.locked)
    }

    /// Number of active locks.
    pub fn lock_count_for_by_partition(&mut self, partition: Partition, holder: &Address) -> usize {
        self.begin();
        self.store
            .account(holder, &partition)
            .map_or(0, |acc| acc.active_locks().count())
    }

    /// Ids of active locks at positions `[start, end)` in creation order.
    pub fn locks_id_for_by_partition(
        &mut self,
        partition: Partition,
        holder: &Address,
        start: usize,
        end: usize,
    ) -> Vec<LockId> {
        self.begin();
        self.store
            .account(holder, &partition)
            .map(|acc| {
                acc.active_locks()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .map(|l| l.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The rebased lock record. Released locks report an amount of zero.
    ///
    /// # Errors
    /// `WrongLockId` if the id was never issued.
    pub fn lock_for_by_partition(
        &mut self,
        partition: Partition,
        holder: &Address,
        lock_id: LockId,
    ) -> Result<Lock> {
        self.begin();
        let lock = self
            .store
            .account_mut(holder, &partition)
            .and_then(|acc| acc.locks.get_mut(&lock_id))
            .ok_or(PartledgerError::WrongLockId(lock_id))?;
        self.engine.refresh(&mut lock.amount)?;
        Ok(lock.clone())
    }

    // =================================================================
    // Holds
    // =================================================================

    pub fn held_amount_for_by_partition(
        &mut self,
        partition: Partition,
        holder: &Address,
    ) -> Result<Decimal> {
        Ok(self.touch(holder, &partition)?.held)
    }

    pub fn held_amount_for(&mut self, holder: &Address) -> Result<Decimal> {
        Ok(self.account_balance(holder)?.held)
    }

    /// Number of active holds.
    pub fn hold_count_for_by_partition(&mut self, partition: Partition, holder: &Address) -> usize {
        self.begin();
        self.store
            .account(holder, &partition)
            .map_or(0, |acc| acc.active_holds().count())
    }

    /// Ids of active holds at positions `[start, end)` in creation order.
    pub fn holds_id_for_by_partition(
        &mut self,
        partition: Partition,
        holder: &Address,
        start: usize,
        end: usize,
    ) -> Vec<HoldId> {
        self.begin();
        self.store
            .account(holder, &partition)
            .map(|acc| {
                acc.active_holds()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .map(|h| h.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The rebased hold record, including finished holds.
    ///
    /// # Errors
    /// `WrongHoldId` if the id was never issued.
    pub fn hold_for_by_partition(&mut self, id: HoldIdentifier) -> Result<Hold> {
        self.begin();
        let hold = self
            .store
            .account_mut(&id.holder, &id.partition)
            .and_then(|acc| acc.holds.get_mut(&id.id))
            .ok_or(PartledgerError::WrongHoldId(id.id))?;
        self.engine.refresh(&mut hold.amount)?;
        Ok(hold.clone())
    }

    /// Creator tag of a hold.
    pub fn hold_third_party(&mut self, id: HoldIdentifier) -> Result<HoldThirdParty> {
        self.begin();
        self.store
            .account(&id.holder, &id.partition)
            .and_then(|acc| acc.hold(id.id))
            .map(|h| h.third_party)
            .ok_or(PartledgerError::WrongHoldId(id.id))
    }

    // =================================================================
    // Adjustment state
    // =================================================================

    pub fn current_adjustment_epoch(&mut self) -> AdjustmentEpoch {
        self.begin();
        self.engine.current_epoch()
    }

    /// Product of every applied factor.
    pub fn cumulative_factor(&mut self) -> Result<Decimal> {
        self.begin();
        self.engine.cumulative_factor()
    }

    pub fn adjusted_decimals(&mut self) -> u32 {
        self.begin();
        self.engine.adjusted_decimals()
    }

    /// Cumulative factor shifted by the applied `decimals`, for display.
    pub fn normalized_multiplier(&mut self) -> Result<Decimal> {
        self.begin();
        self.engine.normalized_multiplier()
    }

    /// Adjustments still waiting for their execution time.
    pub fn pending_adjustments(&mut self) -> Vec<ScheduledAdjustment> {
        self.begin();
        self.engine.pending()
    }
}

fn total_of(b: &PartitionBalance) -> Result<Decimal> {
    add_amount(b.free, b.locked, "summing balance")
        .and_then(|s| add_amount(s, b.held, "summing balance"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use partledger_types::{HoldRequest, LedgerConfig, LockReleasePolicy, Role};

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::collaborators::InMemoryCollaborators;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    struct Fixture {
        ledger: Ledger<InMemoryCollaborators>,
        clock: ManualClock,
        issuer: Address,
        corp: Address,
    }

    fn setup() -> Fixture {
        let issuer = Address::random();
        let corp = Address::random();
        let mut collab = InMemoryCollaborators::new();
        collab.grant_role(issuer, Role::Issuer);
        collab.grant_role(corp, Role::CorporateActions);
        let clock = ManualClock::default();
        let config = LedgerConfig {
            lock_release_policy: LockReleasePolicy::Anytime,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::new(config, collab, Arc::new(clock.clone())).unwrap();
        Fixture {
            ledger,
            clock,
            issuer,
            corp,
        }
    }

    #[test]
    fn aggregates_across_partitions() {
        let mut f = setup();
        let alice = Address::random();
        let (p1, p2) = (Partition::from_label("P1"), Partition::from_label("P2"));
        f.ledger.issue(&f.issuer, p1, &alice, dec(100)).unwrap();
        f.ledger.issue(&f.issuer, p2, &alice, dec(50)).unwrap();
        let exp = f.clock.now() + Duration::seconds(10);
        f.ledger.lock(&alice, p1, dec(10), &alice, exp).unwrap();

        assert_eq!(f.ledger.balance_of(&alice).unwrap(), dec(150));
        assert_eq!(f.ledger.balance_of_by_partition(p1, &alice).unwrap(), dec(100));
        assert_eq!(f.ledger.locked_amount_for(&alice).unwrap(), dec(10));
        assert_eq!(f.ledger.total_supply().unwrap(), dec(150));
        assert_eq!(f.ledger.total_supply_by_partition(p2).unwrap(), dec(50));
        assert_eq!(f.ledger.partitions_of(&alice), {
            let mut v = vec![p1, p2];
            v.sort();
            v
        });
    }

    #[test]
    fn unknown_holder_reads_zero() {
        let mut f = setup();
        let nobody = Address::random();
        assert_eq!(f.ledger.balance_of(&nobody).unwrap(), Decimal::ZERO);
        assert_eq!(f.ledger.lock_count_for_by_partition(Partition::DEFAULT, &nobody), 0);
        assert!(f.ledger.partitions_of(&nobody).is_empty());
    }

    #[test]
    fn lock_enumeration_is_windowed_and_skips_released() {
        let mut f = setup();
        let alice = Address::random();
        let p = Partition::DEFAULT;
        f.ledger.issue(&f.issuer, p, &alice, dec(100)).unwrap();
        let exp = f.clock.now() + Duration::seconds(10);
        let ids: Vec<LockId> = (0..4)
            .map(|_| f.ledger.lock(&alice, p, dec(1), &alice, exp).unwrap())
            .collect();
        f.ledger.release_lock(&alice, p, &alice, ids[1], dec(1)).unwrap();

        assert_eq!(f.ledger.lock_count_for_by_partition(p, &alice), 3);
        assert_eq!(
            f.ledger.locks_id_for_by_partition(p, &alice, 0, 2),
            vec![LockId(1), LockId(3)]
        );
        assert_eq!(
            f.ledger.locks_id_for_by_partition(p, &alice, 1, 10),
            vec![LockId(3), LockId(4)]
        );
        assert!(f.ledger.locks_id_for_by_partition(p, &alice, 5, 2).is_empty());

        let released = f.ledger.lock_for_by_partition(p, &alice, ids[1]).unwrap();
        assert_eq!(released.amount.amount, Decimal::ZERO);
        assert!(matches!(
            f.ledger.lock_for_by_partition(p, &alice, LockId(99)),
            Err(PartledgerError::WrongLockId(_))
        ));
    }

    #[test]
    fn lock_record_is_rebased_on_read() {
        let mut f = setup();
        let alice = Address::random();
        let p = Partition::DEFAULT;
        let corp = f.corp;
        f.ledger.issue(&f.issuer, p, &alice, dec(100)).unwrap();
        let exp = f.clock.now() + Duration::seconds(10);
        let id = f.ledger.lock(&alice, p, dec(7), &alice, exp).unwrap();
        f.ledger.adjust_balances(&corp, 3, 0).unwrap();

        let lock = f.ledger.lock_for_by_partition(p, &alice, id).unwrap();
        assert_eq!(lock.amount.amount, dec(21));
        assert_eq!(lock.amount.stamp, AdjustmentEpoch(1));
        assert_eq!(f.ledger.locked_amount_for_by_partition(p, &alice).unwrap(), dec(21));
    }

    #[test]
    fn hold_reads() {
        let mut f = setup();
        let alice = Address::random();
        let escrow = Address::random();
        let p = Partition::DEFAULT;
        f.ledger.issue(&f.issuer, p, &alice, dec(100)).unwrap();
        let req = HoldRequest {
            partition: p,
            amount: dec(25),
            escrow,
            destination: None,
            expiration: f.clock.now() + Duration::seconds(10),
            data: vec![],
        };
        let id = f.ledger.create_hold(&alice, &req).unwrap();
        let hid = HoldIdentifier::new(p, alice, id);

        assert_eq!(f.ledger.held_amount_for(&alice).unwrap(), dec(25));
        assert_eq!(f.ledger.held_amount_for_by_partition(p, &alice).unwrap(), dec(25));
        assert_eq!(f.ledger.hold_count_for_by_partition(p, &alice), 1);
        assert_eq!(f.ledger.holds_id_for_by_partition(p, &alice, 0, 1), vec![id]);
        assert_eq!(f.ledger.hold_for_by_partition(hid).unwrap().escrow, escrow);
        assert_eq!(f.ledger.hold_third_party(hid).unwrap(), HoldThirdParty::holder());

        let missing = HoldIdentifier::new(p, alice, HoldId(2));
        assert!(matches!(
            f.ledger.hold_third_party(missing),
            Err(PartledgerError::WrongHoldId(HoldId(2)))
        ));
    }

    #[test]
    fn reads_are_idempotent() {
        let mut f = setup();
        let alice = Address::random();
        let p = Partition::DEFAULT;
        let corp = f.corp;
        f.ledger.issue(&f.issuer, p, &alice, dec(10)).unwrap();
        let at = f.clock.now() + Duration::seconds(5);
        f.ledger.schedule_balance_adjustment(&corp, 4, 0, at).unwrap();
        f.clock.advance(Duration::seconds(5));

        let first = f.ledger.partition_balance(&alice, p).unwrap();
        let second = f.ledger.partition_balance(&alice, p).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.free, dec(40));
        assert_eq!(f.ledger.current_adjustment_epoch(), AdjustmentEpoch(1));
        assert!(f.ledger.pending_adjustments().is_empty());
    }

    #[test]
    fn adjustment_accessors() {
        let mut f = setup();
        let corp = f.corp;
        f.ledger.adjust_balances(&corp, 10, 1).unwrap();
        assert_eq!(f.ledger.cumulative_factor().unwrap(), dec(10));
        assert_eq!(f.ledger.adjusted_decimals(), 7);
        assert_eq!(f.ledger.normalized_multiplier().unwrap(), Decimal::ONE);
    }
}
