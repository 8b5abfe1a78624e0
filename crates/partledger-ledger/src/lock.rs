//! Lock subsystem: time-boxed encumbrance of a holder's own balance.
//!
//! ```text
//!   lock:     free  ──amount──▶ locked   (new Lock, ACTIVE)
//!   release:  locked ──amount──▶ free    (ACTIVE, or RELEASED when emptied)
//! ```
//!
//! Whether a lock may be released before, after, or regardless of its
//! expiration is decided by [`LockReleasePolicy`].

use chrono::{DateTime, Utc};
use partledger_types::{
    Address, Lock, LockId, LockReleasePolicy, LockState, Partition, PartledgerError, Result,
};
use rust_decimal::Decimal;

use crate::collaborators::Collaborators;
use crate::ledger::{Ledger, add_amount, sub_amount};

impl<C: Collaborators> Ledger<C> {
    /// Lock `amount` of `holder`'s free balance until `expiration`.
    ///
    /// The holder may lock their own balance; anyone else needs the
    /// controller role on a controllable token.
    ///
    /// # Errors
    /// `TokenIsPaused`, partition errors, `ZeroAddressNotAllowed`,
    /// `TokenIsNotControllable`/`AccountHasNoRole` for a foreign lock,
    /// `PartitionsAreProtectedAndNoRole`, `WalletRecovered`,
    /// `ZeroAmountNotAllowed`, `WrongExpirationTimestamp`,
    /// `InsufficientBalance`.
    pub fn lock(
        &mut self,
        caller: &Address,
        partition: Partition,
        amount: Decimal,
        holder: &Address,
        expiration: DateTime<Utc>,
    ) -> Result<LockId> {
        let now = self.begin();
        self.require_not_paused()?;
        self.check_partition(partition)?;
        Self::require_nonzero(holder)?;
        if caller == holder {
            self.check_protected_access(caller, partition)?;
        } else {
            self.require_controller(caller)?;
        }
        self.require_not_recovered(holder)?;
        Self::require_positive(amount)?;
        if expiration <= now {
            return Err(PartledgerError::WrongExpirationTimestamp {
                expiration: expiration.timestamp(),
                now: now.timestamp(),
            });
        }

        let balance = self.store.balance(&self.engine, holder, &partition)?;
        if balance.free < amount {
            return Err(PartledgerError::InsufficientBalance {
                needed: amount,
                available: balance.free,
            });
        }
        let new_free = sub_amount(balance.free, amount, "locking free balance")?;
        let new_locked = add_amount(balance.locked, amount, "growing locked balance")?;

        let stamped_amount = self.engine.stamp(amount);
        let stamped_free = self.engine.stamp(new_free);
        let stamped_locked = self.engine.stamp(new_locked);
        let account = self.store.entry(*holder, partition);
        let id = account.next_lock_id();
        account.free = stamped_free;
        account.locked = stamped_locked;
        account.insert_lock(Lock {
            id,
            partition,
            holder: *holder,
            amount: stamped_amount,
            expiration,
            state: LockState::Active,
            created_at: now,
        });

        tracing::debug!(
            holder = %holder,
            partition = %partition,
            lock_id = %id,
            amount = %amount,
            expiration = %expiration,
            "Lock created"
        );
        Ok(id)
    }

    /// Return `amount` of a lock to the holder's free balance.
    ///
    /// Releasing the whole remaining amount closes the lock; its id then
    /// reports an amount of zero. Repeat releases of a closed lock return
    /// zero and change nothing. Returns the amount still locked.
    ///
    /// # Errors
    /// `TokenIsPaused`, partition errors, `Unauthorized` for callers that
    /// are neither holder nor controller, `WrongLockId` for unknown lock
    /// ids, `LockExpirationNotReached`/`LockExpirationReached`
    /// per the release policy, `ZeroAmountNotAllowed`,
    /// `InsufficientLockedBalance`.
    pub fn release_lock(
        &mut self,
        caller: &Address,
        partition: Partition,
        holder: &Address,
        lock_id: LockId,
        amount: Decimal,
    ) -> Result<Decimal> {
        let now = self.begin();
        self.require_not_paused()?;
        self.check_partition(partition)?;
        if caller != holder {
            self.require_controller(caller).map_err(|_| PartledgerError::Unauthorized {
                reason: format!("{caller} may not release locks of {holder}"),
            })?;
        }

        let account = self
            .store
            .account(holder, &partition)
            .ok_or(PartledgerError::WrongLockId(lock_id))?;
        let lock = account
            .lock(lock_id)
            .ok_or(PartledgerError::WrongLockId(lock_id))?;
        if !lock.is_active() {
            tracing::debug!(
                holder = %holder,
                partition = %partition,
                lock_id = %lock_id,
                "Release of closed lock ignored"
            );
            return Ok(Decimal::ZERO);
        }

        match self.config.lock_release_policy {
            LockReleasePolicy::AfterExpiration if !lock.is_expired(now) => {
                return Err(PartledgerError::LockExpirationNotReached(lock_id));
            }
            LockReleasePolicy::BeforeExpiration if lock.is_expired(now) => {
                return Err(PartledgerError::LockExpirationReached(lock_id));
            }
            _ => {}
        }
        Self::require_positive(amount)?;

        let remaining = self.engine.project(&lock.amount)?;
        if amount > remaining {
            return Err(PartledgerError::InsufficientLockedBalance {
                needed: amount,
                available: remaining,
            });
        }
        let balance = account.balance(&self.engine)?;
        let new_remaining = sub_amount(remaining, amount, "shrinking lock")?;
        let new_locked = sub_amount(balance.locked, amount, "shrinking locked balance")?;
        let new_free = add_amount(balance.free, amount, "releasing lock")?;
        if new_locked < Decimal::ZERO {
            return Err(PartledgerError::SupplyInvariantViolation {
                reason: format!("locked balance of {holder} in {partition} below zero"),
            });
        }

        let stamped_remaining = self.engine.stamp(new_remaining);
        let stamped_locked = self.engine.stamp(new_locked);
        let stamped_free = self.engine.stamp(new_free);
        let account = self.store.entry(*holder, partition);
        account.free = stamped_free;
        account.locked = stamped_locked;
        if let Some(lock) = account.locks.get_mut(&lock_id) {
            lock.amount = stamped_remaining;
            if new_remaining.is_zero() {
                lock.mark_released()?;
            }
        }

        tracing::debug!(
            holder = %holder,
            partition = %partition,
            lock_id = %lock_id,
            amount = %amount,
            remaining = %new_remaining,
            "Lock released"
        );
        Ok(new_remaining)
    }
}
