//! The ledger facade: issuance, transfers, and corporate actions.
//!
//! Locks, holds, reads, and audits extend [`Ledger`] from their own
//! modules. Every public operation follows the same shape:
//!
//! 1. read the clock once and settle due adjustments
//! 2. check gates, roles, and inputs
//! 3. project the touched amounts and compute new values with checked
//!    arithmetic
//! 4. consult fallible collaborators (allowance, nonce)
//! 5. write the new values stamped with the current epoch
//!
//! A failure in steps 2–4 leaves every true amount unchanged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use partledger_adjust::AdjustmentEngine;
use partledger_types::{
    Address, AdjustmentEpoch, LedgerConfig, Partition, PartledgerError, Result, Role,
    ScheduledAdjustment,
};
use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::collaborators::Collaborators;
use crate::store::LedgerStore;

/// A partitioned security-token ledger.
pub struct Ledger<C: Collaborators> {
    pub(crate) config: LedgerConfig,
    pub(crate) engine: AdjustmentEngine,
    pub(crate) store: LedgerStore,
    pub(crate) collaborators: C,
    pub(crate) clock: Arc<dyn Clock>,
}

/// A validated free-to-free move waiting to be written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FreeMove {
    from: Address,
    to: Address,
    partition: Partition,
    from_free: Decimal,
    to_free: Decimal,
}

impl<C: Collaborators> Ledger<C> {
    /// Create an empty ledger.
    ///
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(config: LedgerConfig, collaborators: C, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            partition_mode = ?config.partition_mode,
            lock_release_policy = ?config.lock_release_policy,
            max_pending_adjustments = config.max_pending_adjustments,
            "Ledger created"
        );
        Ok(Self {
            engine: AdjustmentEngine::from_config(&config),
            store: LedgerStore::new(),
            config,
            collaborators,
            clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &AdjustmentEngine {
        &self.engine
    }

    #[must_use]
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    #[must_use]
    pub fn collaborators(&self) -> &C {
        &self.collaborators
    }

    /// Mutable access to the collaborators, e.g. to flip a gate.
    pub fn collaborators_mut(&mut self) -> &mut C {
        &mut self.collaborators
    }

    // =================================================================
    // Shared steps
    // =================================================================

    /// Read the clock and fold in every adjustment due at that instant.
    pub(crate) fn begin(&mut self) -> DateTime<Utc> {
        let now = self.clock.now();
        self.engine.settle_due(now);
        now
    }

    /// Apply due adjustments without doing anything else.
    ///
    /// Returns how many were applied.
    pub fn settle(&mut self) -> usize {
        let now = self.clock.now();
        self.engine.settle_due(now)
    }

    pub(crate) fn require_role(&self, account: &Address, role: Role) -> Result<()> {
        if self.collaborators.has_role(account, role) {
            Ok(())
        } else {
            Err(PartledgerError::AccountHasNoRole {
                account: *account,
                role,
            })
        }
    }

    /// Corporate actions report a missing role as `Unauthorized`.
    fn require_corporate_actions(&self, caller: &Address) -> Result<()> {
        if self.collaborators.has_role(caller, Role::CorporateActions) {
            return Ok(());
        }
        Err(PartledgerError::Unauthorized {
            reason: format!("{caller} lacks the corporate actions role"),
        })
    }

    pub(crate) fn require_not_paused(&self) -> Result<()> {
        if self.collaborators.is_paused() {
            return Err(PartledgerError::TokenIsPaused);
        }
        Ok(())
    }

    pub(crate) fn require_not_recovered(&self, address: &Address) -> Result<()> {
        if self.collaborators.is_recovered(address) {
            return Err(PartledgerError::WalletRecovered(*address));
        }
        Ok(())
    }

    pub(crate) fn check_partition(&self, partition: Partition) -> Result<()> {
        self.config.check_partition(partition)
    }

    /// On a protected token, `account` needs the participant role for `partition`.
    pub(crate) fn check_protected_access(
        &self,
        account: &Address,
        partition: Partition,
    ) -> Result<()> {
        if self.collaborators.are_partitions_protected()
            && !self
                .collaborators
                .has_role(account, Role::ProtectedPartitionParticipant(partition))
        {
            return Err(PartledgerError::PartitionsAreProtectedAndNoRole {
                account: *account,
                partition,
            });
        }
        Ok(())
    }

    /// Controllable token and the `Controller` role.
    pub(crate) fn require_controller(&self, caller: &Address) -> Result<()> {
        if !self.collaborators.is_controllable() {
            return Err(PartledgerError::TokenIsNotControllable);
        }
        self.require_role(caller, Role::Controller)
    }

    pub(crate) fn require_nonzero(address: &Address) -> Result<()> {
        if address.is_zero() {
            return Err(PartledgerError::ZeroAddressNotAllowed);
        }
        Ok(())
    }

    pub(crate) fn require_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(PartledgerError::ZeroAmountNotAllowed);
        }
        Ok(())
    }

    /// Validate moving `amount` of free balance and compute the results.
    pub(crate) fn plan_move(
        &self,
        from: Address,
        to: Address,
        partition: Partition,
        amount: Decimal,
    ) -> Result<FreeMove> {
        let from_free = self.store.balance(&self.engine, &from, &partition)?.free;
        if from_free < amount {
            return Err(PartledgerError::InsufficientBalance {
                needed: amount,
                available: from_free,
            });
        }
        if from == to {
            return Ok(FreeMove {
                from,
                to,
                partition,
                from_free,
                to_free: from_free,
            });
        }
        let to_free = self.store.balance(&self.engine, &to, &partition)?.free;
        Ok(FreeMove {
            from,
            to,
            partition,
            from_free: sub_amount(from_free, amount, "debiting sender")?,
            to_free: add_amount(to_free, amount, "crediting receiver")?,
        })
    }

    pub(crate) fn commit_move(&mut self, mv: FreeMove) {
        self.store
            .set_free(&self.engine, mv.from, mv.partition, mv.from_free);
        if mv.from != mv.to {
            self.store.set_free(&self.engine, mv.to, mv.partition, mv.to_free);
        }
    }

    // =================================================================
    // Issuance and redemption
    // =================================================================

    /// Mint `amount` into `to`'s free balance.
    ///
    /// # Errors
    /// `AccountHasNoRole` without `Issuer`, `TokenIsPaused`, partition
    /// errors, `ZeroAddressNotAllowed`, `WalletRecovered`,
    /// `ZeroAmountNotAllowed`, `ArithmeticOverflow`.
    pub fn issue(
        &mut self,
        caller: &Address,
        partition: Partition,
        to: &Address,
        amount: Decimal,
    ) -> Result<()> {
        self.begin();
        self.require_role(caller, Role::Issuer)?;
        self.require_not_paused()?;
        self.check_partition(partition)?;
        Self::require_nonzero(to)?;
        self.require_not_recovered(to)?;
        Self::require_positive(amount)?;

        let free = self.store.balance(&self.engine, to, &partition)?.free;
        let supply = self.store.supply(&self.engine, &partition)?;
        let new_free = add_amount(free, amount, "issuing to holder")?;
        let new_supply = add_amount(supply, amount, "issuing supply")?;

        self.store.set_free(&self.engine, *to, partition, new_free);
        self.store.set_supply(&self.engine, partition, new_supply);

        tracing::info!(
            issuer = %caller,
            to = %to,
            partition = %partition,
            amount = %amount,
            supply = %new_supply,
            "Issued"
        );
        Ok(())
    }

    /// Burn `amount` from the caller's own free balance.
    pub fn redeem(&mut self, caller: &Address, partition: Partition, amount: Decimal) -> Result<()> {
        self.begin();
        self.require_not_paused()?;
        self.check_partition(partition)?;
        self.check_protected_access(caller, partition)?;
        self.require_not_recovered(caller)?;
        Self::require_positive(amount)?;

        let free = self.store.balance(&self.engine, caller, &partition)?.free;
        if free < amount {
            return Err(PartledgerError::InsufficientBalance {
                needed: amount,
                available: free,
            });
        }
        let supply = self.store.supply(&self.engine, &partition)?;
        let new_free = sub_amount(free, amount, "redeeming from holder")?;
        let new_supply = sub_amount(supply, amount, "redeeming supply")?;

        self.store.set_free(&self.engine, *caller, partition, new_free);
        self.store.set_supply(&self.engine, partition, new_supply);

        tracing::info!(
            holder = %caller,
            partition = %partition,
            amount = %amount,
            supply = %new_supply,
            "Redeemed"
        );
        Ok(())
    }

    // =================================================================
    // Transfers
    // =================================================================

    /// Move `amount` of the caller's free balance to `to`.
    pub fn transfer(
        &mut self,
        caller: &Address,
        partition: Partition,
        to: &Address,
        amount: Decimal,
    ) -> Result<()> {
        self.begin();
        self.require_not_paused()?;
        self.check_partition(partition)?;
        self.check_protected_access(caller, partition)?;
        Self::require_nonzero(to)?;
        self.require_not_recovered(caller)?;
        self.require_not_recovered(to)?;
        Self::require_positive(amount)?;

        let mv = self.plan_move(*caller, *to, partition, amount)?;
        self.commit_move(mv);

        tracing::debug!(from = %caller, to = %to, partition = %partition, amount = %amount, "Transfer");
        Ok(())
    }

    /// Move `amount` from `from` to `to`, spending the caller's allowance.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        partition: Partition,
        to: &Address,
        amount: Decimal,
    ) -> Result<()> {
        self.begin();
        self.require_not_paused()?;
        self.check_partition(partition)?;
        self.check_protected_access(caller, partition)?;
        Self::require_nonzero(from)?;
        Self::require_nonzero(to)?;
        self.require_not_recovered(caller)?;
        self.require_not_recovered(from)?;
        self.require_not_recovered(to)?;
        Self::require_positive(amount)?;

        let available = self.collaborators.allowance(from, caller);
        if available < amount {
            return Err(PartledgerError::InsufficientAllowance {
                needed: amount,
                available,
            });
        }
        let mv = self.plan_move(*from, *to, partition, amount)?;
        self.collaborators.consume_allowance(from, caller, amount)?;
        self.commit_move(mv);

        tracing::debug!(
            spender = %caller,
            from = %from,
            to = %to,
            partition = %partition,
            amount = %amount,
            "Transfer from allowance"
        );
        Ok(())
    }

    /// Forced transfer by a controller.
    pub fn controller_transfer(
        &mut self,
        caller: &Address,
        from: &Address,
        partition: Partition,
        to: &Address,
        amount: Decimal,
    ) -> Result<()> {
        self.begin();
        self.require_not_paused()?;
        self.require_controller(caller)?;
        self.check_partition(partition)?;
        Self::require_nonzero(from)?;
        Self::require_nonzero(to)?;
        Self::require_positive(amount)?;

        let mv = self.plan_move(*from, *to, partition, amount)?;
        self.commit_move(mv);

        tracing::info!(
            controller = %caller,
            from = %from,
            to = %to,
            partition = %partition,
            amount = %amount,
            "Controller transfer"
        );
        Ok(())
    }

    // =================================================================
    // Corporate actions
    // =================================================================

    /// Multiply every balance by `factor`, effective now.
    ///
    /// # Errors
    /// `Unauthorized` without `CorporateActions`, `TokenIsPaused`,
    /// `InvalidFactor`.
    pub fn adjust_balances(
        &mut self,
        caller: &Address,
        factor: u64,
        decimals: u8,
    ) -> Result<AdjustmentEpoch> {
        let now = self.begin();
        self.require_corporate_actions(caller)?;
        self.require_not_paused()?;
        let epoch = self.engine.apply_immediate(factor, decimals, now)?;
        tracing::info!(caller = %caller, factor, decimals, epoch = epoch.0, "Balances adjusted");
        Ok(epoch)
    }

    /// Queue an adjustment to take effect at `execute_at`.
    ///
    /// # Errors
    /// `Unauthorized` without `CorporateActions`, `TokenIsPaused`,
    /// `InvalidFactor`, `InvalidExecutionTime`, `TooManyPendingAdjustments`.
    pub fn schedule_balance_adjustment(
        &mut self,
        caller: &Address,
        factor: u64,
        decimals: u8,
        execute_at: DateTime<Utc>,
    ) -> Result<ScheduledAdjustment> {
        let now = self.begin();
        self.require_corporate_actions(caller)?;
        self.require_not_paused()?;
        self.engine.schedule(factor, decimals, execute_at, now)
    }
}

pub(crate) fn add_amount(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| PartledgerError::overflow(what))
}

pub(crate) fn sub_amount(a: Decimal, b: Decimal, what: &str) -> Result<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| PartledgerError::overflow(what))
}
