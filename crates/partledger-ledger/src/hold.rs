//! Hold subsystem: escrowed encumbrance with execute/release/reclaim.
//!
//! Every creation path funnels into [`Ledger::create_hold_as`], which runs
//! the per-mode authorization from [`AuthorizationMode`] and then the
//! checks shared by all modes.
//!
//! ```text
//!   create:   holder.free ──▶ holder.held          (+ allowance or nonce consumed)
//!   execute:  holder.held ──▶ target.free          (escrow, before expiration)
//!   release:  holder.held ──▶ holder.free          (escrow, before expiration)
//!   reclaim:  holder.held ──▶ holder.free          (anyone, after expiration)
//! ```

use chrono::{DateTime, Utc};
use partledger_types::{
    Address, Hold, HoldId, HoldIdentifier, HoldRequest, HoldState, HoldThirdParty,
    PartledgerError, ProtectedHoldAuthorization, Result, Role, ThirdPartyType,
};
use rust_decimal::Decimal;

use crate::collaborators::Collaborators;
use crate::ledger::{Ledger, add_amount, sub_amount};

/// Who is creating a hold, and with what proof.
#[derive(Debug, Clone, Copy)]
pub enum AuthorizationMode<'a> {
    /// The holder, for their own balance.
    Holder,
    /// A spender drawing on the holder's allowance.
    ApprovedFrom,
    /// An operator approved by the holder.
    Operator,
    /// A controller override.
    Controller,
    /// A protected-partition participant submitting a holder signature.
    Protected {
        authorization: &'a ProtectedHoldAuthorization,
        signature: &'a [u8],
    },
}

impl AuthorizationMode<'_> {
    #[must_use]
    pub fn third_party_type(&self) -> ThirdPartyType {
        match self {
            Self::Holder => ThirdPartyType::None,
            Self::ApprovedFrom => ThirdPartyType::ApprovedFrom,
            Self::Operator => ThirdPartyType::Operator,
            Self::Controller => ThirdPartyType::Controller,
            Self::Protected { .. } => ThirdPartyType::Protected,
        }
    }
}

impl<C: Collaborators> Ledger<C> {
    // =================================================================
    // Creation
    // =================================================================

    /// Hold part of the caller's own balance.
    pub fn create_hold(&mut self, caller: &Address, request: &HoldRequest) -> Result<HoldId> {
        self.create_hold_as(caller, caller, request, AuthorizationMode::Holder, &[])
    }

    /// Hold part of `from`'s balance, consuming the caller's allowance.
    pub fn create_hold_from(
        &mut self,
        caller: &Address,
        from: &Address,
        request: &HoldRequest,
        operator_data: &[u8],
    ) -> Result<HoldId> {
        self.create_hold_as(
            caller,
            from,
            request,
            AuthorizationMode::ApprovedFrom,
            operator_data,
        )
    }

    /// Hold part of `from`'s balance as their operator.
    pub fn operator_create_hold(
        &mut self,
        caller: &Address,
        from: &Address,
        request: &HoldRequest,
        operator_data: &[u8],
    ) -> Result<HoldId> {
        self.create_hold_as(caller, from, request, AuthorizationMode::Operator, operator_data)
    }

    /// Hold part of `from`'s balance as a controller.
    pub fn controller_create_hold(
        &mut self,
        caller: &Address,
        from: &Address,
        request: &HoldRequest,
        operator_data: &[u8],
    ) -> Result<HoldId> {
        self.create_hold_as(caller, from, request, AuthorizationMode::Controller, operator_data)
    }

    /// Hold part of a holder's balance on a protected token using a
    /// signature the holder produced over `authorization.digest()`.
    pub fn protected_create_hold(
        &mut self,
        caller: &Address,
        authorization: &ProtectedHoldAuthorization,
        signature: &[u8],
    ) -> Result<HoldId> {
        self.create_hold_as(
            caller,
            &authorization.holder,
            &authorization.hold,
            AuthorizationMode::Protected {
                authorization,
                signature,
            },
            &[],
        )
    }

    /// Create a hold on `holder`'s balance under `mode`.
    ///
    /// # Errors
    /// `TokenIsPaused`, `ClearingIsActivated`, partition errors, the
    /// mode's authorization errors, `ZeroAmountNotAllowed`,
    /// `ZeroAddressNotAllowed`, `WrongExpirationTimestamp`,
    /// `WalletRecovered`, `InsufficientBalance`.
    pub fn create_hold_as(
        &mut self,
        caller: &Address,
        holder: &Address,
        request: &HoldRequest,
        mode: AuthorizationMode<'_>,
        operator_data: &[u8],
    ) -> Result<HoldId> {
        let now = self.begin();
        let partition = request.partition;
        let amount = request.amount;

        self.require_not_paused()?;
        if self.collaborators.is_clearing_active() {
            return Err(PartledgerError::ClearingIsActivated);
        }
        self.check_partition(partition)?;
        Self::require_nonzero(holder)?;
        self.authorize_hold(caller, holder, request, mode, now)?;

        Self::require_positive(amount)?;
        Self::require_nonzero(&request.escrow)?;
        if request.expiration <= now {
            return Err(PartledgerError::WrongExpirationTimestamp {
                expiration: request.expiration.timestamp(),
                now: now.timestamp(),
            });
        }
        self.require_not_recovered(holder)?;
        let destination = request.fixed_destination();
        if let Some(dest) = &destination {
            self.require_not_recovered(dest)?;
        }

        let balance = self.store.balance(&self.engine, holder, &partition)?;
        if balance.free < amount {
            return Err(PartledgerError::InsufficientBalance {
                needed: amount,
                available: balance.free,
            });
        }
        let new_free = sub_amount(balance.free, amount, "holding free balance")?;
        let new_held = add_amount(balance.held, amount, "growing held balance")?;

        match mode {
            AuthorizationMode::ApprovedFrom => {
                self.collaborators.consume_allowance(holder, caller, amount)?;
            }
            AuthorizationMode::Protected { authorization, .. } => {
                self.collaborators
                    .consume_nonce(holder, authorization.nonce)?;
            }
            _ => {}
        }

        let third_party = match mode.third_party_type() {
            ThirdPartyType::None => HoldThirdParty::holder(),
            kind => HoldThirdParty::new(kind, *caller),
        };
        let allowance_consumed = match mode {
            AuthorizationMode::ApprovedFrom => amount,
            _ => Decimal::ZERO,
        };
        let stamped_amount = self.engine.stamp(amount);
        let stamped_free = self.engine.stamp(new_free);
        let stamped_held = self.engine.stamp(new_held);
        let account = self.store.entry(*holder, partition);
        let id = account.next_hold_id();
        account.free = stamped_free;
        account.held = stamped_held;
        account.insert_hold(Hold {
            id,
            partition,
            holder: *holder,
            amount: stamped_amount,
            escrow: request.escrow,
            destination,
            expiration: request.expiration,
            third_party,
            allowance_consumed,
            data: request.data.clone(),
            operator_data: operator_data.to_vec(),
            state: HoldState::Active,
            created_at: now,
        });

        tracing::debug!(
            holder = %holder,
            partition = %partition,
            hold_id = %id,
            amount = %amount,
            escrow = %request.escrow,
            third_party = %third_party.kind,
            "Hold created"
        );
        Ok(id)
    }

    fn authorize_hold(
        &self,
        caller: &Address,
        holder: &Address,
        request: &HoldRequest,
        mode: AuthorizationMode<'_>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let partition = request.partition;
        match mode {
            AuthorizationMode::Holder => {
                if caller != holder {
                    return Err(PartledgerError::Unauthorized {
                        reason: format!("{caller} may not hold funds of {holder} as holder"),
                    });
                }
                self.check_protected_access(caller, partition)
            }
            AuthorizationMode::ApprovedFrom => {
                self.check_protected_access(caller, partition)?;
                let available = self.collaborators.allowance(holder, caller);
                if available < request.amount {
                    return Err(PartledgerError::InsufficientAllowance {
                        needed: request.amount,
                        available,
                    });
                }
                Ok(())
            }
            AuthorizationMode::Operator => {
                self.check_protected_access(caller, partition)?;
                if !self.collaborators.is_operator_for(caller, holder) {
                    return Err(PartledgerError::Unauthorized {
                        reason: format!("{caller} is not an operator for {holder}"),
                    });
                }
                Ok(())
            }
            AuthorizationMode::Controller => self.require_controller(caller),
            AuthorizationMode::Protected {
                authorization,
                signature,
            } => self.verify_protected(caller, authorization, signature, now),
        }
    }

    fn verify_protected(
        &self,
        caller: &Address,
        authorization: &ProtectedHoldAuthorization,
        signature: &[u8],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let holder = authorization.holder;
        let partition = authorization.hold.partition;
        if !self.collaborators.are_partitions_protected() {
            return Err(PartledgerError::PartitionsAreUnProtected);
        }
        self.require_role(caller, Role::ProtectedPartitionParticipant(partition))?;
        if authorization.is_past_deadline(now) {
            return Err(PartledgerError::SignatureDeadlineExpired {
                deadline: authorization.deadline.timestamp(),
            });
        }
        let expected = self.collaborators.next_nonce(&holder);
        if authorization.nonce != expected {
            tracing::warn!(
                holder = %holder,
                submitter = %caller,
                expected,
                actual = authorization.nonce,
                "Protected hold rejected: nonce mismatch"
            );
            return Err(PartledgerError::WrongNonce {
                holder,
                expected,
                actual: authorization.nonce,
            });
        }
        if !self
            .collaborators
            .verify_signature(&holder, &authorization.digest(), signature)
        {
            tracing::warn!(
                holder = %holder,
                submitter = %caller,
                "Protected hold rejected: bad signature"
            );
            return Err(PartledgerError::WrongSignature(holder));
        }
        Ok(())
    }

    // =================================================================
    // Resolution
    // =================================================================

    fn active_hold(&self, id: &HoldIdentifier) -> Result<&Hold> {
        self.store
            .account(&id.holder, &id.partition)
            .and_then(|acc| acc.hold(id.id))
            .filter(|h| h.is_active())
            .ok_or(PartledgerError::WrongHoldId(id.id))
    }

    /// Store the post-operation hold amount, its charged allowance and the
    /// holder buckets.
    fn write_hold(
        &mut self,
        id: &HoldIdentifier,
        remaining: Decimal,
        allowance_consumed: Decimal,
        held: Decimal,
        free: Option<Decimal>,
        closed_as: HoldState,
    ) -> Result<()> {
        let stamped_remaining = self.engine.stamp(remaining);
        let stamped_held = self.engine.stamp(held);
        let stamped_free = free.map(|f| self.engine.stamp(f));
        let account = self.store.entry(id.holder, id.partition);
        account.held = stamped_held;
        if let Some(free) = stamped_free {
            account.free = free;
        }
        if let Some(hold) = account.holds.get_mut(&id.id) {
            hold.amount = stamped_remaining;
            hold.allowance_consumed = allowance_consumed;
            if remaining.is_zero() {
                hold.finish(closed_as)?;
            }
        }
        Ok(())
    }

    /// Pay `amount` of a hold to `target`. Returns the amount still held.
    ///
    /// # Errors
    /// `TokenIsPaused`, partition errors, `WrongHoldId`, `IsNotEscrow`,
    /// `HoldExpirationReached`, `ZeroAmountNotAllowed`,
    /// `ZeroAddressNotAllowed`, `InvalidDestinationAddress`,
    /// `WalletRecovered`, `InsufficientHoldBalance`.
    pub fn execute_hold(
        &mut self,
        caller: &Address,
        id: HoldIdentifier,
        target: &Address,
        amount: Decimal,
    ) -> Result<Decimal> {
        let now = self.begin();
        self.require_not_paused()?;
        self.check_partition(id.partition)?;
        let hold = self.active_hold(&id)?;
        if hold.escrow != *caller {
            return Err(PartledgerError::IsNotEscrow {
                caller: *caller,
                hold_id: id.id,
            });
        }
        if hold.is_expired(now) {
            return Err(PartledgerError::HoldExpirationReached(id.id));
        }
        Self::require_positive(amount)?;
        Self::require_nonzero(target)?;
        if hold.destination.is_some_and(|d| d != *target) {
            return Err(PartledgerError::InvalidDestinationAddress(*target));
        }
        self.require_not_recovered(target)?;

        let remaining = self.engine.project(&hold.amount)?;
        if amount > remaining {
            return Err(PartledgerError::InsufficientHoldBalance {
                needed: amount,
                available: remaining,
            });
        }
        let spent_allowance = hold.allowance_share(amount, remaining)?;
        let new_allowance =
            sub_amount(hold.allowance_consumed, spent_allowance, "spending allowance")?;
        let balance = self.store.balance(&self.engine, &id.holder, &id.partition)?;
        let new_remaining = sub_amount(remaining, amount, "shrinking hold")?;
        let new_held = sub_amount(balance.held, amount, "shrinking held balance")?;
        let target_is_holder = *target == id.holder;
        let target_free = if target_is_holder {
            balance.free
        } else {
            self.store
                .balance(&self.engine, target, &id.partition)?
                .free
        };
        let new_target_free = add_amount(target_free, amount, "paying hold target")?;

        if target_is_holder {
            self.write_hold(
                &id,
                new_remaining,
                new_allowance,
                new_held,
                Some(new_target_free),
                HoldState::Executed,
            )?;
        } else {
            self.write_hold(
                &id,
                new_remaining,
                new_allowance,
                new_held,
                None,
                HoldState::Executed,
            )?;
            self.store
                .set_free(&self.engine, *target, id.partition, new_target_free);
        }

        tracing::debug!(
            hold = %id,
            escrow = %caller,
            target = %target,
            amount = %amount,
            remaining = %new_remaining,
            "Hold executed"
        );
        Ok(new_remaining)
    }

    /// Return `amount` of a hold to the holder. Returns the amount still held.
    ///
    /// An `ApprovedFrom` hold gives back the fraction of its charged
    /// allowance that `amount` represents of the remaining hold.
    ///
    /// # Errors
    /// `TokenIsPaused`, partition errors, `WrongHoldId`, `IsNotEscrow`,
    /// `HoldExpirationReached`, `ZeroAmountNotAllowed`,
    /// `InsufficientHoldBalance`.
    pub fn release_hold(
        &mut self,
        caller: &Address,
        id: HoldIdentifier,
        amount: Decimal,
    ) -> Result<Decimal> {
        let now = self.begin();
        self.require_not_paused()?;
        self.check_partition(id.partition)?;
        let hold = self.active_hold(&id)?;
        if hold.escrow != *caller {
            return Err(PartledgerError::IsNotEscrow {
                caller: *caller,
                hold_id: id.id,
            });
        }
        if hold.is_expired(now) {
            return Err(PartledgerError::HoldExpirationReached(id.id));
        }
        Self::require_positive(amount)?;

        let remaining = self.engine.project(&hold.amount)?;
        if amount > remaining {
            return Err(PartledgerError::InsufficientHoldBalance {
                needed: amount,
                available: remaining,
            });
        }
        let third_party = hold.third_party;
        let restored = hold.allowance_share(amount, remaining)?;
        let new_allowance =
            sub_amount(hold.allowance_consumed, restored, "restoring allowance")?;
        let new_remaining = sub_amount(remaining, amount, "shrinking hold")?;
        let balance = self.store.balance(&self.engine, &id.holder, &id.partition)?;
        let new_held = sub_amount(balance.held, amount, "shrinking held balance")?;
        let new_free = add_amount(balance.free, amount, "releasing hold")?;

        self.restore_hold_allowance(&id.holder, third_party, restored)?;
        self.write_hold(
            &id,
            new_remaining,
            new_allowance,
            new_held,
            Some(new_free),
            HoldState::Released,
        )?;

        tracing::debug!(
            hold = %id,
            escrow = %caller,
            amount = %amount,
            remaining = %new_remaining,
            "Hold released"
        );
        Ok(new_remaining)
    }

    /// Return the whole remainder of an expired hold to the holder.
    ///
    /// Anyone may reclaim. Returns the amount reclaimed.
    ///
    /// # Errors
    /// `TokenIsPaused`, partition errors, `WrongHoldId`,
    /// `HoldExpirationNotReached`.
    pub fn reclaim_hold(&mut self, caller: &Address, id: HoldIdentifier) -> Result<Decimal> {
        let now = self.begin();
        self.require_not_paused()?;
        self.check_partition(id.partition)?;
        let hold = self.active_hold(&id)?;
        if !hold.is_expired(now) {
            return Err(PartledgerError::HoldExpirationNotReached(id.id));
        }

        let remaining = self.engine.project(&hold.amount)?;
        let third_party = hold.third_party;
        let restored = hold.allowance_consumed;
        let balance = self.store.balance(&self.engine, &id.holder, &id.partition)?;
        let new_held = sub_amount(balance.held, remaining, "shrinking held balance")?;
        let new_free = add_amount(balance.free, remaining, "reclaiming hold")?;

        self.restore_hold_allowance(&id.holder, third_party, restored)?;
        self.write_hold(
            &id,
            Decimal::ZERO,
            Decimal::ZERO,
            new_held,
            Some(new_free),
            HoldState::Reclaimed,
        )?;

        tracing::debug!(hold = %id, caller = %caller, amount = %remaining, "Hold reclaimed");
        Ok(remaining)
    }

    fn restore_hold_allowance(
        &mut self,
        holder: &Address,
        third_party: HoldThirdParty,
        amount: Decimal,
    ) -> Result<()> {
        if third_party.kind != ThirdPartyType::ApprovedFrom {
            return Ok(());
        }
        match third_party.address {
            Some(spender) => self
                .collaborators
                .restore_allowance(holder, &spender, amount),
            None => Ok(()),
        }
    }
}
