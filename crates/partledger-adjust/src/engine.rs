//! The adjustment engine: cumulative factor, schedule, and rebasing.
//!
//! ## Numeric model
//!
//! Factors are raw integer multiplicands. Two applications of `253`
//! compound to `253²`; `decimals` never divides the internal multiplier.
//! It only shifts the published token decimals, and is exposed through
//! [`AdjustmentEngine::normalized_multiplier`] for display.
//!
//! A rebase from stamp `s` to the current epoch `n` multiplies by
//! `factor[s+1] × … × factor[n]`. The product is taken over the individual
//! factors rather than by dividing two cumulative values, so it is exact
//! and never larger than the growth actually owed.

use chrono::{DateTime, Utc};
use partledger_types::{
    AdjustmentEpoch, AppliedAdjustment, LedgerConfig, PartledgerError, Result,
    ScheduledAdjustment, StampedAmount,
};
use rust_decimal::Decimal;

use crate::queue::AdjustmentQueue;

/// Owns the token-wide adjustment state.
///
/// Exactly one engine exists per ledger and it is passed to every
/// component that reads or writes a stamped amount.
#[derive(Debug, Clone)]
pub struct AdjustmentEngine {
    /// `applied[i]` opened epoch `i + 1`.
    applied: Vec<AppliedAdjustment>,
    /// Future adjustments.
    queue: AdjustmentQueue,
    /// Token decimals at genesis.
    base_decimals: u8,
}

impl AdjustmentEngine {
    /// Create an engine at genesis (epoch 0, factor 1).
    #[must_use]
    pub fn new(max_pending: usize, base_decimals: u8) -> Self {
        Self {
            applied: Vec::new(),
            queue: AdjustmentQueue::with_capacity(max_pending),
            base_decimals,
        }
    }

    /// Create an engine from ledger configuration.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.max_pending_adjustments, config.token_decimals)
    }

    // -----------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------

    /// Queue an adjustment for `execute_at`.
    ///
    /// Anything already due at `now` is settled first, so the cap applies
    /// only to genuinely future entries.
    ///
    /// # Errors
    /// - `InvalidFactor` if `factor == 0`
    /// - `InvalidExecutionTime` if `execute_at <= now`
    /// - `TooManyPendingAdjustments` if the queue is full
    pub fn schedule(
        &mut self,
        factor: u64,
        decimals: u8,
        execute_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledAdjustment> {
        if factor == 0 {
            return Err(PartledgerError::InvalidFactor(factor));
        }
        if execute_at <= now {
            return Err(PartledgerError::InvalidExecutionTime {
                execution: execute_at.timestamp(),
                now: now.timestamp(),
            });
        }
        self.settle_due(now);
        let entry = self.queue.push(execute_at, factor, decimals)?;

        tracing::info!(
            sequence = entry.sequence,
            factor,
            decimals,
            execute_at = %execute_at,
            pending = self.queue.len(),
            "Balance adjustment scheduled"
        );
        Ok(entry)
    }

    /// Compose `factor` into the cumulative multiplier right now.
    ///
    /// Adjustments already due at `now` are applied before this one.
    ///
    /// # Errors
    /// Returns `InvalidFactor` if `factor == 0`.
    pub fn apply_immediate(
        &mut self,
        factor: u64,
        decimals: u8,
        now: DateTime<Utc>,
    ) -> Result<AdjustmentEpoch> {
        if factor == 0 {
            return Err(PartledgerError::InvalidFactor(factor));
        }
        self.settle_due(now);
        Ok(self.push_applied(factor, decimals, now))
    }

    /// Apply, in order, every scheduled adjustment due at `now`.
    ///
    /// Returns the number applied. Calling it again with the same `now` is
    /// a no-op, and the resulting cumulative factor does not depend on how
    /// many calls it took to reach `now`.
    pub fn settle_due(&mut self, now: DateTime<Utc>) -> usize {
        let mut count = 0;
        while let Some(entry) = self.queue.pop_due(now) {
            self.push_applied(entry.factor, entry.decimals, entry.execute_at);
            count += 1;
        }
        count
    }

    fn push_applied(&mut self, factor: u64, decimals: u8, effective_at: DateTime<Utc>) -> AdjustmentEpoch {
        let epoch = self.current_epoch().next();
        self.applied.push(AppliedAdjustment {
            epoch,
            factor,
            decimals,
            effective_at,
        });
        tracing::info!(
            epoch = epoch.0,
            factor,
            decimals,
            effective_at = %effective_at,
            "Balance adjustment applied"
        );
        epoch
    }

    /// Settle, then bring `stamped` up to the current epoch.
    ///
    /// Returns the true amount.
    pub fn rebase(&mut self, stamped: &mut StampedAmount, now: DateTime<Utc>) -> Result<Decimal> {
        self.settle_due(now);
        self.refresh(stamped)
    }

    /// Bring `stamped` up to the current epoch without settling.
    ///
    /// Callers must have settled for the current instant already.
    pub fn refresh(&self, stamped: &mut StampedAmount) -> Result<Decimal> {
        if stamped.amount.is_zero() {
            stamped.stamp = self.current_epoch();
            return Ok(Decimal::ZERO);
        }
        let ratio = self.ratio_since(stamped.stamp)?;
        stamped.rescale(ratio, self.current_epoch())
    }

    /// True amount of `stamped` at the current epoch, leaving it untouched.
    pub fn project(&self, stamped: &StampedAmount) -> Result<Decimal> {
        if stamped.amount.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let ratio = self.ratio_since(stamped.stamp)?;
        stamped.scaled(ratio)
    }

    /// A fresh amount stamped with the current epoch.
    #[must_use]
    pub fn stamp(&self, amount: Decimal) -> StampedAmount {
        StampedAmount::new(amount, self.current_epoch())
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Number of adjustments applied since genesis.
    #[must_use]
    pub fn current_epoch(&self) -> AdjustmentEpoch {
        AdjustmentEpoch(self.applied.len() as u64)
    }

    /// Product of every factor applied after `stamp`.
    pub fn ratio_since(&self, stamp: AdjustmentEpoch) -> Result<Decimal> {
        debug_assert!(stamp <= self.current_epoch(), "stamp from the future");
        let start = usize::try_from(stamp.0).unwrap_or(usize::MAX);
        self.applied
            .get(start..)
            .unwrap_or_default()
            .iter()
            .try_fold(Decimal::ONE, |acc, adj| {
                acc.checked_mul(Decimal::from(adj.factor)).ok_or_else(|| {
                    PartledgerError::overflow(format!("compounding factor at {}", adj.epoch))
                })
            })
    }

    /// Raw cumulative multiplier since genesis.
    pub fn cumulative_factor(&self) -> Result<Decimal> {
        self.ratio_since(AdjustmentEpoch::GENESIS)
    }

    /// Sum of the `decimals` of every applied adjustment.
    #[must_use]
    pub fn decimals_shift(&self) -> u32 {
        self.applied.iter().map(|a| u32::from(a.decimals)).sum()
    }

    /// Token decimals after all applied adjustments.
    #[must_use]
    pub fn adjusted_decimals(&self) -> u32 {
        u32::from(self.base_decimals) + self.decimals_shift()
    }

    /// Cumulative multiplier divided by `10^decimals_shift`, for display.
    pub fn normalized_multiplier(&self) -> Result<Decimal> {
        let scale = Decimal::try_new(1, self.decimals_shift())
            .map_err(|e| PartledgerError::overflow(format!("decimal shift: {e}")))?;
        self.cumulative_factor()?
            .checked_mul(scale)
            .ok_or_else(|| PartledgerError::overflow("normalizing multiplier"))
    }

    /// Applied adjustments, oldest first.
    #[must_use]
    pub fn history(&self) -> &[AppliedAdjustment] {
        &self.applied
    }

    /// The scheduled queue.
    #[must_use]
    pub fn queue(&self) -> &AdjustmentQueue {
        &self.queue
    }

    /// Pending adjustments in execution order.
    #[must_use]
    pub fn pending(&self) -> Vec<ScheduledAdjustment> {
        self.queue.iter().copied().collect()
    }
}

impl Default for AdjustmentEngine {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn engine() -> AdjustmentEngine {
        AdjustmentEngine::new(10, 6)
    }

    #[test]
    fn genesis_is_identity() {
        let e = engine();
        assert_eq!(e.current_epoch(), AdjustmentEpoch(0));
        assert_eq!(e.cumulative_factor().unwrap(), Decimal::ONE);
        assert_eq!(e.adjusted_decimals(), 6);
    }

    #[test]
    fn zero_factor_rejected() {
        let mut e = engine();
        let now = Utc::now();
        assert_eq!(
            e.apply_immediate(0, 0, now).unwrap_err(),
            PartledgerError::InvalidFactor(0)
        );
        assert!(matches!(
            e.schedule(0, 0, now + Duration::seconds(1), now),
            Err(PartledgerError::InvalidFactor(0))
        ));
    }

    #[test]
    fn schedule_requires_future_time() {
        let mut e = engine();
        let now = Utc::now();
        let err = e.schedule(2, 0, now, now).unwrap_err();
        assert!(matches!(err, PartledgerError::InvalidExecutionTime { .. }));
        let err = e.schedule(2, 0, now - Duration::seconds(1), now).unwrap_err();
        assert!(matches!(err, PartledgerError::InvalidExecutionTime { .. }));
    }

    #[test]
    fn same_factor_twice_compounds_to_square() {
        let mut e = engine();
        let now = Utc::now();
        let mut s = e.stamp(dec(1000));
        e.apply_immediate(253, 0, now).unwrap();
        e.apply_immediate(253, 0, now).unwrap();
        assert_eq!(e.cumulative_factor().unwrap(), dec(253 * 253));
        assert_eq!(e.rebase(&mut s, now).unwrap(), dec(1000 * 253 * 253));
        assert_eq!(s.stamp, AdjustmentEpoch(2));
    }

    #[test]
    fn amount_stamped_between_adjustments_sees_only_later_factor() {
        let mut e = engine();
        let now = Utc::now();
        let mut early = e.stamp(dec(10));
        e.apply_immediate(3, 0, now).unwrap();
        let mut late = e.stamp(dec(10));
        e.apply_immediate(5, 0, now).unwrap();

        assert_eq!(e.refresh(&mut early).unwrap(), dec(150));
        assert_eq!(e.refresh(&mut late).unwrap(), dec(50));
    }

    #[test]
    fn scheduled_adjustments_apply_in_time_order() {
        let mut e = engine();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let t2 = t0 + Duration::seconds(20);
        e.schedule(7, 0, t2, t0).unwrap();
        e.schedule(3, 0, t1, t0).unwrap();

        assert_eq!(e.settle_due(t1 - Duration::seconds(1)), 0);
        assert_eq!(e.settle_due(t1), 1);
        assert_eq!(e.cumulative_factor().unwrap(), dec(3));
        assert_eq!(e.history()[0].factor, 3);

        assert_eq!(e.settle_due(t2 + Duration::seconds(5)), 1);
        assert_eq!(e.cumulative_factor().unwrap(), dec(21));
        assert_eq!(e.history()[1].effective_at, t2);
    }

    #[test]
    fn settlement_is_idempotent() {
        let mut e = engine();
        let t0 = Utc::now();
        e.schedule(4, 0, t0 + Duration::seconds(1), t0).unwrap();
        let later = t0 + Duration::seconds(2);
        assert_eq!(e.settle_due(later), 1);
        assert_eq!(e.settle_due(later), 0);
        assert_eq!(e.current_epoch(), AdjustmentEpoch(1));
    }

    #[test]
    fn settlement_result_independent_of_call_pattern() {
        let t0 = Utc::now();
        let mut stepwise = engine();
        let mut at_once = engine();
        for (i, f) in [2u64, 3, 5].into_iter().enumerate() {
            let at = t0 + Duration::seconds(10 * (i as i64 + 1));
            stepwise.schedule(f, 0, at, t0).unwrap();
            at_once.schedule(f, 0, at, t0).unwrap();
        }
        for s in [10, 15, 20, 30] {
            stepwise.settle_due(t0 + Duration::seconds(s));
        }
        at_once.settle_due(t0 + Duration::seconds(30));
        assert_eq!(
            stepwise.cumulative_factor().unwrap(),
            at_once.cumulative_factor().unwrap()
        );
        assert_eq!(stepwise.current_epoch(), at_once.current_epoch());
    }

    #[test]
    fn rebase_folds_in_due_adjustment() {
        let mut e = engine();
        let t0 = Utc::now();
        let mut s = e.stamp(dec(100));
        e.schedule(2, 0, t0 + Duration::seconds(5), t0).unwrap();
        assert_eq!(e.rebase(&mut s, t0).unwrap(), dec(100));
        assert_eq!(e.rebase(&mut s, t0 + Duration::seconds(5)).unwrap(), dec(200));
    }

    #[test]
    fn project_does_not_restamp() {
        let mut e = engine();
        let now = Utc::now();
        let s = e.stamp(dec(9));
        e.apply_immediate(2, 0, now).unwrap();
        assert_eq!(e.project(&s).unwrap(), dec(18));
        assert_eq!(s.stamp, AdjustmentEpoch(0));
    }

    #[test]
    fn immediate_apply_settles_due_first() {
        let mut e = engine();
        let t0 = Utc::now();
        e.schedule(3, 0, t0 + Duration::seconds(1), t0).unwrap();
        e.apply_immediate(5, 0, t0 + Duration::seconds(2)).unwrap();
        let factors: Vec<u64> = e.history().iter().map(|a| a.factor).collect();
        assert_eq!(factors, vec![3, 5]);
    }

    #[test]
    fn decimals_do_not_scale_internal_factor() {
        let mut e = engine();
        let now = Utc::now();
        e.apply_immediate(10, 1, now).unwrap();
        assert_eq!(e.cumulative_factor().unwrap(), dec(10));
        assert_eq!(e.decimals_shift(), 1);
        assert_eq!(e.adjusted_decimals(), 7);
        assert_eq!(e.normalized_multiplier().unwrap(), Decimal::ONE);
    }

    #[test]
    fn queue_cap_counts_only_future_entries() {
        let mut e = AdjustmentEngine::new(1, 0);
        let t0 = Utc::now();
        e.schedule(2, 0, t0 + Duration::seconds(1), t0).unwrap();
        let err = e.schedule(2, 0, t0 + Duration::seconds(2), t0).unwrap_err();
        assert_eq!(err, PartledgerError::TooManyPendingAdjustments { max: 1 });
        // Once the first is due it no longer occupies the queue.
        let t1 = t0 + Duration::seconds(1);
        e.schedule(2, 0, t0 + Duration::seconds(3), t1).unwrap();
        assert_eq!(e.current_epoch(), AdjustmentEpoch(1));
    }

    #[test]
    fn zero_amounts_skip_the_ratio() {
        let mut e = engine();
        let now = Utc::now();
        let mut z = e.stamp(Decimal::ZERO);
        for _ in 0..4 {
            e.apply_immediate(u64::MAX, 0, now).unwrap();
        }
        assert_eq!(e.project(&z).unwrap(), Decimal::ZERO);
        assert_eq!(e.refresh(&mut z).unwrap(), Decimal::ZERO);
        assert_eq!(z.stamp, AdjustmentEpoch(4));
    }

    #[test]
    fn compounding_overflow_reported() {
        let mut e = engine();
        let now = Utc::now();
        for _ in 0..4 {
            e.apply_immediate(u64::MAX, 0, now).unwrap();
        }
        assert!(matches!(
            e.cumulative_factor(),
            Err(PartledgerError::ArithmeticOverflow(_))
        ));
    }
}
