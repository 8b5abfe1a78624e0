//! Ledger configuration.

use serde::{Deserialize, Serialize};

use crate::{Partition, PartledgerError, Result, constants};

/// Whether the token exposes one reserved partition or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMode {
    /// Only [`Partition::DEFAULT`] is accepted.
    Single,
    /// Any non-zero partition id is accepted.
    Multi,
}

/// When a lock may be released relative to its expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReleasePolicy {
    /// Release only once `now >= expiration`.
    AfterExpiration,
    /// Release only while `now < expiration`.
    BeforeExpiration,
    /// No time gating.
    Anytime,
}

/// Configuration for one ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub partition_mode: PartitionMode,
    /// Safety cap on the scheduled adjustment queue.
    pub max_pending_adjustments: usize,
    pub lock_release_policy: LockReleasePolicy,
    /// Token decimals before any adjustment shifts them.
    pub token_decimals: u8,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            partition_mode: PartitionMode::Multi,
            max_pending_adjustments: constants::DEFAULT_MAX_PENDING_ADJUSTMENTS,
            lock_release_policy: LockReleasePolicy::AfterExpiration,
            token_decimals: constants::DEFAULT_TOKEN_DECIMALS,
        }
    }
}

impl LedgerConfig {
    /// Single-partition token with otherwise default settings.
    #[must_use]
    pub fn single_partition() -> Self {
        Self {
            partition_mode: PartitionMode::Single,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| PartledgerError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the ledger cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_adjustments == 0 {
            return Err(PartledgerError::Configuration(
                "max_pending_adjustments must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check that `partition` is usable under this configuration.
    pub fn check_partition(&self, partition: Partition) -> Result<()> {
        if partition.is_zero() {
            return Err(PartledgerError::InvalidPartition(partition));
        }
        if self.partition_mode == PartitionMode::Single && !partition.is_default() {
            return Err(PartledgerError::PartitionNotAllowedInSinglePartitionMode(
                partition,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.partition_mode, PartitionMode::Multi);
        assert_eq!(cfg.max_pending_adjustments, 100);
        assert_eq!(cfg.lock_release_policy, LockReleasePolicy::AfterExpiration);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let cfg = LedgerConfig::from_json(r#"{"partition_mode":"single"}"#).unwrap();
        assert_eq!(cfg.partition_mode, PartitionMode::Single);
        assert_eq!(cfg.max_pending_adjustments, 100);
    }

    #[test]
    fn from_json_rejects_zero_cap() {
        let err = LedgerConfig::from_json(r#"{"max_pending_adjustments":0}"#).unwrap_err();
        assert!(matches!(err, PartledgerError::Configuration(_)));
    }

    #[test]
    fn from_json_rejects_garbage() {
        let err = LedgerConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, PartledgerError::Configuration(_)));
    }

    #[test]
    fn single_mode_rejects_other_partitions() {
        let cfg = LedgerConfig::single_partition();
        assert!(cfg.check_partition(Partition::DEFAULT).is_ok());
        let other = Partition::from_label("P1");
        assert_eq!(
            cfg.check_partition(other).unwrap_err(),
            PartledgerError::PartitionNotAllowedInSinglePartitionMode(other)
        );
    }

    #[test]
    fn zero_partition_is_invalid() {
        let cfg = LedgerConfig::default();
        let zero = Partition([0u8; 32]);
        assert_eq!(
            cfg.check_partition(zero).unwrap_err(),
            PartledgerError::InvalidPartition(zero)
        );
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = LedgerConfig {
            lock_release_policy: LockReleasePolicy::Anytime,
            ..LedgerConfig::single_partition()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: LedgerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
