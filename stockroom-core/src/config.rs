//! Configuration types

use crate::{ConfigError, StockroomError, StockroomResult, DEFAULT_LOW_STOCK_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted cache TTL.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted period for the scheduled reconciliation job.
pub const MAX_RECONCILE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runtime configuration for the inventory facade and consistency checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockroomConfig {
    /// Time-to-live for cached availability values.
    pub cache_ttl: Duration,
    /// Threshold applied to records created without an explicit one.
    pub default_low_stock_threshold: i64,
    /// How many times a mutation is retried after a version conflict.
    pub max_conflict_retries: u32,
    /// Records reconciled concurrently during a tenant-wide scan.
    pub reconcile_concurrency: usize,
    /// Period of the scheduled reconciliation job.
    pub reconcile_interval: Duration,
    /// Whether the scheduled job also purges orphaned cache entries.
    pub purge_orphans_on_schedule: bool,
}

impl Default for StockroomConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300), // 5 minutes
            default_low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            max_conflict_retries: 3,
            reconcile_concurrency: 16,
            reconcile_interval: Duration::from_secs(60),
            purge_orphans_on_schedule: true,
        }
    }
}

impl StockroomConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `STOCKROOM_CACHE_TTL_SECS`: Cache entry TTL (default: 300)
    /// - `STOCKROOM_LOW_STOCK_THRESHOLD`: Default low-stock threshold (default: 10)
    /// - `STOCKROOM_MAX_CONFLICT_RETRIES`: Retries after a version conflict (default: 3)
    /// - `STOCKROOM_RECONCILE_CONCURRENCY`: Parallel reconciliations (default: 16)
    /// - `STOCKROOM_RECONCILE_INTERVAL_SECS`: Scheduled job period (default: 60)
    /// - `STOCKROOM_PURGE_ORPHANS`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_ttl: std::env::var("STOCKROOM_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            default_low_stock_threshold: std::env::var("STOCKROOM_LOW_STOCK_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_low_stock_threshold),
            max_conflict_retries: std::env::var("STOCKROOM_MAX_CONFLICT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_conflict_retries),
            reconcile_concurrency: std::env::var("STOCKROOM_RECONCILE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reconcile_concurrency),
            reconcile_interval: std::env::var("STOCKROOM_RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
            purge_orphans_on_schedule: std::env::var("STOCKROOM_PURGE_ORPHANS")
                .ok()
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.purge_orphans_on_schedule),
        }
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the conflict retry budget.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Set the reconciliation concurrency.
    pub fn with_reconcile_concurrency(mut self, concurrency: usize) -> Self {
        self.reconcile_concurrency = concurrency;
        self
    }

    /// Set the scheduled reconciliation period.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(StockroomError::Config) if invalid.
    pub fn validate(&self) -> StockroomResult<()> {
        if self.cache_ttl.is_zero() {
            return Err(invalid(
                "cache_ttl",
                format!("{:?}", self.cache_ttl),
                "cache_ttl must be positive",
            ));
        }

        if self.cache_ttl > MAX_CACHE_TTL {
            return Err(invalid(
                "cache_ttl",
                format!("{:?}", self.cache_ttl),
                "cache_ttl must not exceed seven days",
            ));
        }

        if self.default_low_stock_threshold < 0 {
            return Err(invalid(
                "default_low_stock_threshold",
                self.default_low_stock_threshold.to_string(),
                "default_low_stock_threshold must be non-negative",
            ));
        }

        if self.reconcile_concurrency == 0 {
            return Err(invalid(
                "reconcile_concurrency",
                self.reconcile_concurrency.to_string(),
                "reconcile_concurrency must be at least 1",
            ));
        }

        if self.reconcile_interval.is_zero() {
            return Err(invalid(
                "reconcile_interval",
                format!("{:?}", self.reconcile_interval),
                "reconcile_interval must be positive",
            ));
        }

        if self.reconcile_interval > MAX_RECONCILE_INTERVAL {
            return Err(invalid(
                "reconcile_interval",
                format!("{:?}", self.reconcile_interval),
                "reconcile_interval must not exceed one day",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> StockroomError {
    StockroomError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}
