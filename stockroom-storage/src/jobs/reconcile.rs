//! Scheduled Reconciliation Task
//!
//! Periodically summarizes every configured tenant, which repairs stale
//! availability cache entries as a side effect, and optionally purges
//! orphaned cache entries. The task never blocks the transactional path: it
//! only talks to the store and cache through a [`ConsistencyChecker`].
//!
//! # Configuration
//!
//! ```rust
//! use stockroom_storage::jobs::ReconcileJobConfig;
//! use std::time::Duration;
//!
//! let config = ReconcileJobConfig {
//!     check_interval: Duration::from_secs(60),
//!     purge_orphans: true,
//!     log_problems: true,
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stockroom_core::{
    ConfigError, StockroomConfig, StockroomResult, TenantId, MAX_RECONCILE_INTERVAL,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::cache::AvailabilityCache;
use crate::checker::ConsistencyChecker;
use crate::store::InventoryStore;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the reconciliation background task.
#[derive(Debug, Clone)]
pub struct ReconcileJobConfig {
    /// How often to reconcile (default: 60 seconds)
    pub check_interval: Duration,

    /// Whether each cycle also purges orphaned cache entries (default: true)
    pub purge_orphans: bool,

    /// Whether to log every problem result individually (default: true)
    pub log_problems: bool,
}

impl Default for ReconcileJobConfig {
    fn default() -> Self {
        Self::from_config(&StockroomConfig::default())
    }
}

impl ReconcileJobConfig {
    /// Derive the job settings from the shared runtime configuration.
    pub fn from_config(config: &StockroomConfig) -> Self {
        Self {
            check_interval: config.reconcile_interval,
            purge_orphans: config.purge_orphans_on_schedule,
            log_problems: true,
        }
    }

    /// Reject intervals the ticker cannot run with.
    pub fn validate(&self) -> StockroomResult<()> {
        if self.check_interval.is_zero() || self.check_interval > MAX_RECONCILE_INTERVAL {
            return Err(ConfigError::InvalidValue {
                field: "check_interval".to_string(),
                value: format!("{:?}", self.check_interval),
                reason: "check_interval must be positive and at most one day".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters accumulated over the task's lifetime.
#[derive(Debug, Default)]
pub struct ReconcileJobMetrics {
    /// Completed reconciliation cycles
    pub cycles: AtomicU64,

    /// Records examined across all cycles
    pub records_checked: AtomicU64,

    /// Cache entries overwritten with the store value
    pub cache_repairs: AtomicU64,

    /// Problem results reported (inconsistent or carrying issues)
    pub problems_found: AtomicU64,

    /// Orphaned cache entries deleted
    pub orphans_purged: AtomicU64,

    /// Expired cache entries reclaimed by purges
    pub expired_swept: AtomicU64,

    /// Tenant scans or purges that failed
    pub errors: AtomicU64,
}

impl ReconcileJobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ReconcileJobSnapshot {
        ReconcileJobSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            records_checked: self.records_checked.load(Ordering::Relaxed),
            cache_repairs: self.cache_repairs.load(Ordering::Relaxed),
            problems_found: self.problems_found.load(Ordering::Relaxed),
            orphans_purged: self.orphans_purged.load(Ordering::Relaxed),
            expired_swept: self.expired_swept.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of job metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJobSnapshot {
    pub cycles: u64,
    pub records_checked: u64,
    pub cache_repairs: u64,
    pub problems_found: u64,
    pub orphans_purged: u64,
    pub expired_swept: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Validate `config` and spawn the reconciliation loop on the current tokio
/// runtime.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = spawn_reconcile_task(checker, vec![tenant_id], config, shutdown_rx)?;
///
/// // On shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub fn spawn_reconcile_task<S, C>(
    checker: Arc<ConsistencyChecker<S, C>>,
    tenants: Vec<TenantId>,
    config: ReconcileJobConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> StockroomResult<JoinHandle<Arc<ReconcileJobMetrics>>>
where
    S: InventoryStore + ?Sized + 'static,
    C: AvailabilityCache + ?Sized + 'static,
{
    config.validate()?;
    Ok(tokio::spawn(reconcile_task(
        checker,
        tenants,
        config,
        shutdown_rx,
    )))
}

/// Reconcile `tenants` every `check_interval` until shutdown is signalled.
///
/// The first cycle runs immediately. Returns the metrics collected during
/// the task's lifetime.
async fn reconcile_task<S, C>(
    checker: Arc<ConsistencyChecker<S, C>>,
    tenants: Vec<TenantId>,
    config: ReconcileJobConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ReconcileJobMetrics>
where
    S: InventoryStore + ?Sized,
    C: AvailabilityCache + ?Sized,
{
    let metrics = Arc::new(ReconcileJobMetrics::new());

    let mut ticker = interval(config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_ms = config.check_interval.as_millis() as u64,
        tenants = tenants.len(),
        purge_orphans = config.purge_orphans,
        "Reconciliation task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Reconciliation task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                run_cycle(&checker, &tenants, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        records_checked = snapshot.records_checked,
        cache_repairs = snapshot.cache_repairs,
        problems_found = snapshot.problems_found,
        orphans_purged = snapshot.orphans_purged,
        expired_swept = snapshot.expired_swept,
        errors = snapshot.errors,
        "Reconciliation task completed"
    );

    metrics
}

/// Perform one reconciliation pass over every tenant.
async fn run_cycle<S, C>(
    checker: &ConsistencyChecker<S, C>,
    tenants: &[TenantId],
    config: &ReconcileJobConfig,
    metrics: &ReconcileJobMetrics,
) where
    S: InventoryStore + ?Sized,
    C: AvailabilityCache + ?Sized,
{
    metrics.cycles.fetch_add(1, Ordering::Relaxed);

    for &tenant_id in tenants {
        match checker.summarize(tenant_id).await {
            Ok(summary) => {
                metrics
                    .records_checked
                    .fetch_add(summary.total_checked as u64, Ordering::Relaxed);
                metrics
                    .cache_repairs
                    .fetch_add(summary.repairs() as u64, Ordering::Relaxed);
                metrics
                    .problems_found
                    .fetch_add(summary.problems.len() as u64, Ordering::Relaxed);

                if config.log_problems {
                    for problem in &summary.problems {
                        tracing::warn!(
                            tenant_id = %problem.tenant_id,
                            product_id = %problem.product_id,
                            cache_available = ?problem.cache_available,
                            store_available = ?problem.store_available,
                            repaired = problem.repaired,
                            issues = problem.issues.len(),
                            "Reconciliation problem"
                        );
                    }
                }
            }
            Err(e) => {
                metrics.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(%tenant_id, error = %e, "Failed to reconcile tenant");
            }
        }

        if !config.purge_orphans {
            continue;
        }

        match checker.purge_orphans(tenant_id).await {
            Ok(report) => {
                metrics
                    .orphans_purged
                    .fetch_add(report.purged as u64, Ordering::Relaxed);
                metrics
                    .expired_swept
                    .fetch_add(report.expired as u64, Ordering::Relaxed);
                metrics
                    .errors
                    .fetch_add(report.errors as u64, Ordering::Relaxed);
            }
            Err(e) => {
                metrics.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(%tenant_id, error = %e, "Failed to purge orphaned cache entries");
            }
        }
    }

    tracing::trace!(tenants = tenants.len(), "Reconciliation cycle completed");
}

// ============================================================================
// TESTS
// ============================================================================
