//! Report types produced by the consistency checker.
//!
//! These are consumed by admin dashboards, never by the transactional order
//! path, so they are plain serializable data.

use crate::{InventoryIssue, IssueType, ProductId, TenantId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Outcome of reconciling one (tenant, product) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReconcileResult {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub tenant_id: TenantId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub product_id: ProductId,
    /// Available quantity computed from the durable record, if it could be read.
    pub store_available: Option<i64>,
    /// Value the cache held before reconciliation; `None` on a miss.
    pub cache_available: Option<i64>,
    pub cache_was_consistent: bool,
    /// Whether the cache was overwritten with the store value.
    pub repaired: bool,
    pub issues: Vec<InventoryIssue>,
}

impl ReconcileResult {
    /// A result standing in for a record that could not be reconciled.
    pub fn failed(tenant_id: TenantId, product_id: ProductId, message: impl Into<String>) -> Self {
        Self {
            tenant_id,
            product_id,
            store_available: None,
            cache_available: None,
            cache_was_consistent: false,
            repaired: false,
            issues: vec![InventoryIssue::new(
                tenant_id,
                product_id,
                IssueType::ReconcileError,
                message,
            )],
        }
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// True when the cache disagreed or the record carries issues.
    pub fn is_problem(&self) -> bool {
        !self.cache_was_consistent || self.has_issues()
    }
}

/// Aggregated view over a tenant-wide reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReconciliationSummary {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub tenant_id: TenantId,
    pub total_checked: usize,
    pub cache_matches: usize,
    pub cache_mismatches: usize,
    pub records_with_issues: usize,
    /// Every result that was inconsistent or carried issues.
    pub problems: Vec<ReconcileResult>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub checked_at: Timestamp,
}

impl ReconciliationSummary {
    /// Fold a set of per-record results into a summary.
    pub fn from_results(tenant_id: TenantId, results: Vec<ReconcileResult>) -> Self {
        let total_checked = results.len();
        let cache_matches = results.iter().filter(|r| r.cache_was_consistent).count();
        let records_with_issues = results.iter().filter(|r| r.has_issues()).count();
        let problems: Vec<ReconcileResult> =
            results.into_iter().filter(ReconcileResult::is_problem).collect();

        Self {
            tenant_id,
            total_checked,
            cache_matches,
            cache_mismatches: total_checked - cache_matches,
            records_with_issues,
            problems,
            checked_at: Utc::now(),
        }
    }

    /// Number of cache entries overwritten during the run.
    pub fn repairs(&self) -> usize {
        self.problems.iter().filter(|r| r.repaired).count()
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Result of rebuilding every cache entry for a tenant from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RebuildReport {
    pub rebuilt: usize,
    pub failed: usize,
}

/// Result of purging cache entries whose store record is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PurgeReport {
    /// Expired entries reclaimed before the scan.
    pub expired: usize,
    /// Live cache keys examined under the tenant namespace.
    pub scanned: usize,
    pub purged: usize,
    /// Failed sweeps, store lookups or deletions.
    pub errors: usize,
}
