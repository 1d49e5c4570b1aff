//! Consistency checker.
//!
//! Compares the availability cache against the durable store, repairs stale
//! entries, purges orphaned ones and reports integrity violations. Reporting
//! operations never fail because of a single bad record: per-record problems
//! become issues or counters in the returned report.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use stockroom_core::{
    InventoryError, InventoryIssue, InventoryRecord, IssueType, ProductId, PurgeReport,
    RebuildReport, ReconcileResult, ReconciliationSummary, StockroomConfig, StockroomError,
    StockroomResult, TenantId,
};

use crate::cache::{AvailabilityCache, TenantScopedKey};
use crate::service::InventoryService;
use crate::store::InventoryStore;

/// Reconciles the two tiers of one store/cache pair.
pub struct ConsistencyChecker<S: ?Sized, C: ?Sized> {
    store: Arc<S>,
    cache: Arc<C>,
    config: StockroomConfig,
}

impl<S: ?Sized, C: ?Sized> Clone for ConsistencyChecker<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

impl<S, C> ConsistencyChecker<S, C>
where
    S: InventoryStore + ?Sized,
    C: AvailabilityCache + ?Sized,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, config: StockroomConfig) -> StockroomResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache,
            config,
        })
    }

    /// A checker over the same store and cache as `service`.
    ///
    /// The service already validated its configuration.
    pub fn for_service(service: &InventoryService<S, C>) -> Self {
        Self {
            store: Arc::clone(service.store()),
            cache: Arc::clone(service.cache()),
            config: service.config().clone(),
        }
    }

    /// Reconcile one product. Never fails; errors become a `RECONCILE_ERROR`
    /// issue on a synthetic result.
    pub async fn reconcile_one(&self, tenant_id: TenantId, product_id: ProductId) -> ReconcileResult {
        let loaded = match self.store.get(tenant_id, product_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let err = InventoryError::NotFound {
                    tenant_id,
                    product_id,
                };
                return self.failed(tenant_id, product_id, &err.into());
            }
            Err(e) => return self.failed(tenant_id, product_id, &e),
        };

        self.reconcile_record(&loaded).await
    }

    /// Reconcile every record of a tenant.
    ///
    /// Records are processed concurrently, so the results come back in no
    /// particular order. Only a failure to enumerate the tenant propagates.
    pub async fn reconcile_all(&self, tenant_id: TenantId) -> StockroomResult<Vec<ReconcileResult>> {
        let records = self.store.list_all(tenant_id).await?;

        let results: Vec<ReconcileResult> = stream::iter(records)
            .map(|record| async move { self.reconcile_record(&record).await })
            .buffer_unordered(self.config.reconcile_concurrency.max(1))
            .collect()
            .await;

        let repaired = results.iter().filter(|r| r.repaired).count();
        if repaired > 0 {
            tracing::warn!(%tenant_id, repaired, "Repaired stale availability cache entries");
        }

        Ok(results)
    }

    /// Reconcile a tenant and fold the results into a summary.
    pub async fn summarize(&self, tenant_id: TenantId) -> StockroomResult<ReconciliationSummary> {
        let results = self.reconcile_all(tenant_id).await?;
        let summary = ReconciliationSummary::from_results(tenant_id, results);

        tracing::info!(
            %tenant_id,
            total_checked = summary.total_checked,
            cache_mismatches = summary.cache_mismatches,
            records_with_issues = summary.records_with_issues,
            "Inventory reconciliation completed"
        );

        Ok(summary)
    }

    /// Overwrite every cache entry of a tenant with the store value.
    pub async fn rebuild_all_cache(&self, tenant_id: TenantId) -> StockroomResult<RebuildReport> {
        let records = self.store.list_all(tenant_id).await?;
        let mut report = RebuildReport::default();

        for record in &records {
            let key = TenantScopedKey::new(record.tenant_id, record.product_id);
            match self
                .cache
                .set(&key, record.available_quantity(), self.config.cache_ttl)
                .await
            {
                Ok(()) => report.rebuilt += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        %tenant_id,
                        product_id = %record.product_id,
                        error = %e,
                        "Failed to rebuild cache entry"
                    );
                }
            }
        }

        tracing::info!(
            %tenant_id,
            rebuilt = report.rebuilt,
            failed = report.failed,
            "Availability cache rebuilt"
        );
        Ok(report)
    }

    /// Delete cache entries whose store record no longer exists.
    ///
    /// Expired entries of the tenant are swept first, so entries of deleted
    /// products are reclaimed even after their TTL hid them from the scan.
    /// Entries whose record cannot be looked up are left in place and
    /// counted as errors.
    pub async fn purge_orphans(&self, tenant_id: TenantId) -> StockroomResult<PurgeReport> {
        let mut report = PurgeReport::default();
        match self.cache.sweep_expired(tenant_id).await {
            Ok(expired) => report.expired = expired as usize,
            Err(e) => {
                report.errors += 1;
                tracing::warn!(%tenant_id, error = %e, "Failed to sweep expired cache entries");
            }
        }

        let keys = self.cache.keys_for_tenant(tenant_id).await?;
        report.scanned = keys.len();

        for key in keys {
            match self.store.get(tenant_id, key.product_id()).await {
                Ok(Some(_)) => {}
                Ok(None) => match self.cache.delete(&key).await {
                    Ok(_) => report.purged += 1,
                    Err(e) => {
                        report.errors += 1;
                        tracing::warn!(%key, error = %e, "Failed to purge orphaned cache entry");
                    }
                },
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(%key, error = %e, "Store lookup failed during orphan purge");
                }
            }
        }

        if report.purged > 0 || report.expired > 0 {
            tracing::info!(
                %tenant_id,
                expired = report.expired,
                scanned = report.scanned,
                purged = report.purged,
                "Purged orphaned cache entries"
            );
        }
        Ok(report)
    }

    /// Every integrity and stock-level issue in a tenant, most severe first.
    ///
    /// Pure reporting; nothing is modified.
    pub async fn validate(&self, tenant_id: TenantId) -> StockroomResult<Vec<InventoryIssue>> {
        let records = self.store.list_all(tenant_id).await?;

        let mut issues: Vec<InventoryIssue> = records
            .iter()
            .flat_map(|r| r.integrity_issues().into_iter().chain(r.stock_issues()))
            .collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));

        let critical = issues.iter().filter(|i| i.is_critical()).count();
        if critical > 0 {
            tracing::error!(%tenant_id, critical, "Inventory integrity violations found");
        }

        Ok(issues)
    }

    /// Compare one loaded record against the cache and repair the entry.
    ///
    /// Integrity issues come from the record alone, so they are reported even
    /// when the cache cannot be read or written. A cache failure adds a
    /// `RECONCILE_ERROR` issue next to them.
    async fn reconcile_record(&self, record: &InventoryRecord) -> ReconcileResult {
        let key = TenantScopedKey::new(record.tenant_id, record.product_id);
        let store_available = record.available_quantity();

        let issues = record.integrity_issues();
        for issue in &issues {
            tracing::error!(
                tenant_id = %issue.tenant_id,
                product_id = %issue.product_id,
                issue_type = %issue.issue_type,
                message = %issue.message,
                "Inventory integrity violation"
            );
        }

        let mut result = ReconcileResult {
            tenant_id: record.tenant_id,
            product_id: record.product_id,
            store_available: Some(store_available),
            cache_available: None,
            cache_was_consistent: false,
            repaired: false,
            issues,
        };

        let cache_available = match self.cache.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                result.issues.push(self.cache_failure(record, "read", &e));
                return result;
            }
        };
        result.cache_available = cache_available;
        result.cache_was_consistent = cache_available == Some(store_available);
        if result.cache_was_consistent {
            return result;
        }

        match self
            .cache
            .set(&key, store_available, self.config.cache_ttl)
            .await
        {
            Ok(()) => {
                result.repaired = true;
                tracing::warn!(
                    tenant_id = %record.tenant_id,
                    product_id = %record.product_id,
                    cache_available = ?cache_available,
                    store_available,
                    "Availability cache out of sync, repaired"
                );
            }
            Err(e) => result.issues.push(self.cache_failure(record, "repair", &e)),
        }
        result
    }

    fn cache_failure(
        &self,
        record: &InventoryRecord,
        step: &str,
        error: &StockroomError,
    ) -> InventoryIssue {
        tracing::warn!(
            tenant_id = %record.tenant_id,
            product_id = %record.product_id,
            step,
            error = %error,
            "Cache unavailable during reconciliation"
        );
        InventoryIssue::new(
            record.tenant_id,
            record.product_id,
            IssueType::ReconcileError,
            format!("cache {} failed: {}", step, error),
        )
    }

    fn failed(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        error: &StockroomError,
    ) -> ReconcileResult {
        tracing::warn!(%tenant_id, %product_id, error = %error, "Reconciliation failed");
        ReconcileResult::failed(tenant_id, product_id, error.to_string())
    }
}
