//! Property-Based Tests for the Inventory Facade
//!
//! **Write-through convergence**: after any sequence of ledger operations
//! through the facade, the cached availability equals the store's.
//!
//! **Failed operations are side-effect free**: a rejected operation leaves the
//! stored record byte-for-byte unchanged.
//!
//! **Orphan purge precision**: `purge_orphans` removes a cache entry iff its
//! store record is absent.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use stockroom_storage::{
    AvailabilityCache, ConsistencyChecker, InMemoryAvailabilityCache, InMemoryInventoryStore,
    InventoryService, InventoryStore, TenantScopedKey,
};
use stockroom_test_utils::{
    assertions::assert_within_bounds,
    fixtures,
    generators::{arb_ledger_op, LedgerOp},
    InventoryRecord,
};
use tokio::runtime::Runtime;
use uuid::Uuid;

type MemoryService = InventoryService<InMemoryInventoryStore, InMemoryAvailabilityCache>;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn memory_service() -> MemoryService {
    let (store, cache) = fixtures::in_memory_tiers();
    InventoryService::new(store, cache, fixtures::test_config()).expect("valid config")
}

async fn apply(
    service: &MemoryService,
    record: &InventoryRecord,
    op: LedgerOp,
) -> Result<InventoryRecord, stockroom_test_utils::StockroomError> {
    let (t, p) = (record.tenant_id, record.product_id);
    match op {
        LedgerOp::Reserve(n) => service.reserve(t, p, n).await,
        LedgerOp::Release(n) => service.release_reservation(t, p, n).await,
        LedgerOp::Deduct(n) => service.deduct(t, p, n).await,
        LedgerOp::Restock(n) => service.restock(t, p, n).await,
        LedgerOp::Fulfill(n) => service.fulfill(t, p, n).await,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_cache_tracks_store_after_every_operation(
        initial in 0i64..100,
        ops in prop::collection::vec(arb_ledger_op(40), 1..25),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let service = memory_service();
            let record = service
                .create_or_update(fixtures::stocked(Uuid::now_v7(), initial))
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let key = TenantScopedKey::new(record.tenant_id, record.product_id);

            for op in ops {
                let before = service
                    .store()
                    .get(record.tenant_id, record.product_id)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;

                if apply(&service, &record, op).await.is_err() {
                    let after = service
                        .store()
                        .get(record.tenant_id, record.product_id)
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    prop_assert_eq!(before, after);
                }

                let stored = service
                    .get(record.tenant_id, record.product_id)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let cached = service
                    .cache()
                    .get(&key)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(cached, Some(stored.available_quantity()));
                prop_assert!(stored.quantity >= 0);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_fulfill_only_sequences_stay_within_bounds(
        initial in 0i64..100,
        ops in prop::collection::vec(arb_ledger_op(40), 1..25),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let service = memory_service();
            let record = service
                .create_or_update(fixtures::stocked(Uuid::now_v7(), initial))
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            for op in ops {
                // Shipping goes through fulfill; raw deducts would bypass the
                // reservation ledger.
                if matches!(op, LedgerOp::Deduct(_)) {
                    continue;
                }
                let _ = apply(&service, &record, op).await;
                let stored = service
                    .get(record.tenant_id, record.product_id)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                assert_within_bounds(&stored);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_purge_removes_exactly_orphans(
        live in prop::collection::vec(any::<bool>(), 1..12),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let store = Arc::new(InMemoryInventoryStore::new());
            let cache = Arc::new(InMemoryAvailabilityCache::new());
            let tenant_id = Uuid::now_v7();
            let mut expected = HashSet::new();

            for keep in &live {
                let record = fixtures::stocked(tenant_id, 3);
                let key = TenantScopedKey::new(tenant_id, record.product_id);
                cache
                    .set(&key, 3, Duration::from_secs(60))
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                if *keep {
                    store
                        .save(&record)
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    expected.insert(key);
                }
            }

            let checker = ConsistencyChecker::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                fixtures::test_config(),
            )
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let report = checker
                .purge_orphans(tenant_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(report.scanned, live.len());
            prop_assert_eq!(report.purged, live.len() - expected.len());

            let remaining: HashSet<TenantScopedKey> = cache
                .keys_for_tenant(tenant_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?
                .into_iter()
                .collect();
            prop_assert_eq!(remaining, expected);
            Ok(())
        })?;
    }
}
