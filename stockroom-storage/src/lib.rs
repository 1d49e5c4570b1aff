//! Stockroom Storage - Two-Tier Inventory Storage
//!
//! Defines the durable store and availability cache contracts, ships
//! reference backends for both, and builds the query facade and the
//! consistency checker on top of them.
//!
//! ```text
//!   callers ──► InventoryService ──► InventoryStore (source of truth)
//!                      │
//!                      └──────────► AvailabilityCache (fast path, TTL)
//!
//!   ConsistencyChecker / jobs::reconcile ──► both tiers, off the hot path
//! ```

pub mod cache;
pub mod checker;
pub mod jobs;
pub mod service;
pub mod store;
pub mod telemetry;

pub use cache::{
    AvailabilityCache, CacheStats, InMemoryAvailabilityCache, LmdbAvailabilityCache,
    LmdbCacheError, TenantScopedKey,
};
pub use checker::ConsistencyChecker;
pub use jobs::{spawn_reconcile_task, ReconcileJobConfig, ReconcileJobMetrics};
pub use service::InventoryService;
pub use store::{InMemoryInventoryStore, InventoryStore};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
