//! Stockroom Core - Inventory Ledger and Report Types
//!
//! Pure data structures and business rules with no I/O. The storage crate
//! builds the two-tier store, the facade and the consistency checker on top
//! of these types.

mod config;
mod error;
mod health;
mod identity;
mod inventory;
mod issue;
mod report;

pub use config::{StockroomConfig, MAX_CACHE_TTL, MAX_RECONCILE_INTERVAL};
pub use error::{
    CacheError, ConfigError, InventoryError, StockroomError, StockroomResult, StorageError,
    ValidationError,
};
pub use health::{HealthCheck, HealthStatus};
pub use identity::{ProductId, TenantId, Timestamp};
pub use inventory::{InventoryRecord, DEFAULT_LOW_STOCK_THRESHOLD};
pub use issue::{InventoryIssue, IssueType, Severity};
pub use report::{PurgeReport, RebuildReport, ReconcileResult, ReconciliationSummary};
