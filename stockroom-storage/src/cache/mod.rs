//! Fast-path availability cache with multi-tenant isolation.
//!
//! The cache only ever holds a scalar: the last known available quantity of
//! a product. The durable store stays the source of truth and any entry can
//! be rebuilt from it.
//!
//! # Tenant Isolation
//!
//! The [`TenantScopedKey`] type ensures that cache keys cannot be constructed
//! without providing a `tenant_id`, and every backend takes keys of that type.
//!
//! # Backends
//!
//! - [`InMemoryAvailabilityCache`]: process-local, for tests and embedding.
//! - [`LmdbAvailabilityCache`]: memory-mapped, survives restarts.

pub mod lmdb_backend;
pub mod memory;
pub mod tenant_key;
pub mod traits;

pub use lmdb_backend::{LmdbAvailabilityCache, LmdbCacheError};
pub use memory::InMemoryAvailabilityCache;
pub use tenant_key::TenantScopedKey;
pub use traits::{AvailabilityCache, CacheStats};
