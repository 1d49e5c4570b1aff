//! Error types for Stockroom operations

use crate::{ProductId, TenantId};
use thiserror::Error;

/// Business-rule errors raised by the inventory ledger and facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Inventory not found for product {product_id} in tenant {tenant_id}")]
    NotFound {
        tenant_id: TenantId,
        product_id: ProductId,
    },

    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },
}

impl InventoryError {
    /// Shorthand for an `InvalidArgument` error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Durable store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Version conflict on product {product_id}: expected {expected}, found {actual}")]
    VersionConflict {
        product_id: ProductId,
        expected: u64,
        actual: u64,
    },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Availability cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt cache entry: {reason}")]
    Corrupt { reason: String },
}

/// Structural violations on a record submitted for persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Stockroom errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StockroomError {
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl StockroomError {
    /// True for expected business outcomes a caller renders as a message
    /// (missing product, out of stock) rather than treats as a fault.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            StockroomError::Inventory(InventoryError::NotFound { .. })
                | StockroomError::Inventory(InventoryError::InsufficientStock { .. })
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StockroomError::Inventory(InventoryError::NotFound { .. }))
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StockroomError::Storage(StorageError::VersionConflict { .. }))
    }
}

/// Result type alias for Stockroom operations.
pub type StockroomResult<T> = Result<T, StockroomError>;

// =============================================================================
// TESTS
// =============================================================================
