//! Identity types for inventory records

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Tenant identifier. Every record, key and report is scoped to one tenant.
pub type TenantId = Uuid;

/// Product identifier, unique within a tenant.
pub type ProductId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
