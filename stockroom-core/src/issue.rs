//! Integrity and stock-level issues reported by the consistency checker.

use crate::{ProductId, TenantId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of problem found on an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// Reserved quantity exceeds physical quantity.
    InvalidReservation,
    /// Physical quantity is negative.
    NegativeQuantity,
    /// Reserved quantity is negative.
    NegativeReserved,
    /// Available quantity at or below the low-stock threshold.
    LowStock,
    /// Nothing left to sell.
    OutOfStock,
    /// The checker could not read or repair one side of the record.
    ReconcileError,
}

impl IssueType {
    /// Severity every issue of this kind is reported at.
    pub fn severity(&self) -> Severity {
        match self {
            IssueType::InvalidReservation
            | IssueType::NegativeQuantity
            | IssueType::NegativeReserved => Severity::Critical,
            IssueType::OutOfStock | IssueType::ReconcileError => Severity::High,
            IssueType::LowStock => Severity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::InvalidReservation => "INVALID_RESERVATION",
            IssueType::NegativeQuantity => "NEGATIVE_QUANTITY",
            IssueType::NegativeReserved => "NEGATIVE_RESERVED",
            IssueType::LowStock => "LOW_STOCK",
            IssueType::OutOfStock => "OUT_OF_STOCK",
            IssueType::ReconcileError => "RECONCILE_ERROR",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    High,
    Critical,
}

/// A single problem found on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InventoryIssue {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub tenant_id: TenantId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub product_id: ProductId,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub detected_at: Timestamp,
}

impl InventoryIssue {
    /// Create an issue; severity follows from the issue type.
    pub fn new(
        tenant_id: TenantId,
        product_id: ProductId,
        issue_type: IssueType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            product_id,
            issue_type,
            severity: issue_type.severity(),
            message: message.into(),
            detected_at: Utc::now(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
