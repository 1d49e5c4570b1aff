//! The inventory ledger: one record per (tenant, product) and the business
//! rules for reserving, releasing, deducting and restocking stock.
//!
//! Every operation here is synchronous and only mutates the in-memory record.
//! Persisting the result is the caller's job.
//!
//! # Reservation vs. physical stock
//!
//! `quantity` counts units on hand; `reserved_quantity` counts units held for
//! in-flight orders. [`InventoryRecord::deduct`] works against physical stock
//! and leaves reservations alone, so a shipment of reserved units must either
//! pair `deduct` with `release_reservation`, or call
//! [`InventoryRecord::fulfill`] which does both in one step. Partial shipments
//! that release reservations separately from deduction keep using the
//! primitives.

use crate::{
    InventoryError, InventoryIssue, IssueType, ProductId, TenantId, Timestamp, ValidationError,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default low-stock threshold for newly stocked products.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Stock level of a single product within a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InventoryRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub tenant_id: TenantId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub product_id: ProductId,
    /// Units physically on hand.
    pub quantity: i64,
    /// Units held against in-flight orders.
    pub reserved_quantity: i64,
    pub low_stock_threshold: i64,
    /// When false, availability checks always succeed.
    pub track_inventory: bool,
    /// When true, reservations succeed even without enough stock.
    pub allow_backorder: bool,
    pub warehouse_location: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_restocked_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    /// Optimistic concurrency token, bumped by the store on every save.
    pub version: u64,
}

impl InventoryRecord {
    /// Create an empty, tracked record with the default threshold.
    pub fn new(tenant_id: TenantId, product_id: ProductId) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            product_id,
            quantity: 0,
            reserved_quantity: 0,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            track_inventory: true,
            allow_backorder: false,
            warehouse_location: None,
            last_restocked_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Set the on-hand quantity.
    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the reserved quantity.
    pub fn with_reserved(mut self, reserved_quantity: i64) -> Self {
        self.reserved_quantity = reserved_quantity;
        self
    }

    /// Set the low-stock threshold.
    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Enable or disable stock tracking.
    pub fn with_tracking(mut self, track_inventory: bool) -> Self {
        self.track_inventory = track_inventory;
        self
    }

    /// Enable or disable backorders.
    pub fn with_backorder(mut self, allow_backorder: bool) -> Self {
        self.allow_backorder = allow_backorder;
        self
    }

    /// Set the warehouse location label.
    pub fn with_warehouse(mut self, location: impl Into<String>) -> Self {
        self.warehouse_location = Some(location.into());
        self
    }

    // ========================================================================
    // DERIVED STATE
    // ========================================================================

    /// Units that can still be promised: `quantity - reserved_quantity`.
    ///
    /// Negative when backorder reservations exceed stock.
    pub fn available_quantity(&self) -> i64 {
        self.quantity.saturating_sub(self.reserved_quantity)
    }

    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.available_quantity() <= self.low_stock_threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.track_inventory && self.available_quantity() <= 0
    }

    // ========================================================================
    // LEDGER OPERATIONS
    // ========================================================================

    /// Whether `n` more units could be reserved under the current policy.
    ///
    /// Always false for a non-positive `n`, matching [`Self::reserve`].
    pub fn can_fulfill(&self, n: i64) -> bool {
        if n <= 0 {
            return false;
        }
        !self.track_inventory || self.allow_backorder || self.available_quantity() >= n
    }

    /// Hold `n` units for an order.
    pub fn reserve(&mut self, n: i64) -> Result<(), InventoryError> {
        require_positive(n)?;
        if !self.can_fulfill(n) {
            return Err(self.insufficient(n, self.available_quantity()));
        }
        self.reserved_quantity = checked_add(self.reserved_quantity, n, "reserved_quantity")?;
        self.touch();
        Ok(())
    }

    /// Give back `n` previously reserved units.
    pub fn release_reservation(&mut self, n: i64) -> Result<(), InventoryError> {
        require_positive(n)?;
        if n > self.reserved_quantity {
            return Err(InventoryError::invalid(
                "quantity",
                format!(
                    "cannot release {} units, only {} reserved",
                    n, self.reserved_quantity
                ),
            ));
        }
        self.reserved_quantity -= n;
        self.touch();
        Ok(())
    }

    /// Remove `n` units of physical stock. Never drives `quantity` negative,
    /// backorder or not.
    pub fn deduct(&mut self, n: i64) -> Result<(), InventoryError> {
        require_positive(n)?;
        if n > self.quantity {
            return Err(self.insufficient(n, self.quantity));
        }
        self.quantity -= n;
        self.touch();
        Ok(())
    }

    /// Add `n` units of physical stock.
    pub fn restock(&mut self, n: i64) -> Result<(), InventoryError> {
        require_positive(n)?;
        self.quantity = checked_add(self.quantity, n, "quantity")?;
        let now = Utc::now();
        self.last_restocked_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Ship `n` reserved units: deduct and release in one step.
    ///
    /// Both preconditions are checked before anything changes, so on error the
    /// record is untouched.
    pub fn fulfill(&mut self, n: i64) -> Result<(), InventoryError> {
        require_positive(n)?;
        if n > self.reserved_quantity {
            return Err(InventoryError::invalid(
                "quantity",
                format!(
                    "cannot fulfill {} units, only {} reserved",
                    n, self.reserved_quantity
                ),
            ));
        }
        if n > self.quantity {
            return Err(self.insufficient(n, self.quantity));
        }
        self.quantity -= n;
        self.reserved_quantity -= n;
        self.touch();
        Ok(())
    }

    // ========================================================================
    // INTEGRITY
    // ========================================================================

    /// Check the structural invariants a record must satisfy to be persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity < 0 {
            return Err(ValidationError::InvalidValue {
                field: "quantity".to_string(),
                reason: format!("must be non-negative, got {}", self.quantity),
            });
        }
        if self.reserved_quantity < 0 {
            return Err(ValidationError::InvalidValue {
                field: "reserved_quantity".to_string(),
                reason: format!("must be non-negative, got {}", self.reserved_quantity),
            });
        }
        if self.low_stock_threshold < 0 {
            return Err(ValidationError::InvalidValue {
                field: "low_stock_threshold".to_string(),
                reason: format!("must be non-negative, got {}", self.low_stock_threshold),
            });
        }
        let may_oversell = !self.track_inventory || self.allow_backorder;
        if self.reserved_quantity > self.quantity && !may_oversell {
            return Err(ValidationError::ConstraintViolation {
                constraint: "reserved_quantity <= quantity".to_string(),
                reason: format!(
                    "reserved {} exceeds quantity {}",
                    self.reserved_quantity, self.quantity
                ),
            });
        }
        Ok(())
    }

    /// Critical structural violations present on this record.
    ///
    /// Unlike [`Self::validate`] this reports every violation, and flags
    /// over-reservation on backorder records too.
    pub fn integrity_issues(&self) -> Vec<InventoryIssue> {
        let mut issues = Vec::new();
        if self.reserved_quantity > self.quantity {
            issues.push(self.issue(
                IssueType::InvalidReservation,
                format!(
                    "reserved quantity {} exceeds quantity {}",
                    self.reserved_quantity, self.quantity
                ),
            ));
        }
        if self.quantity < 0 {
            issues.push(self.issue(
                IssueType::NegativeQuantity,
                format!("quantity is negative: {}", self.quantity),
            ));
        }
        if self.reserved_quantity < 0 {
            issues.push(self.issue(
                IssueType::NegativeReserved,
                format!("reserved quantity is negative: {}", self.reserved_quantity),
            ));
        }
        issues
    }

    /// Stock-level warnings: out of stock, or else low stock.
    pub fn stock_issues(&self) -> Vec<InventoryIssue> {
        let available = self.available_quantity();
        if self.is_out_of_stock() {
            vec![self.issue(
                IssueType::OutOfStock,
                format!("out of stock, available {}", available),
            )]
        } else if self.is_low_stock() {
            vec![self.issue(
                IssueType::LowStock,
                format!(
                    "low stock, available {} at or below threshold {}",
                    available, self.low_stock_threshold
                ),
            )]
        } else {
            Vec::new()
        }
    }

    fn issue(&self, issue_type: IssueType, message: String) -> InventoryIssue {
        InventoryIssue::new(self.tenant_id, self.product_id, issue_type, message)
    }

    fn insufficient(&self, requested: i64, available: i64) -> InventoryError {
        InventoryError::InsufficientStock {
            product_id: self.product_id,
            requested,
            available,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn require_positive(n: i64) -> Result<(), InventoryError> {
    if n <= 0 {
        return Err(InventoryError::invalid(
            "quantity",
            format!("must be positive, got {}", n),
        ));
    }
    Ok(())
}

fn checked_add(current: i64, n: i64, field: &str) -> Result<i64, InventoryError> {
    current
        .checked_add(n)
        .ok_or_else(|| InventoryError::invalid(field, format!("adding {} overflows", n)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use uuid::Uuid;

    fn record(quantity: i64) -> InventoryRecord {
        InventoryRecord::new(Uuid::now_v7(), Uuid::now_v7()).with_quantity(quantity)
    }

    #[test]
    fn test_new_record_defaults() {
        let r = InventoryRecord::new(Uuid::nil(), Uuid::nil());
        assert_eq!(r.quantity, 0);
        assert_eq!(r.reserved_quantity, 0);
        assert_eq!(r.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert!(r.track_inventory);
        assert!(!r.allow_backorder);
        assert_eq!(r.version, 0);
    }

    #[test]
    fn test_reserve_until_low_stock_then_insufficient() {
        let mut r = record(100);

        r.reserve(95).expect("reserve 95 should succeed");
        assert_eq!(r.available_quantity(), 5);
        assert!(r.is_low_stock());
        assert!(!r.is_out_of_stock());

        let err = r.reserve(10).expect_err("only 5 available");
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id: r.product_id,
                requested: 10,
                available: 5,
            }
        );
        assert_eq!(r.reserved_quantity, 95);
    }

    #[test]
    fn test_backorder_reserve_allowed_but_deduct_refused() {
        let mut r = record(0).with_backorder(true);

        r.reserve(20).expect("backorder reservation should succeed");
        assert_eq!(r.available_quantity(), -20);
        assert!(r.is_out_of_stock());

        let err = r.deduct(20).expect_err("deduct is against physical stock");
        assert!(matches!(err, InventoryError::InsufficientStock { available: 0, .. }));
        assert_eq!(r.quantity, 0);
    }

    #[test]
    fn test_untracked_record_always_fulfills() {
        let r = record(0).with_tracking(false);
        assert!(r.can_fulfill(1_000));
        assert!(!r.is_low_stock());
        assert!(!r.is_out_of_stock());
    }

    #[test]
    fn test_non_positive_quantities_rejected() {
        let mut r = record(10);
        for n in [0, -1, i64::MIN] {
            assert!(matches!(r.reserve(n), Err(InventoryError::InvalidArgument { .. })));
            assert!(matches!(
                r.release_reservation(n),
                Err(InventoryError::InvalidArgument { .. })
            ));
            assert!(matches!(r.deduct(n), Err(InventoryError::InvalidArgument { .. })));
            assert!(matches!(r.restock(n), Err(InventoryError::InvalidArgument { .. })));
            assert!(matches!(r.fulfill(n), Err(InventoryError::InvalidArgument { .. })));
            assert!(!r.can_fulfill(n));
        }
    }

    #[test]
    fn test_release_more_than_reserved_is_invalid() {
        let mut r = record(10);
        r.reserve(3).expect("reserve");
        let err = r.release_reservation(4).expect_err("only 3 reserved");
        assert!(matches!(err, InventoryError::InvalidArgument { .. }));
        assert_eq!(r.reserved_quantity, 3);
    }

    #[test]
    fn test_restock_sets_last_restocked_at() {
        let mut r = record(5);
        assert!(r.last_restocked_at.is_none());
        r.restock(7).expect("restock");
        assert_eq!(r.quantity, 12);
        assert!(r.last_restocked_at.is_some());
    }

    #[test]
    fn test_restock_overflow_is_invalid() {
        let mut r = record(i64::MAX);
        assert!(matches!(r.restock(1), Err(InventoryError::InvalidArgument { .. })));
        assert_eq!(r.quantity, i64::MAX);
    }

    #[test]
    fn test_deduct_does_not_touch_reservations() {
        let mut r = record(10);
        r.reserve(4).expect("reserve");
        r.deduct(4).expect("deduct");
        assert_eq!(r.quantity, 6);
        assert_eq!(r.reserved_quantity, 4);
    }

    #[test]
    fn test_fulfill_shrinks_both_fields() {
        let mut r = record(10);
        r.reserve(4).expect("reserve");
        r.fulfill(3).expect("fulfill");
        assert_eq!(r.quantity, 7);
        assert_eq!(r.reserved_quantity, 1);
        assert_eq!(r.available_quantity(), 6);
    }

    #[test]
    fn test_fulfill_is_all_or_nothing() {
        let mut r = record(2).with_backorder(true);
        r.reserve(5).expect("backorder reserve");

        let err = r.fulfill(5).expect_err("only 2 on hand");
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        assert_eq!(r.quantity, 2);
        assert_eq!(r.reserved_quantity, 5);

        let err = r.fulfill(6).expect_err("only 5 reserved");
        assert!(matches!(err, InventoryError::InvalidArgument { .. }));
    }

    #[test]
    fn test_validate_rejects_structural_violations() {
        assert!(record(10).validate().is_ok());
        assert!(record(-1).validate().is_err());
        assert!(record(10).with_reserved(-1).validate().is_err());
        assert!(record(10).with_low_stock_threshold(-5).validate().is_err());
        assert!(record(10).with_reserved(15).validate().is_err());
        assert!(record(10).with_reserved(15).with_backorder(true).validate().is_ok());
        assert!(record(10).with_reserved(15).with_tracking(false).validate().is_ok());
    }

    #[test]
    fn test_untracked_reservation_past_stock_still_validates() {
        let mut r = record(0).with_tracking(false);
        r.reserve(1).expect("untracked records always fulfill");
        assert_eq!(r.available_quantity(), -1);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_integrity_issues_for_corrupted_record() {
        let r = record(10).with_reserved(15);
        let issues = r.integrity_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::InvalidReservation);
        assert_eq!(issues[0].severity, Severity::Critical);
    }

    #[test]
    fn test_integrity_issues_for_negative_fields() {
        let r = record(-3).with_reserved(-1);
        let kinds: Vec<_> = r.integrity_issues().iter().map(|i| i.issue_type).collect();
        assert!(kinds.contains(&IssueType::NegativeQuantity));
        assert!(kinds.contains(&IssueType::NegativeReserved));
        assert!(!kinds.contains(&IssueType::InvalidReservation));
    }

    #[test]
    fn test_stock_issues_prefers_out_of_stock() {
        let out = record(0);
        let issues = out.stock_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::OutOfStock);
        assert_eq!(issues[0].severity, Severity::High);

        let low = record(8);
        assert_eq!(low.stock_issues()[0].issue_type, IssueType::LowStock);

        assert!(record(50).stock_issues().is_empty());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(i64),
        Release(i64),
        Deduct(i64),
        Restock(i64),
        Fulfill(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..50).prop_map(Op::Reserve),
            (1i64..50).prop_map(Op::Release),
            (1i64..50).prop_map(Op::Deduct),
            (1i64..50).prop_map(Op::Restock),
            (1i64..50).prop_map(Op::Fulfill),
        ]
    }

    fn apply(r: &mut InventoryRecord, op: &Op) -> Result<(), InventoryError> {
        match *op {
            Op::Reserve(n) => r.reserve(n),
            Op::Release(n) => r.release_reservation(n),
            Op::Deduct(n) => r.deduct(n),
            Op::Restock(n) => r.restock(n),
            Op::Fulfill(n) => r.fulfill(n),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: reserved stays within [0, quantity] and quantity stays
        /// non-negative across any operation sequence without backorder,
        /// as long as deductions only touch unreserved stock.
        #[test]
        fn prop_reservation_bounds_hold(
            initial in 0i64..200,
            ops in prop::collection::vec(op_strategy(), 0..40),
        ) {
            let mut r = InventoryRecord::new(Uuid::nil(), Uuid::nil()).with_quantity(initial);
            for op in &ops {
                // Deducting reserved units without releasing them is the
                // documented sharp edge; only deduct what is unreserved.
                if let Op::Deduct(n) = op {
                    if *n > r.available_quantity() {
                        continue;
                    }
                }
                let before = r.clone();
                if apply(&mut r, op).is_err() {
                    prop_assert_eq!(&r.quantity, &before.quantity);
                    prop_assert_eq!(&r.reserved_quantity, &before.reserved_quantity);
                }
                prop_assert!(r.quantity >= 0);
                prop_assert!(r.reserved_quantity >= 0);
                prop_assert!(r.reserved_quantity <= r.quantity);
            }
        }

        /// Property: reserve(n) then release_reservation(n) restores the
        /// reserved quantity.
        #[test]
        fn prop_reserve_release_roundtrip(
            quantity in 0i64..1000,
            reserved in 0i64..1000,
            n in 1i64..1000,
        ) {
            let reserved = reserved.min(quantity);
            let mut r = InventoryRecord::new(Uuid::nil(), Uuid::nil())
                .with_quantity(quantity)
                .with_reserved(reserved);
            if r.reserve(n).is_ok() {
                r.release_reservation(n).expect("release what was reserved");
            }
            prop_assert_eq!(r.reserved_quantity, reserved);
        }

        /// Property: restock(n) then deduct(n) restores the quantity.
        #[test]
        fn prop_restock_deduct_roundtrip(quantity in 0i64..1_000_000, n in 1i64..1_000_000) {
            let mut r = InventoryRecord::new(Uuid::nil(), Uuid::nil()).with_quantity(quantity);
            r.restock(n).expect("restock");
            r.deduct(n).expect("deduct what was restocked");
            prop_assert_eq!(r.quantity, quantity);
        }

        /// Property: can_fulfill agrees with reserve for every policy
        /// combination.
        #[test]
        fn prop_can_fulfill_matches_reserve(
            quantity in 0i64..100,
            reserved in 0i64..100,
            n in -5i64..150,
            track in any::<bool>(),
            backorder in any::<bool>(),
        ) {
            let mut r = InventoryRecord::new(Uuid::nil(), Uuid::nil())
                .with_quantity(quantity)
                .with_reserved(reserved.min(quantity))
                .with_tracking(track)
                .with_backorder(backorder);
            let predicted = r.can_fulfill(n);
            prop_assert_eq!(predicted, r.reserve(n).is_ok());
        }
    }
}
