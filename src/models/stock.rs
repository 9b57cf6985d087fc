use rust_decimal::Decimal;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Point-in-time stock quantities for a single product.
///
/// The same shape doubles as a delta: `change` values in a movement record
/// may be negative, while persisted product quantities never are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    /// Boxes not yet run through packaging
    pub unpackaged_boxes: i32,
    /// Boxes that finished packaging
    pub packaged_boxes: i32,
    /// Remaining bulk liquid, in barrels (fractional allowed)
    pub remaining_water: Decimal,
}

impl StockSnapshot {
    pub const ZERO: StockSnapshot = StockSnapshot {
        unpackaged_boxes: 0,
        packaged_boxes: 0,
        remaining_water: Decimal::ZERO,
    };

    pub fn new(unpackaged_boxes: i32, packaged_boxes: i32, remaining_water: Decimal) -> Self {
        Self {
            unpackaged_boxes,
            packaged_boxes,
            remaining_water,
        }
    }

    /// Component-wise sum, yielding the post-movement snapshot.
    pub fn apply(&self, change: &StockSnapshot) -> StockSnapshot {
        StockSnapshot {
            unpackaged_boxes: self.unpackaged_boxes + change.unpackaged_boxes,
            packaged_boxes: self.packaged_boxes + change.packaged_boxes,
            remaining_water: self.remaining_water + change.remaining_water,
        }
    }

    /// Component-wise difference `self - before`, yielding the movement delta.
    pub fn diff(&self, before: &StockSnapshot) -> StockSnapshot {
        StockSnapshot {
            unpackaged_boxes: self.unpackaged_boxes - before.unpackaged_boxes,
            packaged_boxes: self.packaged_boxes - before.packaged_boxes,
            remaining_water: self.remaining_water - before.remaining_water,
        }
    }

    /// Component-wise negation, used to record stock-out deltas.
    pub fn negate(&self) -> StockSnapshot {
        StockSnapshot {
            unpackaged_boxes: -self.unpackaged_boxes,
            packaged_boxes: -self.packaged_boxes,
            remaining_water: -self.remaining_water,
        }
    }

    /// True when every component is >= 0.
    pub fn is_non_negative(&self) -> bool {
        self.unpackaged_boxes >= 0 && self.packaged_boxes >= 0 && self.remaining_water >= Decimal::ZERO
    }

    /// True when `self` can cover `requested` on every component.
    pub fn covers(&self, requested: &StockSnapshot) -> bool {
        self.unpackaged_boxes >= requested.unpackaged_boxes
            && self.packaged_boxes >= requested.packaged_boxes
            && self.remaining_water >= requested.remaining_water
    }

    /// Derived box total persisted on the product row.
    pub fn total_boxes(&self) -> i32 {
        self.unpackaged_boxes + self.packaged_boxes
    }
}

/// Immutable before/after/change triple recorded with every stock movement.
///
/// Stored as a JSON column on the history row; `after` always equals
/// `before.apply(&change)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct MovementDetails {
    pub before: StockSnapshot,
    pub after: StockSnapshot,
    pub change: StockSnapshot,
}

impl MovementDetails {
    /// Build a record from the observed endpoints, deriving the delta.
    pub fn between(before: StockSnapshot, after: StockSnapshot) -> Self {
        Self {
            before,
            after,
            change: after.diff(&before),
        }
    }

    /// Build a record from the starting point and an explicit delta.
    ///
    /// Used where the caller-supplied delta is the authoritative value to
    /// audit (stock-in and stock-out record the request as provided).
    pub fn from_change(before: StockSnapshot, change: StockSnapshot) -> Self {
        Self {
            before,
            after: before.apply(&change),
            change,
        }
    }

    /// The recorded arithmetic holds: `after = before + change`.
    pub fn is_consistent(&self) -> bool {
        self.before.apply(&self.change) == self.after
    }
}
