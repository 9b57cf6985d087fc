use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::StockSnapshot;

/// Stock ledger row for one wine product.
///
/// `total_stock` is derived from the two box counts and recomputed by every
/// mutation path before the row is saved; it is never accepted from a caller.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "wines")]
#[serde(rename_all = "camelCase")]
#[schema(as = Wine)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub wine_type: String,
    /// Boxes not yet run through packaging
    pub unpackaged_boxes: i32,
    /// Boxes that finished packaging
    pub packaged_boxes: i32,
    /// Remaining bulk liquid in barrels
    pub remaining_water: Decimal,
    /// Derived: `unpackaged_boxes + packaged_boxes`
    pub total_stock: i32,
    pub status: WineStatus,
    /// Optimistic concurrency token, bumped on every save
    #[serde(skip_serializing)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum WineStatus {
    #[sea_orm(string_value = "in_stock")]
    InStock,
    #[sea_orm(string_value = "out_of_stock")]
    OutOfStock,
}

impl Model {
    /// Current quantities as a value snapshot, for movement bookkeeping.
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            unpackaged_boxes: self.unpackaged_boxes,
            packaged_boxes: self.packaged_boxes,
            remaining_water: self.remaining_water,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
