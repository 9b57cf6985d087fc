use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::MovementDetails;

/// Append-only audit record for one stock movement.
///
/// `wine_name` is denormalized so the entry stays meaningful after the
/// product itself is deleted. Rows are never updated; the only delete path
/// is the administrative bulk clear.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "stock_history")]
#[serde(rename_all = "camelCase")]
#[schema(as = StockHistory)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wine_id: Uuid,
    pub wine_name: String,
    pub action: StockAction,
    pub details: MovementDetails,
    pub remark: String,
    pub operator: String,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    #[sea_orm(string_value = "stock_in")]
    StockIn,
    #[sea_orm(string_value = "stock_out")]
    StockOut,
    #[sea_orm(string_value = "update_stock")]
    UpdateStock,
}

impl StockAction {
    /// Wire value used in query parameters and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::StockIn => "stock_in",
            StockAction::StockOut => "stock_out",
            StockAction::UpdateStock => "update_stock",
        }
    }

    /// Human-readable label for summary views.
    pub fn display_name(&self) -> &'static str {
        match self {
            StockAction::StockIn => "Stock In",
            StockAction::StockOut => "Stock Out",
            StockAction::UpdateStock => "Stock Update",
        }
    }

    /// Parse the wire value; `None` for anything unknown.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stock_in" => Some(StockAction::StockIn),
            "stock_out" => Some(StockAction::StockOut),
            "update_stock" => Some(StockAction::UpdateStock),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
