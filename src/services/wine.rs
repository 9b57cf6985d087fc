use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::history::{self, StockAction};
use crate::entities::wine::{self, Entity as Wine, WineStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{MovementDetails, StockSnapshot};

const DEFAULT_PACKAGE_REMARK: &str = "packaging run";

/// Register a new product, recording its initial quantities as a stock-in.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWineRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "type is required"))]
    #[serde(rename = "type")]
    pub wine_type: String,
    #[serde(default)]
    pub unpackaged_boxes: i32,
    #[serde(default)]
    pub packaged_boxes: i32,
    #[serde(default)]
    pub remaining_water: Decimal,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Quantity deltas for stock-in and stock-out. All fields default to zero.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    #[serde(default)]
    pub unpackaged_boxes: i32,
    #[serde(default)]
    pub packaged_boxes: i32,
    #[serde(default)]
    pub remaining_water: Decimal,
    #[serde(default)]
    pub remark: Option<String>,
}

impl StockMovementRequest {
    fn as_snapshot(&self) -> StockSnapshot {
        StockSnapshot::new(self.unpackaged_boxes, self.packaged_boxes, self.remaining_water)
    }
}

/// Absolute quantity correction. Absent fields keep their current values.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockRequest {
    pub unpackaged_boxes: Option<i32>,
    pub packaged_boxes: Option<i32>,
    pub remaining_water: Option<Decimal>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Convert unpackaged boxes into packaged ones, optionally correcting the
/// remaining liquid reading taken during the run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageRequest {
    #[serde(default)]
    pub packaged_boxes: i32,
    pub remaining_water: Option<Decimal>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Result of an accepted mutation: the updated product and its audit entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub wine: wine::Model,
    pub entry: history::Model,
}

/// Everything a movement changes about a product, computed up front so the
/// persistence step is shared by all mutation paths.
struct MovementPlan {
    after: StockSnapshot,
    change: StockSnapshot,
    /// `None` keeps the product's current status.
    status: Option<WineStatus>,
    action: StockAction,
    remark: String,
}

/// Service for product stock operations.
///
/// Every mutation persists the product row and its audit entry in one
/// transaction, guarded by an optimistic version check on the product.
#[derive(Clone)]
pub struct WineService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl WineService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Register a new product. The initial quantities are audited as a
    /// stock-in movement from an all-zero baseline.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_wine(
        &self,
        request: CreateWineRequest,
        operator: &str,
    ) -> Result<MutationOutcome, ServiceError> {
        request.validate()?;

        let initial = StockSnapshot::new(
            request.unpackaged_boxes,
            request.packaged_boxes,
            request.remaining_water,
        );
        if !initial.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "stock quantities cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let wine = wine::ActiveModel {
            id: Set(id),
            name: Set(request.name.trim().to_string()),
            wine_type: Set(request.wine_type.trim().to_string()),
            unpackaged_boxes: Set(initial.unpackaged_boxes),
            packaged_boxes: Set(initial.packaged_boxes),
            remaining_water: Set(initial.remaining_water),
            total_stock: Set(initial.total_boxes()),
            status: Set(WineStatus::InStock),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let entry = insert_history(
            &txn,
            &wine,
            StockAction::StockIn,
            MovementDetails::from_change(StockSnapshot::ZERO, initial),
            request.remark.unwrap_or_default(),
            operator,
        )
        .await?;

        txn.commit().await?;

        self.publish(Event::WineCreated {
            wine_id: wine.id,
            name: wine.name.clone(),
            operator: operator.to_string(),
        })
        .await;

        Ok(MutationOutcome { wine, entry })
    }

    /// Add stock to an existing product. Receiving stock always puts the
    /// product back in the in-stock state.
    #[instrument(skip(self, request))]
    pub async fn stock_in(
        &self,
        id: Uuid,
        request: StockMovementRequest,
        operator: &str,
    ) -> Result<MutationOutcome, ServiceError> {
        let delta = request.as_snapshot();
        if !delta.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "stock-in quantities cannot be negative".to_string(),
            ));
        }

        self.apply_movement(id, operator, |current| {
            Ok(MovementPlan {
                after: current.apply(&delta),
                change: delta,
                status: Some(WineStatus::InStock),
                action: StockAction::StockIn,
                remark: request.remark.clone().unwrap_or_default(),
            })
        })
        .await
    }

    /// Remove stock from a product. Fails without side effect when any of
    /// the three quantities cannot cover the request.
    #[instrument(skip(self, request))]
    pub async fn stock_out(
        &self,
        id: Uuid,
        request: StockMovementRequest,
        operator: &str,
    ) -> Result<MutationOutcome, ServiceError> {
        let requested = request.as_snapshot();
        if !requested.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "stock-out quantities cannot be negative".to_string(),
            ));
        }

        self.apply_movement(id, operator, |current| {
            if !current.covers(&requested) {
                return Err(ServiceError::InsufficientStock(
                    "requested quantities exceed current stock".to_string(),
                ));
            }
            Ok(MovementPlan {
                after: current.apply(&requested.negate()),
                change: requested.negate(),
                status: None,
                action: StockAction::StockOut,
                remark: request.remark.clone().unwrap_or_default(),
            })
        })
        .await
    }

    /// Absolute correction of the stock figures. Absent fields keep their
    /// current values; the audited change is the resulting difference.
    #[instrument(skip(self, request))]
    pub async fn update_stock(
        &self,
        id: Uuid,
        request: UpdateStockRequest,
        operator: &str,
    ) -> Result<MutationOutcome, ServiceError> {
        self.apply_movement(id, operator, |current| {
            let after = StockSnapshot::new(
                request.unpackaged_boxes.unwrap_or(current.unpackaged_boxes),
                request.packaged_boxes.unwrap_or(current.packaged_boxes),
                request.remaining_water.unwrap_or(current.remaining_water),
            );
            if !after.is_non_negative() {
                return Err(ServiceError::ValidationError(
                    "stock quantities cannot be negative".to_string(),
                ));
            }
            Ok(MovementPlan {
                change: after.diff(&current),
                after,
                status: None,
                action: StockAction::UpdateStock,
                remark: request.remark.clone().unwrap_or_default(),
            })
        })
        .await
    }

    /// Run packaging: move boxes from unpackaged to packaged, optionally
    /// recording a fresh remaining-liquid reading.
    #[instrument(skip(self, request))]
    pub async fn package(
        &self,
        id: Uuid,
        request: PackageRequest,
        operator: &str,
    ) -> Result<MutationOutcome, ServiceError> {
        let amount = request.packaged_boxes;
        if amount <= 0 {
            return Err(ServiceError::ValidationError(
                "packaging amount must be greater than zero".to_string(),
            ));
        }
        if let Some(water) = request.remaining_water {
            if water < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "remaining water cannot be negative".to_string(),
                ));
            }
        }

        self.apply_movement_with_status(id, operator, |current, status| {
            if status == WineStatus::OutOfStock {
                return Err(ServiceError::InvalidOperation(
                    "product is out of stock and cannot be packaged".to_string(),
                ));
            }
            if amount > current.unpackaged_boxes {
                return Err(ServiceError::ValidationError(format!(
                    "packaging amount cannot exceed unpackaged boxes ({})",
                    current.unpackaged_boxes
                )));
            }

            let new_water = request.remaining_water.unwrap_or(current.remaining_water);
            let after = StockSnapshot::new(
                current.unpackaged_boxes - amount,
                current.packaged_boxes + amount,
                new_water,
            );
            // The liquid delta is only audited when a new reading was
            // actually supplied.
            let change = StockSnapshot::new(
                -amount,
                amount,
                match request.remaining_water {
                    Some(_) => new_water - current.remaining_water,
                    None => Decimal::ZERO,
                },
            );
            Ok(MovementPlan {
                after,
                change,
                status: None,
                action: StockAction::UpdateStock,
                remark: request
                    .remark
                    .clone()
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| DEFAULT_PACKAGE_REMARK.to_string()),
            })
        })
        .await
    }

    /// Delete a product. Its audit entries stay behind under the
    /// denormalized name.
    #[instrument(skip(self))]
    pub async fn delete_wine(&self, id: Uuid, operator: &str) -> Result<(), ServiceError> {
        let wine = Wine::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("wine {} not found", id)))?;

        wine.delete(&*self.db).await?;

        self.publish(Event::WineDeleted {
            wine_id: id,
            operator: operator.to_string(),
        })
        .await;

        Ok(())
    }

    /// List in-stock products, optionally filtered by a case-insensitive
    /// substring over name and type. Most recently touched first.
    pub async fn list_wines(&self, search: Option<&str>) -> Result<Vec<wine::Model>, ServiceError> {
        let mut query = Wine::find().filter(wine::Column::Status.eq(WineStatus::InStock));

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((wine::Entity, wine::Column::Name))))
                            .like(pattern.as_str()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((wine::Entity, wine::Column::WineType))))
                            .like(pattern.as_str()),
                    ),
            );
        }

        let wines = query
            .order_by_desc(wine::Column::UpdatedAt)
            .all(&*self.db)
            .await?;
        Ok(wines)
    }

    /// Fetch a single product by id.
    pub async fn get_wine(&self, id: Uuid) -> Result<wine::Model, ServiceError> {
        Wine::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("wine {} not found", id)))
    }

    /// Shared mutation path: load inside a transaction, let the caller plan
    /// the movement from the current snapshot, then persist the product and
    /// its audit entry together.
    async fn apply_movement<F>(
        &self,
        id: Uuid,
        operator: &str,
        plan: F,
    ) -> Result<MutationOutcome, ServiceError>
    where
        F: FnOnce(StockSnapshot) -> Result<MovementPlan, ServiceError>,
    {
        self.apply_movement_with_status(id, operator, |current, _status| plan(current))
            .await
    }

    async fn apply_movement_with_status<F>(
        &self,
        id: Uuid,
        operator: &str,
        plan: F,
    ) -> Result<MutationOutcome, ServiceError>
    where
        F: FnOnce(StockSnapshot, WineStatus) -> Result<MovementPlan, ServiceError>,
    {
        let txn = self.db.begin().await?;

        let wine = Wine::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("wine {} not found", id)))?;

        let before = wine.snapshot();
        let plan = plan(before, wine.status)?;

        debug_assert_eq!(before.apply(&plan.change), plan.after);

        if !plan.after.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "operation would drive stock negative".to_string(),
            ));
        }

        let now = Utc::now();
        let read_version = wine.version;
        let new_status = plan.status.unwrap_or(wine.status);

        let pending = wine::ActiveModel {
            unpackaged_boxes: Set(plan.after.unpackaged_boxes),
            packaged_boxes: Set(plan.after.packaged_boxes),
            remaining_water: Set(plan.after.remaining_water),
            total_stock: Set(plan.after.total_boxes()),
            status: Set(new_status),
            version: Set(read_version + 1),
            updated_at: Set(now),
            ..Default::default()
        };

        // Optimistic concurrency: the update only lands if nobody else
        // bumped the version since our read.
        let result = Wine::update_many()
            .set(pending)
            .filter(wine::Column::Id.eq(id))
            .filter(wine::Column::Version.eq(read_version))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            warn!(wine_id = %id, "concurrent modification detected");
            return Err(ServiceError::Conflict(
                "the product was modified concurrently, please retry".to_string(),
            ));
        }

        let updated = wine::Model {
            unpackaged_boxes: plan.after.unpackaged_boxes,
            packaged_boxes: plan.after.packaged_boxes,
            remaining_water: plan.after.remaining_water,
            total_stock: plan.after.total_boxes(),
            status: new_status,
            version: read_version + 1,
            updated_at: now,
            ..wine
        };

        let entry = insert_history(
            &txn,
            &updated,
            plan.action,
            MovementDetails {
                before,
                after: plan.after,
                change: plan.change,
            },
            plan.remark,
            operator,
        )
        .await?;

        txn.commit().await?;

        self.publish(Event::StockMoved {
            wine_id: updated.id,
            action: entry.action,
            change: entry.details.change,
            operator: operator.to_string(),
        })
        .await;

        Ok(MutationOutcome { wine: updated, entry })
    }

    async fn publish(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to publish event");
        }
    }
}

async fn insert_history(
    txn: &DatabaseTransaction,
    wine: &wine::Model,
    action: StockAction,
    details: MovementDetails,
    remark: String,
    operator: &str,
) -> Result<history::Model, ServiceError> {
    let entry = history::ActiveModel {
        id: Set(Uuid::new_v4()),
        wine_id: Set(wine.id),
        wine_name: Set(wine.name.clone()),
        action: Set(action),
        details: Set(details),
        remark: Set(remark),
        operator: Set(operator.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await?;

    Ok(entry)
}
