use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::wine;
use crate::errors::ServiceError;
use crate::services::wine::{
    CreateWineRequest, PackageRequest, StockMovementRequest, UpdateStockRequest,
};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct WineListQuery {
    /// Case-insensitive substring matched against name and type
    pub search: Option<String>,
}

pub fn wine_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_wines).post(create_wine))
        .route(
            "/:id",
            get(get_wine).put(update_stock).delete(delete_wine),
        )
        .route("/:id/stock-in", put(stock_in))
        .route("/:id/stock-out", put(stock_out))
        .route("/:id/package", put(package))
}

/// List in-stock products
#[utoipa::path(
    get,
    path = "/api/v1/wine",
    params(WineListQuery),
    responses(
        (status = 200, description = "In-stock products, most recently updated first"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn list_wines(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<WineListQuery>,
) -> Result<Json<ApiResponse<Vec<wine::Model>>>, ServiceError> {
    let wines = state.wine_service.list_wines(query.search.as_deref()).await?;
    Ok(Json(ApiResponse::success(wines)))
}

/// Get one product
#[utoipa::path(
    get,
    path = "/api/v1/wine/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found", body = wine::Model),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn get_wine(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<wine::Model>>, ServiceError> {
    let wine = state.wine_service.get_wine(id).await?;
    Ok(Json(ApiResponse::success(wine)))
}

/// Register a new product (initial stock-in)
#[utoipa::path(
    post,
    path = "/api/v1/wine",
    request_body = CreateWineRequest,
    responses(
        (status = 201, description = "Product registered"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn create_wine(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateWineRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Value>>), ServiceError> {
    let outcome = state
        .wine_service
        .create_wine(request, &user.username)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(
            ApiResponse::success(json!({ "wine": outcome.wine }))
                .with_message("wine registered".to_string()),
        ),
    ))
}

/// Add stock to a product
#[utoipa::path(
    put,
    path = "/api/v1/wine/{id}/stock-in",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = StockMovementRequest,
    responses(
        (status = 200, description = "Stock added"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn stock_in(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<StockMovementRequest>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let outcome = state
        .wine_service
        .stock_in(id, request, &user.username)
        .await?;
    Ok(Json(
        ApiResponse::success(json!({ "wine": outcome.wine }))
            .with_message("stock-in complete".to_string()),
    ))
}

/// Remove stock from a product
#[utoipa::path(
    put,
    path = "/api/v1/wine/{id}/stock-out",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = StockMovementRequest,
    responses(
        (status = 200, description = "Stock removed"),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn stock_out(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<StockMovementRequest>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let outcome = state
        .wine_service
        .stock_out(id, request, &user.username)
        .await?;
    Ok(Json(
        ApiResponse::success(json!({ "wine": outcome.wine }))
            .with_message("stock-out complete".to_string()),
    ))
}

/// Correct stock figures to absolute values
#[utoipa::path(
    put,
    path = "/api/v1/wine/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateStockRequest,
    responses(
        (status = 200, description = "Stock corrected"),
        (status = 400, description = "Invalid quantities", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn update_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStockRequest>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let outcome = state
        .wine_service
        .update_stock(id, request, &user.username)
        .await?;
    Ok(Json(
        ApiResponse::success(json!({ "wine": outcome.wine }))
            .with_message("stock updated".to_string()),
    ))
}

/// Convert unpackaged boxes into packaged ones
#[utoipa::path(
    put,
    path = "/api/v1/wine/{id}/package",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = PackageRequest,
    responses(
        (status = 200, description = "Packaging recorded"),
        (status = 400, description = "Amount out of range", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn package(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PackageRequest>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let packaged = request.packaged_boxes;
    let outcome = state
        .wine_service
        .package(id, request, &user.username)
        .await?;
    Ok(Json(
        ApiResponse::success(json!({ "wine": outcome.wine, "packaged": packaged }))
            .with_message("packaging complete".to_string()),
    ))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/v1/wine/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "wine"
)]
pub async fn delete_wine(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    state.wine_service.delete_wine(id, &user.username).await?;
    Ok(Json(
        ApiResponse::success(json!({})).with_message("wine deleted".to_string()),
    ))
}
