use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{AuthError, AuthUser};
use crate::entities::history::{self, StockAction};
use crate::errors::ServiceError;
use crate::services::history::{ActionSummary, HistoryFilter, HistoryPage};
use crate::{ApiResponse, AppState};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct HistoryListQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Action filter; "all" or absent selects every action
    pub action: Option<String>,
    /// Case-insensitive substring matched against the product name
    pub search: Option<String>,
    /// Inclusive range start, YYYY-MM-DD
    pub start_date: Option<String>,
    /// Inclusive range end, YYYY-MM-DD (covers the whole day)
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ClearAllRequest {
    /// The acting administrator's password, re-entered as confirmation
    pub password: String,
}

pub fn history_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_history))
        .route("/stats/summary", get(summary))
        .route("/clear-all", delete(clear_all))
        .route("/:id", get(get_history))
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ServiceError::ValidationError(format!("{} must be formatted YYYY-MM-DD", field)))
}

fn parse_optional_date(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<NaiveDate>, ServiceError> {
    raw.map(|value| parse_date(value, field)).transpose()
}

fn parse_action(raw: Option<&str>) -> Result<Option<StockAction>, ServiceError> {
    match raw {
        None | Some("all") | Some("") => Ok(None),
        Some(value) => StockAction::parse(value)
            .map(Some)
            .ok_or_else(|| ServiceError::ValidationError(format!("unknown action '{}'", value))),
    }
}

/// Paginated audit log listing
#[utoipa::path(
    get,
    path = "/api/v1/history",
    params(HistoryListQuery),
    responses(
        (status = 200, description = "One page of audit entries"),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "history"
)]
pub async fn list_history(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<HistoryListQuery>,
) -> Result<Json<ApiResponse<HistoryPage>>, ServiceError> {
    let filter = HistoryFilter {
        action: parse_action(query.action.as_deref())?,
        wine_name: query.search,
        start_date: parse_optional_date(query.start_date.as_deref(), "startDate")?,
        end_date: parse_optional_date(query.end_date.as_deref(), "endDate")?,
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(0),
    };

    let page = state.history_service.list(filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Single audit entry
#[utoipa::path(
    get,
    path = "/api/v1/history/{id}",
    params(("id" = Uuid, Path, description = "Audit entry id")),
    responses(
        (status = 200, description = "Entry found", body = history::Model),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "history"
)]
pub async fn get_history(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<history::Model>>, ServiceError> {
    let entry = state.history_service.get(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// Per-action aggregation
#[utoipa::path(
    get,
    path = "/api/v1/history/stats/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Counts and latest timestamps per action"),
        (status = 400, description = "Invalid date filter", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "history"
)]
pub async fn summary(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<Vec<ActionSummary>>>, ServiceError> {
    let start = parse_optional_date(query.start_date.as_deref(), "startDate")?;
    let end = parse_optional_date(query.end_date.as_deref(), "endDate")?;

    let stats = state.history_service.summary(start, end).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Wipe the audit log. Admin role plus password confirmation required.
#[utoipa::path(
    delete,
    path = "/api/v1/history/clear-all",
    request_body = ClearAllRequest,
    responses(
        (status = 200, description = "Audit log cleared"),
        (status = 400, description = "Password missing or incorrect", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller is not an administrator", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "history"
)]
pub async fn clear_all(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ClearAllRequest>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "only administrators may clear the audit log".to_string(),
        ));
    }
    if request.password.is_empty() {
        return Err(ServiceError::ValidationError(
            "password confirmation is required".to_string(),
        ));
    }

    state
        .auth_service
        .verify_password_for(user.user_id, &request.password)
        .await
        .map_err(|err| match err {
            AuthError::InvalidCredentials => {
                ServiceError::ValidationError("password is incorrect".to_string())
            }
            other => ServiceError::AuthError(other.to_string()),
        })?;

    let deleted = state.history_service.clear_all(&user.username).await?;
    Ok(Json(
        ApiResponse::success(json!({ "deletedCount": deleted }))
            .with_message("history cleared".to_string()),
    ))
}
