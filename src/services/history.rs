use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::history::{self, Entity as History, StockAction};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

/// Filters for the audit log listing. Dates are calendar days; the range is
/// inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub action: Option<StockAction>,
    pub wine_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: u64,
    pub limit: u64,
}

/// One page of audit entries plus pagination bookkeeping.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub histories: Vec<history::Model>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// Per-action aggregate over the audit log.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub action: String,
    pub action_name: String,
    pub count: i64,
    pub latest_operation: Option<DateTime<Utc>>,
}

#[derive(Debug, FromQueryResult)]
struct ActionAggregateRow {
    action: StockAction,
    count: i64,
    latest: Option<DateTime<Utc>>,
}

/// Read and administrative access to the stock movement audit log.
#[derive(Clone)]
pub struct HistoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl HistoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// List audit entries, newest first, with optional action, name and
    /// date-range filters.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: HistoryFilter) -> Result<HistoryPage, ServiceError> {
        let page = filter.page.max(1);
        let limit = match filter.limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };

        let mut condition = Condition::all();
        if let Some(action) = filter.action {
            condition = condition.add(history::Column::Action.eq(action));
        }
        if let Some(term) = filter.wine_name.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col((
                    history::Entity,
                    history::Column::WineName,
                ))))
                .like(pattern.as_str()),
            );
        }
        condition = add_date_range(condition, filter.start_date, filter.end_date);

        let paginator = History::find()
            .filter(condition)
            .order_by_desc(history::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let histories = paginator.fetch_page(page - 1).await?;

        Ok(HistoryPage {
            histories,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
            },
        })
    }

    /// Fetch a single audit entry by id.
    pub async fn get(&self, id: Uuid) -> Result<history::Model, ServiceError> {
        History::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("history entry {} not found", id)))
    }

    /// Per-action counts and latest timestamps over the optionally
    /// date-filtered log.
    #[instrument(skip(self))]
    pub async fn summary(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<ActionSummary>, ServiceError> {
        let condition = add_date_range(Condition::all(), start_date, end_date);

        let rows = History::find()
            .select_only()
            .column(history::Column::Action)
            .column_as(history::Column::Id.count(), "count")
            .column_as(history::Column::CreatedAt.max(), "latest")
            .filter(condition)
            .group_by(history::Column::Action)
            .into_model::<ActionAggregateRow>()
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ActionSummary {
                action: row.action.as_str().to_string(),
                action_name: row.action.display_name().to_string(),
                count: row.count,
                latest_operation: row.latest,
            })
            .collect())
    }

    /// Delete every audit entry and report how many were removed. Role and
    /// password confirmation are enforced by the caller before this runs.
    #[instrument(skip(self))]
    pub async fn clear_all(&self, operator: &str) -> Result<u64, ServiceError> {
        let result = History::delete_many().exec(&*self.db).await?;
        let deleted = result.rows_affected;

        if let Err(e) = self
            .event_sender
            .send(Event::HistoryCleared {
                deleted_count: deleted,
                operator: operator.to_string(),
            })
            .await
        {
            warn!(error = %e, "failed to publish event");
        }

        Ok(deleted)
    }
}

/// Apply an inclusive calendar-day range to a condition. The end bound
/// covers the whole end day, so a strict upper bound at the next midnight
/// is used.
fn add_date_range(
    mut condition: Condition,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Condition {
    if let Some(start) = start_date {
        let from = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
        condition = condition.add(history::Column::CreatedAt.gte(from));
    }
    if let Some(end) = end_date {
        let until = Utc.from_utc_datetime(&(end.and_time(NaiveTime::MIN) + chrono::Duration::days(1)));
        condition = condition.add(history::Column::CreatedAt.lt(until));
    }
    condition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(21u64.div_ceil(10), 3);
        assert_eq!(20u64.div_ceil(10), 2);
        assert_eq!(0u64.div_ceil(10), 0);
    }

    #[test]
    fn date_range_covers_whole_end_day() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let until = Utc.from_utc_datetime(&(end.and_time(NaiveTime::MIN) + chrono::Duration::days(1)));
        let last_moment = Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap();
        assert!(last_moment < until);
        assert!(next_day >= until);
    }
}
