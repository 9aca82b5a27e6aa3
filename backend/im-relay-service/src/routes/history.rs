use crate::config::MAX_HISTORY_PAGE_LIMIT;
use crate::error::AppError;
use crate::models::message::{HistoryCursor, StoredHistoryRecord};
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Opaque cursor from a previous page's `nextCursor`
    pub cursor: Option<String>,
    /// Only records sent strictly before this epoch-millis timestamp
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

impl HistoryQuery {
    fn position(&self) -> Result<Option<HistoryCursor>, AppError> {
        match (&self.cursor, self.before) {
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "cursor and before are mutually exclusive".into(),
            )),
            (Some(raw), None) => HistoryCursor::decode(raw)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("invalid cursor: {raw}"))),
            (None, Some(ms)) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(|t| Some(HistoryCursor::before_time(t)))
                .ok_or_else(|| AppError::BadRequest(format!("invalid before: {ms}"))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub conversation_id: String,
    pub records: Vec<StoredHistoryRecord>,
    /// Cursor for the next (older) page, absent on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Newest-first page of a conversation's durable history.
///
/// **Endpoint**: `GET /api/v1/conversations/{conversation_id}/history`
#[get("/api/v1/conversations/{conversation_id}/history")]
pub async fn get_history(
    state: web::Data<AppState>,
    conversation_id: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = conversation_id.into_inner();
    let limit = query.limit.unwrap_or(state.config.history_page_limit);
    if !(1..=MAX_HISTORY_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_HISTORY_PAGE_LIMIT}"
        )));
    }
    let before = query.position()?;

    let records = state
        .history
        .list_history(&conversation_id, before, limit)
        .await?;

    let next_cursor = if records.len() as i64 == limit {
        records.last().map(|r| HistoryCursor::after(r).encode())
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(HistoryPage {
        conversation_id,
        records,
        next_cursor,
    }))
}
