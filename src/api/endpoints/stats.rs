//! `GET /api/stats?start=&end=`: aggregation snapshot.
//!
//! Both bounds are RFC 3339 timestamps. `end` defaults to now and `start`
//! to thirty days before `end`.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::aggregation::{self, Snapshot};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;

const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct StatsQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

pub async fn snapshot(
    State(ctx): State<ApiContext>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Snapshot>, ApiError> {
    let now = Utc::now();
    let end = query.end.unwrap_or(now);
    let start = query.start.unwrap_or(end - Duration::days(DEFAULT_WINDOW_DAYS));
    let snapshot = ctx
        .run(move |conn, core| aggregation::snapshot(conn, start, end, core.day_offset(), now))
        .await?;
    Ok(Json(snapshot))
}
