//! Task endpoints.
//!
//! - `GET /api/tasks?scope=mine|all&filter=pending|overdue|closed|all&page=`
//! - `GET /api/tasks/:id`
//! - `POST /api/tasks/:id/status`

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::dispatch;
use crate::models::enums::{TaskFilter, TaskScope, TaskStatus};
use crate::models::{Page, PageRequest, Task};

#[derive(Deserialize)]
pub struct TaskListQuery {
    pub scope: Option<TaskScope>,
    pub filter: Option<TaskFilter>,
    pub page: Option<u32>,
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: TaskStatus,
    /// Status the caller last observed; a mismatch is a 409.
    #[serde(default)]
    pub expected_status: Option<TaskStatus>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Page<Task>>, ApiError> {
    let scope = query.scope.unwrap_or(TaskScope::Mine);
    let filter = query.filter.unwrap_or(TaskFilter::All);
    let page = PageRequest::new(query.page.unwrap_or(1), DEFAULT_PAGE_SIZE);
    let listing = ctx
        .run(move |conn, _| dispatch::list(conn, &actor, scope, filter, page, chrono::Utc::now()))
        .await?;
    Ok(Json(listing))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    let task = ctx.run(move |conn, _| dispatch::get(conn, &actor, id)).await?;
    Ok(Json(task))
}

pub async fn set_status(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Task>, ApiError> {
    let task = ctx
        .run(move |conn, _| {
            dispatch::set_status(
                conn,
                &actor,
                id,
                body.status,
                body.expected_status,
                chrono::Utc::now(),
            )
        })
        .await?;
    Ok(Json(task))
}
