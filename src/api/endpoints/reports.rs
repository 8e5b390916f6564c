//! Report endpoints.
//!
//! - `POST /api/reports`: snapshot a period and persist it
//! - `GET /api/reports?page=`: own reports; administrators see all
//! - `GET /api/reports/:id`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery};
use crate::authorization::Actor;
use crate::models::{Page, Report};
use crate::reports::{self, ReportRequest};

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let report = ctx
        .run(move |conn, core| {
            reports::generate_report(
                conn,
                &actor,
                core.reports_dir(),
                &request,
                core.day_offset(),
                chrono::Utc::now(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Report>>, ApiError> {
    let page = query.request();
    let listing = ctx.run(move |conn, _| reports::list_reports(conn, &actor, page)).await?;
    Ok(Json(listing))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
) -> Result<Json<Report>, ApiError> {
    let report = ctx.run(move |conn, _| reports::get_report(conn, &actor, id)).await?;
    Ok(Json(report))
}
