//! Recommendation endpoints.
//!
//! - `POST /api/recommendations`: verifies the diagnosis and dispatches a task
//! - `GET /api/recommendations?page=`
//! - `GET /api/recommendations/:id`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery};
use crate::authorization::Actor;
use crate::models::{Page, Recommendation};
use crate::recommendation::{self, CreateRecommendation, RecommendationWithTask};

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<CreateRecommendation>,
) -> Result<(StatusCode, Json<RecommendationWithTask>), ApiError> {
    let created = ctx
        .run(move |conn, _| recommendation::create(conn, &actor, &input, chrono::Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Recommendation>>, ApiError> {
    let page = query.request();
    let listing = ctx.run(move |conn, _| recommendation::list(conn, page)).await?;
    Ok(Json(listing))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<Recommendation>, ApiError> {
    let found = ctx.run(move |conn, _| recommendation::get(conn, id)).await?;
    Ok(Json(found))
}
