//! Diagnosis endpoints.
//!
//! - `POST /api/diagnoses`: intake from the inference pipeline
//! - `GET /api/diagnoses?page=`: newest first, 10 per page
//! - `GET /api/diagnoses/:id`
//! - `POST /api/diagnoses/:id/relabel`
//! - `POST /api/diagnoses/:id/recreate`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery};
use crate::authorization::Actor;
use crate::ledger;
use crate::models::{Diagnosis, DiagnosisView, NewDiagnosis, Page};

#[derive(Deserialize)]
pub struct RelabelBody {
    pub disease_id: i64,
}

#[derive(Deserialize)]
pub struct RecreateBody {
    pub model: String,
}

pub async fn submit(
    State(ctx): State<ApiContext>,
    Json(input): Json<NewDiagnosis>,
) -> Result<(StatusCode, Json<Diagnosis>), ApiError> {
    let diagnosis = ctx
        .run(move |conn, _| ledger::submit(conn, &input, chrono::Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(diagnosis)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<DiagnosisView>>, ApiError> {
    let page = query.page_number();
    let listing = ctx.run(move |conn, _| ledger::list(conn, page)).await?;
    Ok(Json(listing))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<Diagnosis>, ApiError> {
    let diagnosis = ctx.run(move |conn, _| ledger::get(conn, id)).await?;
    Ok(Json(diagnosis))
}

pub async fn relabel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(body): Json<RelabelBody>,
) -> Result<Json<Diagnosis>, ApiError> {
    let diagnosis = ctx
        .run(move |conn, _| ledger::relabel(conn, &actor, id, body.disease_id, chrono::Utc::now()))
        .await?;
    Ok(Json(diagnosis))
}

/// Runs inference, so it can take as long as the inference timeout.
pub async fn recreate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i64>,
    Json(body): Json<RecreateBody>,
) -> Result<(StatusCode, Json<Diagnosis>), ApiError> {
    let diagnosis = ctx
        .run(move |conn, core| {
            let engine = core.inference();
            ledger::recreate(conn, &actor, id, &body.model, engine.as_ref(), chrono::Utc::now())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(diagnosis)))
}
