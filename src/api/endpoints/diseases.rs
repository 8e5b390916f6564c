//! Catalog endpoints.
//!
//! - `GET /api/diseases`
//! - `POST /api/diseases`: agronomist / administrator
//! - `GET /api/diseases/:id/treatments`
//! - `GET /api/operators`: assignable operators

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::Actor;
use crate::catalog::{self, NewDisease};
use crate::models::{Disease, Treatment, User};

pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Disease>>, ApiError> {
    let diseases = ctx.run(|conn, _| catalog::list_diseases(conn)).await?;
    Ok(Json(diseases))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewDisease>,
) -> Result<(StatusCode, Json<Disease>), ApiError> {
    let disease = ctx
        .run(move |conn, _| catalog::add_disease(conn, &actor, &input, chrono::Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(disease)))
}

pub async fn treatments(
    State(ctx): State<ApiContext>,
    Path(disease_id): Path<i64>,
) -> Result<Json<Vec<Treatment>>, ApiError> {
    let treatments = ctx
        .run(move |conn, _| catalog::treatments_for(conn, disease_id))
        .await?;
    Ok(Json(treatments))
}

pub async fn operators(State(ctx): State<ApiContext>) -> Result<Json<Vec<User>>, ApiError> {
    let operators = ctx.run(|conn, _| catalog::list_operators(conn)).await?;
    Ok(Json(operators))
}
