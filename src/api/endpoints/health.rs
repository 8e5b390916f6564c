//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub instance_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub inference_configured: bool,
}

/// `GET /api/health`: liveness plus database reachability.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    ctx.run(|conn, _| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    })
    .await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        instance_id: ctx.core.instance_id(),
        started_at: ctx.core.started_at(),
        inference_configured: ctx.core.settings().inference_url.is_some(),
    }))
}
