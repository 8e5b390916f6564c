//! Audit trail endpoints, administrators only.
//!
//! - `GET /api/audit?page=`
//! - `GET /api/audit/:table/:record_id`

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery};
use crate::audit;
use crate::authorization::Actor;
use crate::models::{AuditEntry, Page};

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<AuditEntry>>, ApiError> {
    let page = query.request();
    let listing = ctx.run(move |conn, _| audit::list_audit(conn, &actor, page)).await?;
    Ok(Json(listing))
}

pub async fn trail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path((table, record_id)): Path<(String, i64)>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let entries = ctx
        .run(move |conn, _| audit::record_trail(conn, &actor, &table, record_id))
        .await?;
    Ok(Json(entries))
}
