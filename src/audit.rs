//! Audit trail for committed mutations.
//!
//! Rows are written through the same transaction as the change they
//! describe, so a rolled-back operation leaves no trace.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::authorization::{require_admin, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::AuditAction;
use crate::models::{AuditEntry, Page, PageRequest};

pub const DIAGNOSES: &str = "diagnoses";
pub const RECOMMENDATIONS: &str = "recommendations";
pub const TASKS: &str = "tasks";
pub const REPORTS: &str = "reports";
pub const DISEASES: &str = "diseases";

fn snapshot<T: Serialize>(value: &T) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Database(e.into()))
}

pub(crate) fn record_create<T: Serialize>(
    conn: &Connection,
    actor_id: Option<i64>,
    table: &str,
    record_id: i64,
    new: &T,
    at: &DateTime<Utc>,
) -> Result<(), ServiceError> {
    let new = snapshot(new)?;
    repository::insert_audit_entry(
        conn,
        actor_id,
        AuditAction::Create,
        table,
        record_id,
        None,
        Some(&new),
        at,
    )?;
    Ok(())
}

pub(crate) fn record_update<T: Serialize>(
    conn: &Connection,
    actor_id: Option<i64>,
    table: &str,
    record_id: i64,
    old: &T,
    new: &T,
    at: &DateTime<Utc>,
) -> Result<(), ServiceError> {
    let old = snapshot(old)?;
    let new = snapshot(new)?;
    repository::insert_audit_entry(
        conn,
        actor_id,
        AuditAction::Update,
        table,
        record_id,
        Some(&old),
        Some(&new),
        at,
    )?;
    Ok(())
}

pub(crate) fn record_delete<T: Serialize>(
    conn: &Connection,
    actor_id: Option<i64>,
    table: &str,
    record_id: i64,
    old: &T,
    at: &DateTime<Utc>,
) -> Result<(), ServiceError> {
    let old = snapshot(old)?;
    repository::insert_audit_entry(
        conn,
        actor_id,
        AuditAction::Delete,
        table,
        record_id,
        Some(&old),
        None,
        at,
    )?;
    Ok(())
}

/// Newest-first audit entries. Administrators only.
pub fn list_audit(
    conn: &Connection,
    actor: &Actor,
    page: PageRequest,
) -> Result<Page<AuditEntry>, ServiceError> {
    require_admin(actor, "viewing the audit trail")?;
    let total = repository::count_audit_entries(conn)?;
    let items = repository::list_audit_entries(conn, &page)?;
    Ok(Page::new(items, total, page))
}

/// Every audit entry for one record, oldest first. Administrators only.
pub fn record_trail(
    conn: &Connection,
    actor: &Actor,
    table: &str,
    record_id: i64,
) -> Result<Vec<AuditEntry>, ServiceError> {
    require_admin(actor, "viewing the audit trail")?;
    Ok(repository::audit_trail_for(conn, table, record_id)?)
}
