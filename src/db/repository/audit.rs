use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{format_ts, parse_ts, DatabaseError};
use crate::models::enums::AuditAction;
use crate::models::*;

/// Append one audit row. Call with the transaction that performs the
/// mutation so the trail commits or rolls back with it.
#[allow(clippy::too_many_arguments)]
pub fn insert_audit_entry(
    conn: &Connection,
    actor_id: Option<i64>,
    action: AuditAction,
    table_name: &str,
    record_id: i64,
    old_values: Option<&serde_json::Value>,
    new_values: Option<&serde_json::Value>,
    at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let old_json = old_values.map(serde_json::to_string).transpose()?;
    let new_json = new_values.map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO audit_log
         (actor_id, action, table_name, record_id, old_values, new_values, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            actor_id,
            action.as_str(),
            table_name,
            record_id,
            old_json,
            new_json,
            format_ts(at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type AuditRow = (i64, Option<i64>, String, String, i64, Option<String>, Option<String>, String);

fn audit_from_row(row: AuditRow) -> Result<AuditEntry, DatabaseError> {
    let (id, actor_id, action, table_name, record_id, old_values, new_values, created_at) = row;
    Ok(AuditEntry {
        id,
        actor_id,
        action: AuditAction::from_str(&action)?,
        table_name,
        record_id,
        old_values: old_values.as_deref().map(serde_json::from_str).transpose()?,
        new_values: new_values.as_deref().map(serde_json::from_str).transpose()?,
        created_at: parse_ts(&created_at)?,
    })
}

pub fn count_audit_entries(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn list_audit_entries(
    conn: &Connection,
    page: &PageRequest,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, actor_id, action, table_name, record_id, old_values, new_values, created_at
         FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map(params![page.limit(), page.offset()], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .collect::<Result<Vec<AuditRow>, _>>()?;
    rows.into_iter().map(audit_from_row).collect()
}

/// Audit rows for a single record, oldest first.
pub fn audit_trail_for(
    conn: &Connection,
    table_name: &str,
    record_id: i64,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, actor_id, action, table_name, record_id, old_values, new_values, created_at
         FROM audit_log WHERE table_name = ?1 AND record_id = ?2 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![table_name, record_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .collect::<Result<Vec<AuditRow>, _>>()?;
    rows.into_iter().map(audit_from_row).collect()
}
