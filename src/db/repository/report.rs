use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_ts, parse_ts, DatabaseError};
use crate::models::*;

pub fn insert_report(
    conn: &Connection,
    user_id: i64,
    report_type: &str,
    period_start: &DateTime<Utc>,
    period_end: &DateTime<Utc>,
    data: &serde_json::Value,
    generated_at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO reports
         (user_id, report_type, period_start, period_end, data, generated_at, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, '')",
        params![
            user_id,
            report_type,
            format_ts(period_start),
            format_ts(period_end),
            serde_json::to_string(data)?,
            format_ts(generated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_report_file_path(
    conn: &Connection,
    id: i64,
    file_path: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET file_path = ?2 WHERE id = ?1",
        params![id, file_path],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Report", id));
    }
    Ok(())
}

type ReportRow = (i64, i64, String, String, String, String, String, String);

fn read_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
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
}

fn report_from_row(row: ReportRow) -> Result<Report, DatabaseError> {
    let (id, user_id, report_type, start, end, data, generated_at, file_path) = row;
    Ok(Report {
        id,
        user_id,
        report_type,
        period_start: parse_ts(&start)?,
        period_end: parse_ts(&end)?,
        data: serde_json::from_str(&data)?,
        generated_at: parse_ts(&generated_at)?,
        file_path,
    })
}

pub fn get_report(conn: &Connection, id: i64) -> Result<Option<Report>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, report_type, period_start, period_end, data, generated_at,
                    file_path
             FROM reports WHERE id = ?1",
            params![id],
            read_report_row,
        )
        .optional()?;
    row.map(report_from_row).transpose()
}

pub fn count_reports(conn: &Connection, user_id: Option<i64>) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reports WHERE (?1 IS NULL OR user_id = ?1)",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Newest-first reports, optionally restricted to one author.
pub fn list_reports(
    conn: &Connection,
    user_id: Option<i64>,
    page: &PageRequest,
) -> Result<Vec<Report>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, report_type, period_start, period_end, data, generated_at, file_path
         FROM reports WHERE (?1 IS NULL OR user_id = ?1)
         ORDER BY generated_at DESC, id DESC LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map(params![user_id, page.limit(), page.offset()], read_report_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(report_from_row).collect()
}
