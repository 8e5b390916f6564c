use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_ts, parse_ts, DatabaseError};
use crate::models::enums::RecommendationStatus;
use crate::models::*;

type RecommendationRow = (i64, i64, i64, String, String, String, String);

fn read_recommendation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecommendationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn recommendation_from_row(row: RecommendationRow) -> Result<Recommendation, DatabaseError> {
    let (id, diagnosis_id, agronomist_id, text, status, created_at, updated_at) = row;
    Ok(Recommendation {
        id,
        diagnosis_id,
        agronomist_id,
        treatment_plan_text: text,
        status: RecommendationStatus::from_str(&status)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

/// Insert a recommendation. A second recommendation for the same
/// diagnosis violates the unique index and surfaces as
/// `DatabaseError::ConstraintViolation`.
pub fn insert_recommendation(
    conn: &Connection,
    diagnosis_id: i64,
    agronomist_id: i64,
    treatment_plan_text: &str,
    status: RecommendationStatus,
    now: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let ts = format_ts(now);
    conn.execute(
        "INSERT INTO recommendations (diagnosis_id, agronomist_id, treatment_plan_text, status,
         created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![diagnosis_id, agronomist_id, treatment_plan_text, status.as_str(), ts],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_recommendation(
    conn: &Connection,
    id: i64,
) -> Result<Option<Recommendation>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, diagnosis_id, agronomist_id, treatment_plan_text, status,
                    created_at, updated_at
             FROM recommendations WHERE id = ?1",
            params![id],
            read_recommendation_row,
        )
        .optional()?;
    row.map(recommendation_from_row).transpose()
}

pub fn get_recommendation_for_diagnosis(
    conn: &Connection,
    diagnosis_id: i64,
) -> Result<Option<Recommendation>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, diagnosis_id, agronomist_id, treatment_plan_text, status,
                    created_at, updated_at
             FROM recommendations WHERE diagnosis_id = ?1",
            params![diagnosis_id],
            read_recommendation_row,
        )
        .optional()?;
    row.map(recommendation_from_row).transpose()
}

pub fn update_recommendation_status(
    conn: &Connection,
    id: i64,
    status: RecommendationStatus,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE recommendations SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), format_ts(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Recommendation", id));
    }
    Ok(())
}

pub fn count_recommendations(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM recommendations", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn list_recommendations(
    conn: &Connection,
    page: &PageRequest,
) -> Result<Vec<Recommendation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, diagnosis_id, agronomist_id, treatment_plan_text, status, created_at, updated_at
         FROM recommendations ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map(params![page.limit(), page.offset()], read_recommendation_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(recommendation_from_row).collect()
}
