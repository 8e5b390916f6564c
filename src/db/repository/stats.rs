//! Read-only window queries backing the aggregation engine.
//!
//! Bounds are inclusive on both ends and compared as fixed-width
//! timestamp strings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{format_ts, parse_ts, DatabaseError};

/// (count, average confidence) of diagnoses created in the window.
pub fn diagnosis_summary(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<(u64, Option<f64>), DatabaseError> {
    let (count, avg): (i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), AVG(confidence) FROM diagnoses WHERE created_at BETWEEN ?1 AND ?2",
        params![format_ts(start), format_ts(end)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((count as u64, avg))
}

/// Diagnosis counts per resolved disease name, largest first, ties by name.
pub fn disease_distribution(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<(String, u64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT dis.name, COUNT(d.id) AS total FROM diagnoses d
         JOIN diseases dis ON dis.id = d.disease_id
         WHERE d.created_at BETWEEN ?1 AND ?2
         GROUP BY dis.id, dis.name
         ORDER BY total DESC, dis.name ASC",
    )?;
    let rows = stmt
        .query_map(params![format_ts(start), format_ts(end)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(|(name, total)| (name, total as u64)).collect())
}

/// Creation timestamps of diagnoses in the window, ascending.
pub fn diagnosis_timestamps(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT created_at FROM diagnoses
         WHERE created_at BETWEEN ?1 AND ?2 ORDER BY created_at ASC",
    )?;
    let raw = stmt
        .query_map(params![format_ts(start), format_ts(end)], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.iter().map(|ts| parse_ts(ts)).collect()
}

pub fn recommendation_count(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM recommendations WHERE created_at BETWEEN ?1 AND ?2",
        params![format_ts(start), format_ts(end)],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
