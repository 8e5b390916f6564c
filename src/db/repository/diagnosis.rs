use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_ts, parse_opt_ts, parse_ts, DatabaseError};
use crate::models::*;

const DIAGNOSIS_COLUMNS: &str = "d.id, d.image_ref, d.disease_id, d.ml_disease_id,
     d.manually_changed, d.confidence, d.model_type, d.model_accuracy, d.is_verified,
     d.verified_by, d.verified_at, d.created_at, d.heatmap_ref";

struct DiagnosisRow {
    id: i64,
    image_ref: String,
    disease_id: i64,
    ml_disease_id: Option<i64>,
    manually_changed: i32,
    confidence: f64,
    model_type: String,
    model_accuracy: Option<f64>,
    is_verified: i32,
    verified_by: Option<i64>,
    verified_at: Option<String>,
    created_at: String,
    heatmap_ref: Option<String>,
}

fn read_diagnosis_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiagnosisRow> {
    Ok(DiagnosisRow {
        id: row.get(0)?,
        image_ref: row.get(1)?,
        disease_id: row.get(2)?,
        ml_disease_id: row.get(3)?,
        manually_changed: row.get(4)?,
        confidence: row.get(5)?,
        model_type: row.get(6)?,
        model_accuracy: row.get(7)?,
        is_verified: row.get(8)?,
        verified_by: row.get(9)?,
        verified_at: row.get(10)?,
        created_at: row.get(11)?,
        heatmap_ref: row.get(12)?,
    })
}

fn diagnosis_from_row(row: DiagnosisRow) -> Result<Diagnosis, DatabaseError> {
    Ok(Diagnosis {
        id: row.id,
        image_ref: row.image_ref,
        disease_id: row.disease_id,
        ml_disease_id: row.ml_disease_id,
        manually_changed: row.manually_changed != 0,
        confidence: row.confidence,
        model_type: row.model_type,
        model_accuracy: row.model_accuracy,
        is_verified: row.is_verified != 0,
        verified_by: row.verified_by,
        verified_at: parse_opt_ts(row.verified_at)?,
        created_at: parse_ts(&row.created_at)?,
        heatmap_ref: row.heatmap_ref,
    })
}

pub fn insert_diagnosis(
    conn: &Connection,
    diag: &NewDiagnosis,
    created_at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (image_ref, disease_id, ml_disease_id, manually_changed, confidence,
         model_type, model_accuracy, is_verified, created_at, heatmap_ref)
         VALUES (?1, ?2, NULL, 0, ?3, ?4, ?5, 0, ?6, ?7)",
        params![
            diag.image_ref,
            diag.disease_id,
            diag.confidence,
            diag.model_type,
            diag.model_accuracy,
            format_ts(created_at),
            diag.heatmap_ref,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_diagnosis(conn: &Connection, id: i64) -> Result<Option<Diagnosis>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DIAGNOSIS_COLUMNS} FROM diagnoses d WHERE d.id = ?1"),
            params![id],
            read_diagnosis_row,
        )
        .optional()?;
    row.map(diagnosis_from_row).transpose()
}

/// Rewrite the disease label of an unverified diagnosis. Returns the
/// number of rows changed: 0 when the diagnosis is missing or verified.
pub fn update_diagnosis_disease(
    conn: &Connection,
    id: i64,
    disease_id: i64,
    ml_disease_id: Option<i64>,
    manually_changed: bool,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE diagnoses SET disease_id = ?2, ml_disease_id = ?3, manually_changed = ?4
         WHERE id = ?1 AND is_verified = 0",
        params![id, disease_id, ml_disease_id, manually_changed as i32],
    )?;
    Ok(changed)
}

/// Flip the verification flag. Only an unverified row is touched.
pub fn mark_diagnosis_verified(
    conn: &Connection,
    id: i64,
    verifier_id: i64,
    at: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE diagnoses SET is_verified = 1, verified_by = ?2, verified_at = ?3
         WHERE id = ?1 AND is_verified = 0",
        params![id, verifier_id, format_ts(at)],
    )?;
    Ok(changed)
}

/// Delete an unverified diagnosis. Verified rows are history and stay.
pub fn delete_unverified_diagnosis(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM diagnoses WHERE id = ?1 AND is_verified = 0",
        params![id],
    )?;
    Ok(deleted)
}

pub fn count_diagnoses(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Newest-first page of diagnoses with their resolved disease names.
pub fn list_diagnosis_views(
    conn: &Connection,
    page: &PageRequest,
) -> Result<Vec<DiagnosisView>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DIAGNOSIS_COLUMNS}, dis.name FROM diagnoses d
         JOIN diseases dis ON dis.id = d.disease_id
         ORDER BY d.created_at DESC, d.id DESC
         LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt
        .query_map(params![page.limit(), page.offset()], |row| {
            Ok((read_diagnosis_row(row)?, row.get::<_, String>(13)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(row, disease_name)| {
            Ok(DiagnosisView {
                diagnosis: diagnosis_from_row(row)?,
                disease_name,
            })
        })
        .collect()
}
