use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_disease(
    conn: &Connection,
    name: &str,
    description: &str,
    symptoms: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO diseases (name, description, symptoms) VALUES (?1, ?2, ?3)",
        params![name, description, symptoms],
    )?;
    Ok(conn.last_insert_rowid())
}

fn disease_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Disease> {
    Ok(Disease {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        symptoms: row.get(3)?,
    })
}

pub fn get_disease(conn: &Connection, id: i64) -> Result<Option<Disease>, DatabaseError> {
    let disease = conn
        .query_row(
            "SELECT id, name, description, symptoms FROM diseases WHERE id = ?1",
            params![id],
            disease_from_row,
        )
        .optional()?;
    Ok(disease)
}

pub fn find_disease_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Disease>, DatabaseError> {
    let disease = conn
        .query_row(
            "SELECT id, name, description, symptoms FROM diseases WHERE name = ?1",
            params![name],
            disease_from_row,
        )
        .optional()?;
    Ok(disease)
}

pub fn list_diseases(conn: &Connection) -> Result<Vec<Disease>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, symptoms FROM diseases ORDER BY name ASC, id ASC",
    )?;
    let diseases = stmt
        .query_map([], disease_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(diseases)
}

pub fn insert_treatment(
    conn: &Connection,
    disease_id: i64,
    name: &str,
    description: &str,
    dosage: &str,
    precautions: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO treatments (disease_id, name, description, dosage, precautions)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![disease_id, name, description, dosage, precautions],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_treatments(
    conn: &Connection,
    disease_id: i64,
) -> Result<Vec<Treatment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, disease_id, name, description, dosage, precautions
         FROM treatments WHERE disease_id = ?1 ORDER BY id ASC",
    )?;
    let treatments = stmt
        .query_map(params![disease_id], |row| {
            Ok(Treatment {
                id: row.get(0)?,
                disease_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                dosage: row.get(4)?,
                precautions: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(treatments)
}
