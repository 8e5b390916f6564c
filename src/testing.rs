//! Shared fixtures for unit tests.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;

use crate::db::{open_database, open_memory_database, repository};
use crate::models::enums::Role;
use crate::models::NewDiagnosis;

/// Ids of the rows every fixture database starts with. Users are inserted
/// in id order: administrator 1, agronomist 2, operators 3 and 4.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Seeded {
    pub blight: i64,
    pub mildew: i64,
    pub admin: i64,
    pub agronomist: i64,
    pub operator: i64,
    pub other_operator: i64,
}

pub(crate) fn seed(conn: &Connection) -> Seeded {
    let blight = repository::insert_disease(
        conn,
        "Late blight",
        "Oomycete",
        "Dark lesions",
    )
    .unwrap();
    let mildew = repository::insert_disease(
        conn,
        "Powdery mildew",
        "Fungal",
        "White coating",
    )
    .unwrap();
    repository::insert_treatment(
        conn,
        blight,
        "Copper spray",
        "Foliar",
        "2 g/l",
        "Gloves",
    )
    .unwrap();
    let admin = repository::insert_user(conn, "admin", "Anna Admin", Role::Administrator).unwrap();
    let agronomist = repository::insert_user(
        conn,
        "agro",
        "Boris Agronom",
        Role::Agronomist,
    )
    .unwrap();
    let operator = repository::insert_user(conn, "op3", "Clara Field", Role::Operator).unwrap();
    let other_operator = repository::insert_user(
        conn,
        "op4",
        "Dmitri Field",
        Role::Operator,
    )
    .unwrap();
    Seeded {
        blight,
        mildew,
        admin,
        agronomist,
        operator,
        other_operator,
    }
}

pub(crate) fn memory_db() -> (Connection, Seeded) {
    let conn = open_memory_database().unwrap();
    let seeded = seed(&conn);
    (conn, seeded)
}

/// File-backed database for tests that need several connections.
pub(crate) fn file_db(dir: &tempfile::TempDir) -> (std::path::PathBuf, Seeded) {
    let path = dir.path().join("phytoscan.db");
    let conn = open_database(&path).unwrap();
    let seeded = seed(&conn);
    (path, seeded)
}

pub(crate) fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub(crate) fn new_diagnosis(disease_id: i64, confidence: f64) -> NewDiagnosis {
    NewDiagnosis {
        image_ref: "plants/2024/01/01/leaf.jpg".into(),
        disease_id,
        confidence,
        model_type: "effnet".into(),
        model_accuracy: Some(94.5),
        heatmap_ref: Some("heatmaps/leaf.png".into()),
    }
}

/// Insert an unverified diagnosis directly, bypassing the ledger.
pub(crate) fn insert_diagnosis(
    conn: &Connection,
    disease_id: i64,
    confidence: f64,
    at: DateTime<Utc>,
) -> i64 {
    repository::insert_diagnosis(conn, &new_diagnosis(disease_id, confidence), &at).unwrap()
}
