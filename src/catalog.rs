//! Catalog store: disease definitions, their treatments and the users
//! eligible for task assignment.
//!
//! The workflow only reads the catalog. Writes happen at startup (seed,
//! inference labels) or through the elevated `add_disease` operation.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::authorization::{require_elevated, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::Role;
use crate::models::{Disease, Treatment, User};

/// Placeholder text for diseases created from bare inference labels.
const UNDESCRIBED: &str = "No description yet";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDisease {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub symptoms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTreatment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub precautions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDisease {
    #[serde(flatten)]
    pub disease: NewDisease,
    #[serde(default)]
    pub treatments: Vec<SeedTreatment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

/// Startup catalog file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub diseases: Vec<SeedDisease>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub diseases_added: usize,
    pub treatments_added: usize,
    pub users_added: usize,
}

// ═══════════════════════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════════════════════

pub fn list_diseases(conn: &Connection) -> Result<Vec<Disease>, ServiceError> {
    Ok(repository::list_diseases(conn)?)
}

pub fn get_disease(conn: &Connection, id: i64) -> Result<Disease, ServiceError> {
    repository::get_disease(conn, id)?.ok_or_else(|| ServiceError::not_found("Disease", id))
}

pub fn find_disease_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Disease>, ServiceError> {
    Ok(repository::find_disease_by_name(conn, name.trim())?)
}

pub fn treatments_for(conn: &Connection, disease_id: i64) -> Result<Vec<Treatment>, ServiceError> {
    get_disease(conn, disease_id)?;
    Ok(repository::list_treatments(conn, disease_id)?)
}

/// Active users holding the operator role.
pub fn list_operators(conn: &Connection) -> Result<Vec<User>, ServiceError> {
    Ok(repository::list_users_by_role(conn, Role::Operator)?)
}

/// An assignee must exist, be active and hold the operator role. Anything
/// else is an input error, not a missing entity.
pub fn resolve_operator(conn: &Connection, user_id: i64) -> Result<User, ServiceError> {
    match repository::get_user(conn, user_id)? {
        Some(user) if user.role == Role::Operator && user.is_active => Ok(user),
        Some(user) if user.role != Role::Operator => Err(ServiceError::Validation(format!(
            "user {user_id} is an {} and cannot be assigned tasks",
            user.role
        ))),
        Some(_) => Err(ServiceError::Validation(format!(
            "operator {user_id} is inactive"
        ))),
        None => Err(ServiceError::Validation(format!(
            "operator {user_id} does not exist"
        ))),
    }
}

// ═══════════════════════════════════════════════════════════
// Writes
// ═══════════════════════════════════════════════════════════

/// Add a disease definition. Agronomists and administrators only.
pub fn add_disease(
    conn: &mut Connection,
    actor: &Actor,
    input: &NewDisease,
    now: DateTime<Utc>,
) -> Result<Disease, ServiceError> {
    require_elevated(actor, "adding a disease")?;
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("disease name must not be empty".into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if repository::find_disease_by_name(&tx, name)?.is_some() {
        return Err(ServiceError::Conflict(format!("disease '{name}' already exists")));
    }
    let id = repository::insert_disease(
        &tx,
        name,
        input.description.trim(),
        input.symptoms.trim(),
    )?;
    let disease = get_disease(&tx, id)?;
    audit::record_create(&tx, Some(actor.id), audit::DISEASES, id, &disease, &now)?;
    tx.commit()?;

    tracing::info!(disease_id = id, name, actor_id = actor.id, "Disease added");
    Ok(disease)
}

/// Make sure every label the inference model can emit resolves to a
/// disease row. Returns how many rows were created.
pub fn ensure_diseases(conn: &mut Connection, labels: &[&str]) -> Result<usize, ServiceError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut added = 0;
    for label in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if repository::find_disease_by_name(&tx, label)?.is_none() {
            repository::insert_disease(&tx, label, UNDESCRIBED, UNDESCRIBED)?;
            added += 1;
        }
    }
    tx.commit()?;
    if added > 0 {
        tracing::info!(added, "Registered inference labels as diseases");
    }
    Ok(added)
}

/// Insert seed rows that are not present yet. Existing diseases and users
/// (matched by name / username) are left untouched, including their
/// treatments.
pub fn apply_seed(conn: &mut Connection, seed: &CatalogSeed) -> Result<SeedSummary, ServiceError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut summary = SeedSummary::default();

    for entry in &seed.diseases {
        let name = entry.disease.name.trim();
        if name.is_empty() || repository::find_disease_by_name(&tx, name)?.is_some() {
            continue;
        }
        let disease_id = repository::insert_disease(
            &tx,
            name,
            entry.disease.description.trim(),
            entry.disease.symptoms.trim(),
        )?;
        summary.diseases_added += 1;
        for t in &entry.treatments {
            repository::insert_treatment(
                &tx,
                disease_id,
                &t.name,
                &t.description,
                &t.dosage,
                &t.precautions,
            )?;
            summary.treatments_added += 1;
        }
    }

    for user in &seed.users {
        if repository::find_user_by_username(&tx, &user.username)?.is_none() {
            repository::insert_user(&tx, &user.username, &user.full_name, user.role)?;
            summary.users_added += 1;
        }
    }

    tx.commit()?;
    tracing::info!(
        diseases = summary.diseases_added,
        treatments = summary.treatments_added,
        users = summary.users_added,
        "Catalog seed applied"
    );
    Ok(summary)
}
