//! Recommendation service.
//!
//! Creating a recommendation is the only way a diagnosis becomes verified.
//! Verification, the recommendation row and its bound task commit together
//! or not at all.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::authorization::{require_elevated, Actor};
use crate::catalog;
use crate::db::repository;
use crate::error::ServiceError;
use crate::ledger;
use crate::models::enums::RecommendationStatus;
use crate::models::{Page, PageRequest, Recommendation, Task};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecommendation {
    pub diagnosis_id: i64,
    pub treatment_plan_text: String,
    pub operator_id: i64,
    pub deadline: DateTime<Utc>,
    /// Free text for the operator. Blank falls back to a generated line.
    #[serde(default)]
    pub task_description: Option<String>,
}

/// A recommendation together with the task dispatched for it.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationWithTask {
    pub recommendation: Recommendation,
    pub task: Task,
}

fn default_task_description(diagnosis_id: i64, disease_name: &str) -> String {
    format!("Apply treatment plan for diagnosis #{diagnosis_id} ({disease_name})")
}

fn validate(input: &CreateRecommendation, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if input.treatment_plan_text.trim().is_empty() {
        return Err(ServiceError::Validation("treatment plan must not be empty".into()));
    }
    if input.deadline <= now {
        return Err(ServiceError::Validation(format!(
            "deadline {} is not in the future",
            input.deadline.to_rfc3339()
        )));
    }
    Ok(())
}

/// Verify the diagnosis if needed, then create the recommendation and its
/// task in `Assigned`.
pub fn create(
    conn: &mut Connection,
    actor: &Actor,
    input: &CreateRecommendation,
    now: DateTime<Utc>,
) -> Result<RecommendationWithTask, ServiceError> {
    require_elevated(actor, "creating a recommendation")?;
    validate(input, now)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    catalog::resolve_operator(&tx, input.operator_id)?;

    let diagnosis = ledger::get(&tx, input.diagnosis_id)?;
    if repository::get_recommendation_for_diagnosis(&tx, diagnosis.id)?.is_some() {
        tracing::warn!(diagnosis_id = diagnosis.id, "Recommendation already exists");
        return Err(ServiceError::Conflict(format!(
            "diagnosis {} already has a recommendation",
            diagnosis.id
        )));
    }
    let diagnosis = if diagnosis.is_verified {
        diagnosis
    } else {
        ledger::verify_in(&tx, &diagnosis, diagnosis.disease_id, actor.id, now)?
    };

    let recommendation_id = repository::insert_recommendation(
        &tx,
        diagnosis.id,
        actor.id,
        input.treatment_plan_text.trim(),
        RecommendationStatus::New,
        &now,
    )?;
    let recommendation = load(&tx, recommendation_id)?;

    let description = match input.task_description.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            let disease = catalog::get_disease(&tx, diagnosis.disease_id)?;
            default_task_description(diagnosis.id, &disease.name)
        }
    };
    let task_id = repository::insert_task(
        &tx,
        recommendation_id,
        input.operator_id,
        &description,
        &input.deadline,
        &now,
    )?;
    let task = repository::get_task(&tx, task_id)?
        .ok_or_else(|| ServiceError::not_found("Task", task_id))?;

    audit::record_create(
        &tx,
        Some(actor.id),
        audit::RECOMMENDATIONS,
        recommendation_id,
        &recommendation,
        &now,
    )?;
    audit::record_create(&tx, Some(actor.id), audit::TASKS, task_id, &task, &now)?;
    tx.commit()?;

    tracing::info!(
        recommendation_id,
        task_id,
        diagnosis_id = diagnosis.id,
        operator_id = input.operator_id,
        actor_id = actor.id,
        "Recommendation created and task dispatched"
    );
    Ok(RecommendationWithTask { recommendation, task })
}

fn load(conn: &Connection, id: i64) -> Result<Recommendation, ServiceError> {
    repository::get_recommendation(conn, id)?
        .ok_or_else(|| ServiceError::not_found("Recommendation", id))
}

pub fn get(conn: &Connection, id: i64) -> Result<Recommendation, ServiceError> {
    load(conn, id)
}

/// Newest-first page of recommendations.
pub fn list(conn: &Connection, page: PageRequest) -> Result<Page<Recommendation>, ServiceError> {
    let total = repository::count_recommendations(conn)?;
    let items = repository::list_recommendations(conn, &page)?;
    Ok(Page::new(items, total, page))
}
