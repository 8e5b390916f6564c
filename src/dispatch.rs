//! Task dispatcher.
//!
//! Tasks are created by the recommendation service; this module owns
//! every later change. Status moves through `TaskStatus::can_transition_to`,
//! `Closed` is final, and the bound recommendation's status follows along
//! in the same transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::audit;
use crate::authorization::{require_task_actor, Actor};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{RecommendationStatus, Role, TaskFilter, TaskScope, TaskStatus};
use crate::models::{Page, PageRequest, Task};

fn load(conn: &Connection, id: i64) -> Result<Task, ServiceError> {
    repository::get_task(conn, id)?.ok_or_else(|| ServiceError::not_found("Task", id))
}

/// Move a task to `next`.
///
/// `expected` is the status the caller last saw. When it no longer matches
/// the stored status the caller lost a race and gets `Conflict`; re-read
/// and retry.
pub fn set_status(
    conn: &mut Connection,
    actor: &Actor,
    task_id: i64,
    next: TaskStatus,
    expected: Option<TaskStatus>,
    now: DateTime<Utc>,
) -> Result<Task, ServiceError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let before = load(&tx, task_id)?;
    require_task_actor(actor, before.operator_id)?;

    if let Some(seen) = expected {
        if seen != before.status {
            tracing::warn!(task_id, expected = %seen, actual = %before.status, "Stale task status");
            return Err(ServiceError::Conflict(format!(
                "task {task_id} is {} now, not {seen}",
                before.status
            )));
        }
    }
    if before.status.is_terminal() {
        tracing::warn!(task_id, requested = %next, "Transition out of closed task rejected");
        return Err(ServiceError::InvalidState(format!(
            "task {task_id} is closed"
        )));
    }
    if !before.status.can_transition_to(next) {
        return Err(ServiceError::InvalidState(format!(
            "task {task_id} cannot move from {} to {next}",
            before.status
        )));
    }

    let completed_at = (next == TaskStatus::Closed).then_some(now);
    let changed = repository::update_task_status(
        &tx,
        task_id,
        before.status,
        next,
        completed_at.as_ref(),
    )?;
    if changed == 0 {
        tracing::warn!(task_id, "Task status changed concurrently");
        return Err(ServiceError::Conflict(format!(
            "task {task_id} changed concurrently"
        )));
    }

    let recommendation_before = repository::get_recommendation(&tx, before.recommendation_id)?
        .ok_or_else(|| ServiceError::not_found("Recommendation", before.recommendation_id))?;
    repository::update_recommendation_status(
        &tx,
        before.recommendation_id,
        RecommendationStatus::mirroring(next),
        &now,
    )?;
    let recommendation_after = repository::get_recommendation(&tx, before.recommendation_id)?
        .ok_or_else(|| ServiceError::not_found("Recommendation", before.recommendation_id))?;

    let after = load(&tx, task_id)?;
    audit::record_update(&tx, Some(actor.id), audit::TASKS, task_id, &before, &after, &now)?;
    audit::record_update(
        &tx,
        Some(actor.id),
        audit::RECOMMENDATIONS,
        before.recommendation_id,
        &recommendation_before,
        &recommendation_after,
        &now,
    )?;
    tx.commit()?;

    tracing::info!(
        task_id,
        from = %before.status,
        to = %next,
        actor_id = actor.id,
        "Task status changed"
    );
    Ok(after)
}

/// Operators may read only their own tasks.
pub fn get(conn: &Connection, actor: &Actor, task_id: i64) -> Result<Task, ServiceError> {
    let task = load(conn, task_id)?;
    require_task_actor(actor, task.operator_id)?;
    Ok(task)
}

pub fn list_for_operator(conn: &Connection, operator_id: i64) -> Result<Vec<Task>, ServiceError> {
    Ok(repository::list_tasks(conn, Some(operator_id))?)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Task>, ServiceError> {
    Ok(repository::list_tasks(conn, None)?)
}

/// Role-scoped, filtered and paginated task listing.
///
/// Operators always see only their own tasks. For elevated roles `Mine`
/// means tasks dispatched from recommendations they authored.
pub fn list(
    conn: &Connection,
    actor: &Actor,
    scope: TaskScope,
    filter: TaskFilter,
    page: PageRequest,
    now: DateTime<Utc>,
) -> Result<Page<Task>, ServiceError> {
    let tasks = match (actor.role, scope) {
        (Role::Operator, _) => list_for_operator(conn, actor.id)?,
        (_, TaskScope::Mine) => repository::list_tasks_for_author(conn, actor.id)?,
        (_, TaskScope::All) => list_all(conn)?,
    };

    let matching: Vec<Task> = tasks.into_iter().filter(|t| t.matches(filter, now)).collect();
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    tracing::debug!(actor_id = actor.id, %scope, %filter, total, "Listed tasks");
    Ok(Page::new(items, total, page))
}
