use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_ts, parse_opt_ts, parse_ts, DatabaseError};
use crate::models::enums::TaskStatus;
use crate::models::*;

const TASK_COLUMNS: &str =
    "id, recommendation_id, operator_id, description, status, deadline, created_at, completed_at";

struct TaskRow {
    id: i64,
    recommendation_id: i64,
    operator_id: i64,
    description: String,
    status: String,
    deadline: String,
    created_at: String,
    completed_at: Option<String>,
}

fn read_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        recommendation_id: row.get(1)?,
        operator_id: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        deadline: row.get(5)?,
        created_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

fn task_from_row(row: TaskRow) -> Result<Task, DatabaseError> {
    Ok(Task {
        id: row.id,
        recommendation_id: row.recommendation_id,
        operator_id: row.operator_id,
        description: row.description,
        status: TaskStatus::from_str(&row.status)?,
        deadline: parse_ts(&row.deadline)?,
        created_at: parse_ts(&row.created_at)?,
        completed_at: parse_opt_ts(row.completed_at)?,
    })
}

pub fn insert_task(
    conn: &Connection,
    recommendation_id: i64,
    operator_id: i64,
    description: &str,
    deadline: &DateTime<Utc>,
    now: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO tasks
         (recommendation_id, operator_id, description, status, deadline, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            recommendation_id,
            operator_id,
            description,
            TaskStatus::INITIAL.as_str(),
            format_ts(deadline),
            format_ts(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_task(conn: &Connection, id: i64) -> Result<Option<Task>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            read_task_row,
        )
        .optional()?;
    row.map(task_from_row).transpose()
}

/// Compare-and-set status change: applies only if the stored status still
/// equals `from`. Returns the number of rows changed.
pub fn update_task_status(
    conn: &Connection,
    id: i64,
    from: TaskStatus,
    to: TaskStatus,
    completed_at: Option<&DateTime<Utc>>,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE tasks SET status = ?3, completed_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), completed_at.map(format_ts)],
    )?;
    Ok(changed)
}

/// All tasks, newest first, optionally restricted to one operator.
pub fn list_tasks(conn: &Connection, operator_id: Option<i64>) -> Result<Vec<Task>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE (?1 IS NULL OR operator_id = ?1)
         ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt
        .query_map(params![operator_id], read_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(task_from_row).collect()
}

/// Tasks dispatched from recommendations the given user authored, newest first.
pub fn list_tasks_for_author(
    conn: &Connection,
    agronomist_id: i64,
) -> Result<Vec<Task>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.recommendation_id, t.operator_id, t.description, t.status, t.deadline,
                t.created_at, t.completed_at
         FROM tasks t JOIN recommendations r ON r.id = t.recommendation_id
         WHERE r.agronomist_id = ?1
         ORDER BY t.created_at DESC, t.id DESC",
    )?;
    let rows = stmt
        .query_map(params![agronomist_id], read_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(task_from_row).collect()
}

/// Tasks created inside the inclusive window, oldest first.
pub fn list_tasks_created_between(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<Task>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE created_at BETWEEN ?1 AND ?2 ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt
        .query_map(params![format_ts(start), format_ts(end)], read_task_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(task_from_row).collect()
}
