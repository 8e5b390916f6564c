//! Aggregation engine.
//!
//! Read-only statistics over an inclusive time window. Every query of one
//! snapshot runs inside a single read transaction, so the counts agree
//! with each other even while writers commit in between calls.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub disease_name: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub total: u64,
    /// Rounded to 4 decimals; absent when the window holds no diagnosis.
    pub avg_confidence: Option<f64>,
    /// Largest count first, ties by name.
    pub distribution: Vec<DistributionEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationsSummary {
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksSummary {
    pub total: u64,
    pub completed_on_time: u64,
    pub overdue: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub total: u64,
}

/// Plain structured snapshot handed to reporting and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub period: Period,
    pub diagnostics: DiagnosticsSummary,
    pub recommendations: RecommendationsSummary,
    pub tasks: TasksSummary,
    /// One entry per day that has diagnoses, ascending.
    pub time_series: Vec<DayCount>,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Compute the snapshot for `[start, end]`. Calendar days (time series,
/// on-time checks) are taken in `offset`; `now` decides what is overdue.
pub fn snapshot(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<Snapshot, ServiceError> {
    if start > end {
        return Err(ServiceError::Validation(format!(
            "window start {} is after end {}",
            start.to_rfc3339(),
            end.to_rfc3339()
        )));
    }

    let tx = conn.unchecked_transaction()?;

    let (diagnosis_total, avg) = repository::diagnosis_summary(&tx, &start, &end)?;
    let distribution = repository::disease_distribution(&tx, &start, &end)?
        .into_iter()
        .map(|(disease_name, total)| DistributionEntry { disease_name, total })
        .collect();

    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ts in repository::diagnosis_timestamps(&tx, &start, &end)? {
        *per_day.entry(ts.with_timezone(&offset).date_naive()).or_default() += 1;
    }
    let time_series = per_day
        .into_iter()
        .map(|(date, total)| DayCount { date, total })
        .collect();

    let recommendation_total = repository::recommendation_count(&tx, &start, &end)?;

    let tasks = repository::list_tasks_created_between(&tx, &start, &end)?;
    let task_summary = TasksSummary {
        total: tasks.len() as u64,
        completed_on_time: tasks.iter().filter(|t| t.completed_on_time(offset)).count() as u64,
        overdue: tasks
            .iter()
            .filter(|t| !t.status.is_terminal() && t.is_overdue(now))
            .count() as u64,
    };

    tx.commit()?;

    tracing::debug!(
        start = %start,
        end = %end,
        diagnoses = diagnosis_total,
        tasks = task_summary.total,
        "Aggregation snapshot computed"
    );
    Ok(Snapshot {
        period: Period { start, end },
        diagnostics: DiagnosticsSummary {
            total: diagnosis_total,
            avg_confidence: avg.map(round4),
            distribution,
        },
        recommendations: RecommendationsSummary {
            total: recommendation_total,
        },
        tasks: task_summary,
        time_series,
    })
}
