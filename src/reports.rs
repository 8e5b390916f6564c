//! Persisted report snapshots.
//!
//! A report freezes one aggregation snapshot: the JSON goes into the
//! `reports` table and into `report_<id>.json` under the reports
//! directory for the export layer to pick up.

use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::aggregation;
use crate::audit;
use crate::authorization::Actor;
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::{Page, PageRequest, Report};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub report_type: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

fn report_file_name(id: i64) -> String {
    format!("report_{id}.json")
}

/// Compute, store and write out a report for the requested period.
pub fn generate_report(
    conn: &mut Connection,
    actor: &Actor,
    reports_dir: &Path,
    request: &ReportRequest,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Result<Report, ServiceError> {
    let report_type = request.report_type.trim();
    if report_type.is_empty() {
        return Err(ServiceError::Validation("report type must not be empty".into()));
    }

    let snapshot =
        aggregation::snapshot(conn, request.period_start, request.period_end, offset, now)?;
    let data = serde_json::to_value(&snapshot).map_err(|e| ServiceError::Database(e.into()))?;
    let pretty =
        serde_json::to_string_pretty(&data).map_err(|e| ServiceError::Database(e.into()))?;

    fs::create_dir_all(reports_dir)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let id = repository::insert_report(
        &tx,
        actor.id,
        report_type,
        &request.period_start,
        &request.period_end,
        &data,
        &now,
    )?;

    let path = reports_dir.join(report_file_name(id));
    fs::write(&path, pretty)?;

    // From here on the file exists; any failure must take it back out.
    let report = match finish_report(tx, actor, id, &path, &now) {
        Ok(report) => report,
        Err(e) => {
            remove_orphan(&path);
            return Err(e);
        }
    };

    tracing::info!(
        report_id = id,
        report_type,
        actor_id = actor.id,
        path = %path.display(),
        "Report generated"
    );
    Ok(report)
}

/// Record the file location, audit and commit.
fn finish_report(
    tx: Transaction<'_>,
    actor: &Actor,
    id: i64,
    path: &Path,
    now: &DateTime<Utc>,
) -> Result<Report, ServiceError> {
    repository::set_report_file_path(&tx, id, &path.to_string_lossy())?;
    let report =
        repository::get_report(&tx, id)?.ok_or_else(|| ServiceError::not_found("Report", id))?;
    audit::record_create(&tx, Some(actor.id), audit::REPORTS, id, &report, now)?;
    tx.commit()?;
    Ok(report)
}

fn remove_orphan(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "Could not remove orphaned report file");
    }
}

/// Administrators see every report, everyone else only their own.
pub fn list_reports(
    conn: &Connection,
    actor: &Actor,
    page: PageRequest,
) -> Result<Page<Report>, ServiceError> {
    let owner = if actor.is_admin() { None } else { Some(actor.id) };
    let total = repository::count_reports(conn, owner)?;
    let items = repository::list_reports(conn, owner, &page)?;
    Ok(Page::new(items, total, page))
}

pub fn get_report(conn: &Connection, actor: &Actor, id: i64) -> Result<Report, ServiceError> {
    let report =
        repository::get_report(conn, id)?.ok_or_else(|| ServiceError::not_found("Report", id))?;
    if !actor.is_admin() && report.user_id != actor.id {
        return Err(ServiceError::Forbidden(format!("report {id} belongs to another user")));
    }
    Ok(report)
}
