use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted aggregation snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    pub report_type: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
    pub file_path: String,
}
