use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AuditAction;

/// One committed mutation, recorded in the same transaction as the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    /// `None` for writes coming from the inference pipeline.
    pub actor_id: Option<i64>,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: i64,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
