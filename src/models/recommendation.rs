use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RecommendationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub diagnosis_id: i64,
    pub agronomist_id: i64,
    pub treatment_plan_text: String,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
