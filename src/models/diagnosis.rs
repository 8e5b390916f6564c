use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A disease diagnosis produced by the inference pipeline for one image.
///
/// `disease_id` can be relabelled while the diagnosis is unverified. The
/// first relabel away from the machine prediction sets `manually_changed`
/// and stores that prediction in `ml_disease_id`; neither is ever reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: i64,
    pub image_ref: String,
    pub disease_id: i64,
    pub ml_disease_id: Option<i64>,
    pub manually_changed: bool,
    pub confidence: f64,
    pub model_type: String,
    pub model_accuracy: Option<f64>,
    pub is_verified: bool,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub heatmap_ref: Option<String>,
}

impl Diagnosis {
    /// Disease the model originally predicted.
    pub fn predicted_disease_id(&self) -> i64 {
        self.ml_disease_id.unwrap_or(self.disease_id)
    }
}

/// Inbound submission from the inference pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiagnosis {
    pub image_ref: String,
    pub disease_id: i64,
    pub confidence: f64,
    pub model_type: String,
    #[serde(default)]
    pub model_accuracy: Option<f64>,
    #[serde(default)]
    pub heatmap_ref: Option<String>,
}

/// Diagnosis joined with its resolved disease name, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisView {
    #[serde(flatten)]
    pub diagnosis: Diagnosis,
    pub disease_name: String,
}
