use serde::{Deserialize, Serialize};

/// Catalog entry for a plant disease. Reference data, never mutated by
/// the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disease {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub symptoms: String,
}

/// Treatment method known for a disease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: i64,
    pub disease_id: i64,
    pub name: String,
    pub description: String,
    pub dosage: String,
    pub precautions: String,
}
