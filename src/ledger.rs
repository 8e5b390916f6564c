//! Diagnosis ledger.
//!
//! Holds diagnoses produced by the inference pipeline and owns the only
//! transitions they support:
//! 1. relabel: change the disease while unverified
//! 2. verify: once, and only from the recommendation service
//! 3. recreate: destructive replace with a fresh inference run
//!
//! Verified diagnoses are history and never change again.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::audit;
use crate::authorization::{require_elevated, Actor};
use crate::catalog;
use crate::config::DIAGNOSIS_PAGE_SIZE;
use crate::db::repository;
use crate::error::ServiceError;
use crate::inference::{InferenceEngine, InferenceError};
use crate::models::{Diagnosis, DiagnosisView, NewDiagnosis, Page, PageRequest};

// ═══════════════════════════════════════════════════════════
// Intake and reads
// ═══════════════════════════════════════════════════════════

fn validate_confidence(confidence: f64) -> Result<(), ServiceError> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "confidence {confidence} is outside [0, 1]"
        )))
    }
}

fn validate_submission(input: &NewDiagnosis) -> Result<(), ServiceError> {
    if input.image_ref.trim().is_empty() {
        return Err(ServiceError::Validation("image reference must not be empty".into()));
    }
    if input.model_type.trim().is_empty() {
        return Err(ServiceError::Validation("model identifier must not be empty".into()));
    }
    validate_confidence(input.confidence)?;
    if let Some(accuracy) = input.model_accuracy {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(ServiceError::Validation(format!(
                "model accuracy {accuracy} must be a non-negative number"
            )));
        }
    }
    Ok(())
}

/// Record a diagnosis produced by the inference pipeline. It starts
/// unverified.
pub fn submit(
    conn: &mut Connection,
    input: &NewDiagnosis,
    now: DateTime<Utc>,
) -> Result<Diagnosis, ServiceError> {
    validate_submission(input)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    catalog::get_disease(&tx, input.disease_id)?;
    let id = repository::insert_diagnosis(&tx, input, &now)?;
    let diagnosis = load(&tx, id)?;
    audit::record_create(&tx, None, audit::DIAGNOSES, id, &diagnosis, &now)?;
    tx.commit()?;

    tracing::info!(
        diagnosis_id = id,
        disease_id = input.disease_id,
        model = %input.model_type,
        "Diagnosis submitted"
    );
    Ok(diagnosis)
}

fn load(conn: &Connection, id: i64) -> Result<Diagnosis, ServiceError> {
    repository::get_diagnosis(conn, id)?.ok_or_else(|| ServiceError::not_found("Diagnosis", id))
}

pub fn get(conn: &Connection, id: i64) -> Result<Diagnosis, ServiceError> {
    tracing::debug!(diagnosis_id = id, "Loading diagnosis");
    load(conn, id)
}

/// Newest-first page of diagnoses, `DIAGNOSIS_PAGE_SIZE` per page.
pub fn list(conn: &Connection, page: u32) -> Result<Page<DiagnosisView>, ServiceError> {
    let request = PageRequest::new(page, DIAGNOSIS_PAGE_SIZE);
    let total = repository::count_diagnoses(conn)?;
    let items = repository::list_diagnosis_views(conn, &request)?;
    Ok(Page::new(items, total, request))
}

// ═══════════════════════════════════════════════════════════
// Relabel and verify
// ═══════════════════════════════════════════════════════════

/// Label bookkeeping after moving `diagnosis` to `disease_id`:
/// (original prediction to keep, manually-changed marker).
fn relabel_marker(diagnosis: &Diagnosis, disease_id: i64) -> (Option<i64>, bool) {
    if diagnosis.manually_changed {
        (diagnosis.ml_disease_id, true)
    } else if disease_id != diagnosis.disease_id {
        (Some(diagnosis.disease_id), true)
    } else {
        (None, false)
    }
}

fn apply_relabel(
    conn: &Connection,
    diagnosis: &Diagnosis,
    disease_id: i64,
) -> Result<(), ServiceError> {
    let (ml_disease_id, manually_changed) = relabel_marker(diagnosis, disease_id);
    let changed = repository::update_diagnosis_disease(
        conn,
        diagnosis.id,
        disease_id,
        ml_disease_id,
        manually_changed,
    )?;
    if changed == 0 {
        return Err(ServiceError::Conflict(format!(
            "diagnosis {} changed concurrently",
            diagnosis.id
        )));
    }
    Ok(())
}

/// Change the disease of an unverified diagnosis.
pub fn relabel(
    conn: &mut Connection,
    actor: &Actor,
    id: i64,
    disease_id: i64,
    now: DateTime<Utc>,
) -> Result<Diagnosis, ServiceError> {
    require_elevated(actor, "relabelling a diagnosis")?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let before = load(&tx, id)?;
    if before.is_verified {
        tracing::warn!(diagnosis_id = id, "Relabel rejected: diagnosis already verified");
        return Err(ServiceError::InvalidState(format!(
            "diagnosis {id} is verified and can no longer be relabelled"
        )));
    }
    catalog::get_disease(&tx, disease_id)?;
    if before.disease_id == disease_id {
        return Ok(before);
    }

    apply_relabel(&tx, &before, disease_id)?;
    let after = load(&tx, id)?;
    audit::record_update(&tx, Some(actor.id), audit::DIAGNOSES, id, &before, &after, &now)?;
    tx.commit()?;

    tracing::info!(
        diagnosis_id = id,
        from = before.disease_id,
        to = disease_id,
        actor_id = actor.id,
        "Diagnosis relabelled"
    );
    Ok(after)
}

/// Verify inside the caller's transaction. Relabel semantics apply when
/// `disease_id` differs from the current label. Only the recommendation
/// service calls this.
pub(crate) fn verify_in(
    conn: &Connection,
    diagnosis: &Diagnosis,
    disease_id: i64,
    verifier_id: i64,
    at: DateTime<Utc>,
) -> Result<Diagnosis, ServiceError> {
    if diagnosis.is_verified {
        return Err(ServiceError::InvalidState(format!(
            "diagnosis {} is already verified",
            diagnosis.id
        )));
    }
    if disease_id != diagnosis.disease_id {
        catalog::get_disease(conn, disease_id)?;
        apply_relabel(conn, diagnosis, disease_id)?;
    }
    if repository::mark_diagnosis_verified(conn, diagnosis.id, verifier_id, &at)? == 0 {
        return Err(ServiceError::Conflict(format!(
            "diagnosis {} was verified concurrently",
            diagnosis.id
        )));
    }

    let verified = load(conn, diagnosis.id)?;
    audit::record_update(
        conn,
        Some(verifier_id),
        audit::DIAGNOSES,
        diagnosis.id,
        diagnosis,
        &verified,
        &at,
    )?;
    tracing::info!(diagnosis_id = diagnosis.id, verifier_id, "Diagnosis verified");
    Ok(verified)
}

// ═══════════════════════════════════════════════════════════
// Recreate
// ═══════════════════════════════════════════════════════════

/// Replace an unverified diagnosis with a fresh one produced by another
/// model over the same image. The old id is gone afterwards.
///
/// Inference runs before the transaction opens; the diagnosis is then
/// re-checked, so a verification or deletion that committed meanwhile
/// makes this call fail instead of clobbering it.
pub fn recreate(
    conn: &mut Connection,
    actor: &Actor,
    id: i64,
    model: &str,
    engine: &dyn InferenceEngine,
    now: DateTime<Utc>,
) -> Result<Diagnosis, ServiceError> {
    require_elevated(actor, "recreating a diagnosis")?;
    let model = model.trim();
    if model.is_empty() {
        return Err(ServiceError::Validation("model identifier must not be empty".into()));
    }

    let original = load(conn, id)?;
    if original.is_verified {
        tracing::warn!(diagnosis_id = id, "Recreate rejected: diagnosis already verified");
        return Err(ServiceError::InvalidState(format!(
            "diagnosis {id} is verified and cannot be recreated"
        )));
    }
    if original.model_type == model {
        return Err(ServiceError::Validation(format!(
            "diagnosis {id} was already produced by model '{model}'"
        )));
    }

    let prediction = engine.predict(&original.image_ref, model).map_err(|e| match e {
        InferenceError::NotConfigured => ServiceError::Validation(
            "recreating a diagnosis needs an inference service; none is configured".into(),
        ),
        other => ServiceError::Inference(other),
    })?;
    if !prediction.confidence.is_finite() || !(0.0..=1.0).contains(&prediction.confidence) {
        return Err(ServiceError::Inference(InferenceError::ResponseParsing(format!(
            "confidence {} is outside [0, 1]",
            prediction.confidence
        ))));
    }
    let disease = catalog::find_disease_by_name(conn, &prediction.label)?.ok_or_else(|| {
        ServiceError::Validation(format!(
            "inference label '{}' is not in the disease catalog",
            prediction.label
        ))
    })?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = load(&tx, id)?;
    if current.is_verified || repository::get_recommendation_for_diagnosis(&tx, id)?.is_some() {
        tracing::warn!(diagnosis_id = id, "Recreate lost race with verification");
        return Err(ServiceError::Conflict(format!(
            "diagnosis {id} was verified while recreating"
        )));
    }
    if repository::delete_unverified_diagnosis(&tx, id)? == 0 {
        return Err(ServiceError::Conflict(format!("diagnosis {id} changed concurrently")));
    }

    let replacement = NewDiagnosis {
        image_ref: current.image_ref.clone(),
        disease_id: disease.id,
        confidence: prediction.confidence,
        model_type: model.to_string(),
        model_accuracy: prediction.model_accuracy,
        heatmap_ref: prediction.heatmap_ref,
    };
    let new_id = repository::insert_diagnosis(&tx, &replacement, &now)?;
    let created = load(&tx, new_id)?;
    audit::record_delete(&tx, Some(actor.id), audit::DIAGNOSES, id, &current, &now)?;
    audit::record_create(&tx, Some(actor.id), audit::DIAGNOSES, new_id, &created, &now)?;
    tx.commit()?;

    tracing::info!(
        old_id = id,
        new_id,
        model,
        actor_id = actor.id,
        "Diagnosis recreated"
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::inference::{FixedInference, Prediction, UnconfiguredInference};
    use crate::recommendation::{self, CreateRecommendation};
    use crate::testing::{file_db, insert_diagnosis, memory_db, new_diagnosis, ts, Seeded};
    use std::path::PathBuf;

    fn predicts(label: &str) -> FixedInference {
        FixedInference(Prediction {
            label: label.into(),
            confidence: 0.77,
            model_accuracy: Some(91.0),
            heatmap_ref: None,
        })
    }

    #[test]
    fn submit_validates_input() {
        let (mut conn, s) = memory_db();
        let now = ts(2024, 1, 1, 8);

        let mut bad = new_diagnosis(s.blight, 1.2);
        assert_eq!(submit(&mut conn, &bad, now).unwrap_err().kind(), ErrorKind::Validation);
        bad.confidence = 0.5;
        bad.image_ref = " ".into();
        assert_eq!(submit(&mut conn, &bad, now).unwrap_err().kind(), ErrorKind::Validation);

        let unknown = new_diagnosis(999, 0.5);
        assert_eq!(submit(&mut conn, &unknown, now).unwrap_err().kind(), ErrorKind::NotFound);

        let ok = submit(&mut conn, &new_diagnosis(s.blight, 0.82), now).unwrap();
        assert!(!ok.is_verified);
        assert!(!ok.manually_changed);
        assert_eq!(ok.created_at, now);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (conn, _) = memory_db();
        assert_eq!(get(&conn, 42).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn list_pages_ten_newest_first() {
        let (conn, s) = memory_db();
        for day in 1..=12 {
            insert_diagnosis(&conn, s.blight, 0.5, ts(2024, 1, day, 8));
        }
        let first = list(&conn, 1).unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.page_size, 10);
        assert_eq!(first.items[0].diagnosis.created_at, ts(2024, 1, 12, 8));
        assert_eq!(first.items[0].disease_name, "Late blight");
        assert_eq!(list(&conn, 2).unwrap().items.len(), 2);
    }

    #[test]
    fn relabel_sets_marker_once_and_keeps_prediction() {
        let (mut conn, s) = memory_db();
        let agro = Actor::agronomist(s.agronomist);
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));

        let moved = relabel(&mut conn, &agro, id, s.mildew, ts(2024, 1, 1, 9)).unwrap();
        assert_eq!(moved.disease_id, s.mildew);
        assert!(moved.manually_changed);
        assert_eq!(moved.ml_disease_id, Some(s.blight));

        // Back to the prediction: marker and original label survive.
        let back = relabel(&mut conn, &agro, id, s.blight, ts(2024, 1, 1, 10)).unwrap();
        assert_eq!(back.disease_id, s.blight);
        assert!(back.manually_changed);
        assert_eq!(back.ml_disease_id, Some(s.blight));
    }

    #[test]
    fn relabel_to_same_disease_is_noop() {
        let (mut conn, s) = memory_db();
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        let same = relabel(
            &mut conn,
            &Actor::agronomist(s.agronomist),
            id,
            s.blight,
            ts(2024, 1, 1, 9),
        )
        .unwrap();
        assert!(!same.manually_changed);
        assert!(same.ml_disease_id.is_none());
    }

    #[test]
    fn relabel_checks_role_and_disease() {
        let (mut conn, s) = memory_db();
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        let now = ts(2024, 1, 1, 9);
        let err = relabel(&mut conn, &Actor::operator(s.operator), id, s.mildew, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = relabel(&mut conn, &Actor::agronomist(s.agronomist), id, 999, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn verified_diagnosis_is_frozen() {
        let (mut conn, s) = memory_db();
        let agro = Actor::agronomist(s.agronomist);
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        let d = get(&conn, id).unwrap();
        verify_in(&conn, &d, d.disease_id, s.agronomist, ts(2024, 1, 1, 9)).unwrap();

        let err = relabel(&mut conn, &agro, id, s.mildew, ts(2024, 1, 1, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = recreate(
            &mut conn,
            &agro,
            id,
            "yolo11",
            &predicts("Powdery mildew"),
            ts(2024, 1, 1, 10),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let verified = get(&conn, id).unwrap();
        let err = verify_in(
            &conn,
            &verified,
            s.mildew,
            s.agronomist,
            ts(2024, 1, 1, 11),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(get(&conn, id).unwrap().disease_id, s.blight);
    }

    #[test]
    fn verify_applies_relabel_semantics() {
        let (conn, s) = memory_db();
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        let d = get(&conn, id).unwrap();
        let v = verify_in(&conn, &d, s.mildew, s.agronomist, ts(2024, 1, 1, 9)).unwrap();
        assert!(v.is_verified);
        assert_eq!(v.verified_by, Some(s.agronomist));
        assert_eq!(v.verified_at, Some(ts(2024, 1, 1, 9)));
        assert_eq!(v.disease_id, s.mildew);
        assert_eq!(v.ml_disease_id, Some(s.blight));
        assert!(v.manually_changed);
    }

    #[test]
    fn recreate_replaces_with_new_id() {
        let (mut conn, s) = memory_db();
        // Occupy id 7 like the walkthrough scenario.
        for _ in 0..6 {
            insert_diagnosis(&conn, s.blight, 0.5, ts(2024, 1, 1, 7));
        }
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        assert_eq!(id, 7);

        let agro = Actor::agronomist(s.agronomist);
        let fresh = recreate(
            &mut conn,
            &agro,
            id,
            "yolo11",
            &predicts("Powdery mildew"),
            ts(2024, 1, 1, 9),
        )
        .unwrap();
        assert_eq!(fresh.id, 8);
        assert_eq!(fresh.image_ref, "plants/2024/01/01/leaf.jpg");
        assert_eq!(fresh.model_type, "yolo11");
        assert_eq!(fresh.disease_id, s.mildew);
        assert!(!fresh.is_verified);
        assert_eq!(get(&conn, id).unwrap_err().kind(), ErrorKind::NotFound);

        let trail = repository::audit_trail_for(&conn, audit::DIAGNOSES, id).unwrap();
        assert_eq!(trail.last().unwrap().action, crate::models::enums::AuditAction::Delete);
    }

    #[test]
    fn recreate_rejects_same_model_unknown_label_and_missing_engine() {
        let (mut conn, s) = memory_db();
        let agro = Actor::agronomist(s.agronomist);
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        let now = ts(2024, 1, 1, 9);

        let err = recreate(
            &mut conn,
            &agro,
            id,
            "effnet",
            &predicts("Late blight"),
            now,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = recreate(
            &mut conn,
            &agro,
            id,
            "vit",
            &predicts("Mosaic virus"),
            now,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = recreate(&mut conn, &agro, id, "vit", &UnconfiguredInference, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Nothing was deleted by the failed attempts.
        assert!(get(&conn, id).is_ok());
    }

    #[test]
    fn recreate_missing_is_not_found() {
        let (mut conn, s) = memory_db();
        let err = recreate(
            &mut conn,
            &Actor::administrator(s.admin),
            77,
            "vit",
            &predicts("Late blight"),
            ts(2024, 1, 1, 9),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    /// Engine that commits a recommendation for the diagnosis through a
    /// second connection while the prediction is "running".
    struct RecommendsDuringPredict {
        db: PathBuf,
        seeded: Seeded,
        diagnosis_id: i64,
        now: DateTime<Utc>,
    }

    impl InferenceEngine for RecommendsDuringPredict {
        fn predict(&self, _image_ref: &str, _model: &str) -> Result<Prediction, InferenceError> {
            let mut other = crate::db::connect(&self.db).unwrap();
            let input = CreateRecommendation {
                diagnosis_id: self.diagnosis_id,
                treatment_plan_text: "Copper spray every 7 days".into(),
                operator_id: self.seeded.operator,
                deadline: self.now + chrono::Duration::days(2),
                task_description: None,
            };
            let agro = Actor::agronomist(self.seeded.agronomist);
            recommendation::create(&mut other, &agro, &input, self.now).unwrap();
            Ok(Prediction {
                label: "Powdery mildew".into(),
                confidence: 0.9,
                model_accuracy: None,
                heatmap_ref: None,
            })
        }
    }

    #[test]
    fn recreate_conflicts_with_recommendation_committed_meanwhile() {
        let dir = tempfile::tempdir().unwrap();
        let (db, s) = file_db(&dir);
        let mut conn = crate::db::connect(&db).unwrap();
        let now = ts(2024, 1, 1, 9);
        let id = insert_diagnosis(&conn, s.blight, 0.82, ts(2024, 1, 1, 8));
        let engine = RecommendsDuringPredict {
            db: db.clone(),
            seeded: s,
            diagnosis_id: id,
            now,
        };

        let agro = Actor::agronomist(s.agronomist);
        let err = recreate(&mut conn, &agro, id, "vit", &engine, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let original = get(&conn, id).unwrap();
        assert!(original.is_verified);
        assert_eq!(original.disease_id, s.blight);
        assert_eq!(repository::count_diagnoses(&conn).unwrap(), 1);
        assert!(repository::get_recommendation_for_diagnosis(&conn, id).unwrap().is_some());
    }
}
