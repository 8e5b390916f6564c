//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a `&Connection`; callers that need atomicity pass
//! a `rusqlite::Transaction`, which derefs to `Connection`.

mod audit;
mod diagnosis;
mod disease;
mod recommendation;
mod report;
mod stats;
mod task;
mod user;

// Re-export all public items from sub-modules
pub use audit::*;
pub use diagnosis::*;
pub use disease::*;
pub use recommendation::*;
pub use report::*;
pub use stats::*;
pub use task::*;
pub use user::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::*;
    use crate::models::enums::*;
    use rusqlite::Connection;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn make_diagnosis(conn: &Connection, disease_id: i64, at: chrono::DateTime<Utc>) -> i64 {
        insert_diagnosis(
            conn,
            &NewDiagnosis {
                image_ref: "plants/2024/01/01/leaf.jpg".into(),
                disease_id,
                confidence: 0.82,
                model_type: "effnet".into(),
                model_accuracy: Some(94.5),
                heatmap_ref: None,
            },
            &at,
        )
        .unwrap()
    }

    #[test]
    fn disease_lookup_by_id_and_name() {
        let conn = test_db();
        let id = insert_disease(&conn, "Late blight", "Oomycete", "Dark lesions").unwrap();
        assert_eq!(get_disease(&conn, id).unwrap().unwrap().name, "Late blight");
        assert_eq!(find_disease_by_name(&conn, "Late blight").unwrap().unwrap().id, id);
        assert!(find_disease_by_name(&conn, "Rust").unwrap().is_none());
    }

    #[test]
    fn duplicate_disease_name_is_constraint_violation() {
        let conn = test_db();
        insert_disease(&conn, "Rust", "", "").unwrap();
        let err = insert_disease(&conn, "Rust", "", "").unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn treatments_listed_per_disease() {
        let conn = test_db();
        let blight = insert_disease(&conn, "Late blight", "", "").unwrap();
        let rust = insert_disease(&conn, "Rust", "", "").unwrap();
        insert_treatment(&conn, blight, "Copper spray", "Foliar", "2 g/l", "Gloves").unwrap();
        insert_treatment(&conn, rust, "Sulfur", "Dust", "5 g/m2", "Mask").unwrap();
        let found = list_treatments(&conn, blight).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Copper spray");
    }

    #[test]
    fn users_filtered_by_role_and_activity() {
        let conn = test_db();
        let op = insert_user(&conn, "op1", "Olga Operator", Role::Operator).unwrap();
        let gone = insert_user(&conn, "op2", "Oleg Operator", Role::Operator).unwrap();
        insert_user(&conn, "agro", "Anna Agronomist", Role::Agronomist).unwrap();
        set_user_active(&conn, gone, false).unwrap();

        let operators = list_users_by_role(&conn, Role::Operator).unwrap();
        assert_eq!(operators.len(), 1);
        assert_eq!(operators[0].id, op);
        assert_eq!(get_user(&conn, op).unwrap().unwrap().role, Role::Operator);
        assert!(!get_user(&conn, gone).unwrap().unwrap().is_active);
    }

    #[test]
    fn diagnosis_insert_and_retrieve() {
        let conn = test_db();
        let disease = insert_disease(&conn, "Late blight", "", "").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let id = make_diagnosis(&conn, disease, at);

        let diag = get_diagnosis(&conn, id).unwrap().unwrap();
        assert_eq!(diag.disease_id, disease);
        assert_eq!(diag.created_at, at);
        assert!(!diag.is_verified);
        assert!(!diag.manually_changed);
        assert_eq!(diag.predicted_disease_id(), disease);
    }

    #[test]
    fn verified_diagnosis_rejects_relabel_and_delete() {
        let conn = test_db();
        let a = insert_disease(&conn, "A", "", "").unwrap();
        let b = insert_disease(&conn, "B", "", "").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let id = make_diagnosis(&conn, a, at);

        assert_eq!(mark_diagnosis_verified(&conn, id, 9, &at).unwrap(), 1);
        assert_eq!(mark_diagnosis_verified(&conn, id, 9, &at).unwrap(), 0);
        assert_eq!(update_diagnosis_disease(&conn, id, b, Some(a), true).unwrap(), 0);
        assert_eq!(delete_unverified_diagnosis(&conn, id).unwrap(), 0);
        assert_eq!(get_diagnosis(&conn, id).unwrap().unwrap().disease_id, a);
    }

    #[test]
    fn diagnosis_pages_are_newest_first() {
        let conn = test_db();
        let disease = insert_disease(&conn, "Rust", "", "").unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for i in 0..12 {
            make_diagnosis(&conn, disease, base + Duration::hours(i));
        }
        let first = list_diagnosis_views(&conn, &PageRequest::new(1, 10)).unwrap();
        let second = list_diagnosis_views(&conn, &PageRequest::new(2, 10)).unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 2);
        assert_eq!(first[0].diagnosis.created_at, base + Duration::hours(11));
        assert_eq!(first[0].disease_name, "Rust");
        assert_eq!(second[1].diagnosis.created_at, base);
        assert_eq!(count_diagnoses(&conn).unwrap(), 12);
    }

    #[test]
    fn second_recommendation_for_diagnosis_is_rejected() {
        let conn = test_db();
        let disease = insert_disease(&conn, "Rust", "", "").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let diag = make_diagnosis(&conn, disease, now);
        insert_recommendation(&conn, diag, 2, "Spray", RecommendationStatus::New, &now).unwrap();
        let err = insert_recommendation(&conn, diag, 2, "Again", RecommendationStatus::New, &now)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn task_status_update_is_compare_and_set() {
        let conn = test_db();
        let disease = insert_disease(&conn, "Rust", "", "").unwrap();
        let op = insert_user(&conn, "op", "Operator", Role::Operator).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let diag = make_diagnosis(&conn, disease, now);
        let rec = insert_recommendation(&conn, diag, 2, "Spray", RecommendationStatus::New, &now)
            .unwrap();
        let task = insert_task(&conn, rec, op, "Spray", &(now + Duration::days(1)), &now).unwrap();

        let stale = update_task_status(
            &conn,
            task,
            TaskStatus::InProgress,
            TaskStatus::Closed,
            Some(&now),
        )
        .unwrap();
        assert_eq!(stale, 0);

        let applied =
            update_task_status(&conn, task, TaskStatus::Assigned, TaskStatus::InProgress, None)
                .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(get_task(&conn, task).unwrap().unwrap().status, TaskStatus::InProgress);
        assert_eq!(get_task(&conn, task).unwrap().unwrap().recommendation_id, rec);
    }

    #[test]
    fn closed_task_rejected_by_trigger() {
        let conn = test_db();
        let disease = insert_disease(&conn, "Rust", "", "").unwrap();
        let op = insert_user(&conn, "op", "Operator", Role::Operator).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let diag = make_diagnosis(&conn, disease, now);
        let rec = insert_recommendation(&conn, diag, 2, "Spray", RecommendationStatus::New, &now)
            .unwrap();
        let task = insert_task(&conn, rec, op, "Spray", &(now + Duration::days(1)), &now).unwrap();
        update_task_status(&conn, task, TaskStatus::Assigned, TaskStatus::Closed, Some(&now))
            .unwrap();

        let err = conn
            .execute("UPDATE tasks SET status = 'assigned' WHERE id = ?1", [task])
            .map_err(DatabaseError::from)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn audit_entries_round_trip_json() {
        let conn = test_db();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let new = serde_json::json!({"status": "closed"});
        insert_audit_entry(&conn, Some(4), AuditAction::Update, "tasks", 7, None, Some(&new), &at)
            .unwrap();
        let trail = audit_trail_for(&conn, "tasks", 7).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::Update);
        assert_eq!(trail[0].new_values.as_ref().unwrap()["status"], "closed");
        assert!(trail[0].old_values.is_none());
        assert_eq!(count_audit_entries(&conn).unwrap(), 1);
    }

    #[test]
    fn reports_scoped_by_author() {
        let conn = test_db();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data = serde_json::json!({"diagnostics": {"total": 0}});
        let mine = insert_report(&conn, 1, "kpi", &at, &at, &data, &at).unwrap();
        insert_report(&conn, 2, "kpi", &at, &at, &data, &at).unwrap();
        set_report_file_path(&conn, mine, "/tmp/report_1.json").unwrap();

        let own = list_reports(&conn, Some(1), &PageRequest::new(1, 10)).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].file_path, "/tmp/report_1.json");
        assert_eq!(count_reports(&conn, None).unwrap(), 2);
        assert_eq!(get_report(&conn, mine).unwrap().unwrap().data, data);
    }
}
