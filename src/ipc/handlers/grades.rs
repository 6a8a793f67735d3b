use crate::db;
use crate::grades::{self, ScoreRecord};
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::handlers::setup::grading_policy;
use crate::ipc::helpers::{optional_test, required_f64, required_str, required_test};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let pupil_id = required_str(req, "pupilId")?;
        let subject = required_str(req, "subject")?;
        let test = required_test(req, "test")?;
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        let grade = required_f64(req, "grade")?;

        let policy = grading_policy(conn)?;
        if !policy.accepts(grade) {
            return Err(HandlerErr::bad_params(format!(
                "grade must be between 0 and {}",
                policy.max_score
            ))
            .with_details(json!({ "grade": grade })));
        }

        conn.execute(
            "INSERT INTO scores(id, pupil_id, subject, test, grade, class_name, academic_year, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(pupil_id, subject, test, class_name, academic_year) DO UPDATE SET
               grade = excluded.grade,
               updated_at = excluded.updated_at",
            (
                Uuid::new_v4().to_string(),
                &pupil_id,
                &subject,
                test.to_string(),
                grade,
                &class_name,
                &academic_year,
                chrono::Utc::now().to_rfc3339(),
            ),
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "scores" }))
        })?;

        Ok(json!(ScoreRecord {
            pupil_id,
            subject,
            test,
            grade,
            class_name,
            academic_year,
        }))
    });
    respond(&req.id, result)
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let pupil_id = required_str(req, "pupilId")?;
        let subject = required_str(req, "subject")?;
        let test = required_test(req, "test")?;
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;

        let removed = conn
            .execute(
                "DELETE FROM scores
                 WHERE pupil_id = ? AND subject = ? AND test = ? AND class_name = ? AND academic_year = ?",
                (
                    &pupil_id,
                    &subject,
                    test.to_string(),
                    &class_name,
                    &academic_year,
                ),
            )
            .map_err(db_err("db_delete_failed"))?;
        if removed == 0 {
            return Err(HandlerErr::new("not_found", "grade not found"));
        }
        Ok(json!({ "ok": true }))
    });
    respond(&req.id, result)
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        let test = optional_test(req, "test")?;
        let mut scores = db::load_class_scores(conn, &class_name, &academic_year)
            .map_err(db_err("db_query_failed"))?;
        if let Some(t) = test {
            scores.retain(|s| s.test == t);
        }
        Ok(json!({ "grades": scores }))
    });
    respond(&req.id, result)
}

fn handle_grades_sheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        let test = required_test(req, "test")?;

        let roster = db::load_roster(conn, Some(&class_name), &academic_year)
            .map_err(db_err("db_query_failed"))?;
        let scores = db::load_class_scores(conn, &class_name, &academic_year)
            .map_err(db_err("db_query_failed"))?;
        let total = db::subject_percentage_total(conn, &class_name, &academic_year)
            .map_err(db_err("db_query_failed"))?;

        Ok(json!(grades::build_test_sheet(&roster, &scores, test, total)))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.upsert" => Some(handle_grades_upsert(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.sheet" => Some(handle_grades_sheet(state, req)),
        _ => None,
    }
}
