use crate::db;
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::helpers::{optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, Gender};
use serde_json::json;
use uuid::Uuid;

fn handle_pupils_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let name = required_str(req, "name")?;
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        let gender = optional_str(req, "gender")?
            .map(|g| {
                g.parse::<Gender>()
                    .map_err(|e| HandlerErr::bad_params(e.to_string()))
            })
            .transpose()?;
        let student_id = optional_str(req, "studentId")?.unwrap_or_else(|| {
            Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase()
        });

        conn.execute(
            "INSERT INTO pupils(id, student_id, name, class_name, academic_year, gender, registered_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, academic_year) DO UPDATE SET
               name = excluded.name,
               class_name = excluded.class_name,
               gender = excluded.gender",
            (
                Uuid::new_v4().to_string(),
                &student_id,
                &name,
                &class_name,
                &academic_year,
                gender.map(Gender::as_str),
                chrono::Utc::now().to_rfc3339(),
            ),
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "pupils" }))
        })?;

        Ok(json!({
            "studentId": student_id,
            "name": name,
            "className": class_name,
            "academicYear": academic_year,
            "gender": gender
        }))
    });
    respond(&req.id, result)
}

fn handle_pupils_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let academic_year = required_str(req, "academicYear")?;
        let class_name = optional_str(req, "className")?;
        let pupils = db::load_roster(conn, class_name.as_deref(), &academic_year)
            .map_err(db_err("db_query_failed"))?;
        Ok(json!({ "pupils": pupils }))
    });
    respond(&req.id, result)
}

fn handle_pupils_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let academic_year = required_str(req, "academicYear")?;
        let class_name = optional_str(req, "className")?;
        let pupils = db::load_roster(conn, class_name.as_deref(), &academic_year)
            .map_err(db_err("db_query_failed"))?;
        Ok(json!(roster::summarize(&pupils)))
    });
    respond(&req.id, result)
}

fn handle_pupils_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let student_id = required_str(req, "studentId")?;
        let academic_year = required_str(req, "academicYear")?;

        let tx = conn
            .unchecked_transaction()
            .map_err(db_err("db_tx_failed"))?;
        // Receipts are kept: they are financial records and reconcile skips them.
        let scores_deleted = tx
            .execute(
                "DELETE FROM scores WHERE pupil_id = ? AND academic_year = ?",
                (&student_id, &academic_year),
            )
            .map_err(|e| {
                HandlerErr::new("db_delete_failed", e.to_string())
                    .with_details(json!({ "table": "scores" }))
            })?;
        let removed = tx
            .execute(
                "DELETE FROM pupils WHERE student_id = ? AND academic_year = ?",
                (&student_id, &academic_year),
            )
            .map_err(|e| {
                HandlerErr::new("db_delete_failed", e.to_string())
                    .with_details(json!({ "table": "pupils" }))
            })?;
        if removed == 0 {
            return Err(HandlerErr::new("not_found", "pupil not found"));
        }
        tx.commit().map_err(db_err("db_tx_failed"))?;
        Ok(json!({ "ok": true, "scoresDeleted": scores_deleted }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "pupils.register" => Some(handle_pupils_register(state, req)),
        "pupils.list" => Some(handle_pupils_list(state, req)),
        "pupils.summary" => Some(handle_pupils_summary(state, req)),
        "pupils.delete" => Some(handle_pupils_delete(state, req)),
        _ => None,
    }
}
