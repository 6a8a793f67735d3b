use crate::assignments::ClassSubjects;
use crate::db;
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::helpers::{optional_f64, required_str, required_subjects};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        let total = db::subject_percentage_total(conn, &class_name, &academic_year)
            .map_err(db_err("db_query_failed"))?;
        Ok(json!({
            "className": class_name,
            "academicYear": academic_year,
            "subjectPercentageTotal": total
        }))
    });
    respond(&req.id, result)
}

fn handle_classes_config_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        // null clears the override so the per-subject default applies.
        let total = optional_f64(req, "subjectPercentageTotal")?;
        if let Some(t) = total {
            if t < 0.0 {
                return Err(HandlerErr::bad_params("subjectPercentageTotal must be >= 0")
                    .with_details(json!({ "subjectPercentageTotal": t })));
            }
        }
        conn.execute(
            "INSERT INTO class_configs(class_name, academic_year, subject_percentage_total)
             VALUES(?, ?, ?)
             ON CONFLICT(class_name, academic_year) DO UPDATE SET
               subject_percentage_total = excluded.subject_percentage_total",
            (&class_name, &academic_year, total),
        )
        .map_err(db_err("db_update_failed"))?;
        Ok(json!({
            "className": class_name,
            "academicYear": academic_year,
            "subjectPercentageTotal": total
        }))
    });
    respond(&req.id, result)
}

fn handle_classes_subjects_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let subjects = required_subjects(req, "subjects")?;

        let tx = conn
            .unchecked_transaction()
            .map_err(db_err("db_tx_failed"))?;
        tx.execute("DELETE FROM class_subjects WHERE class_name = ?", [&class_name])
            .map_err(db_err("db_delete_failed"))?;
        for (position, subject) in subjects.iter().enumerate() {
            tx.execute(
                "INSERT INTO class_subjects(class_name, subject, position) VALUES(?, ?, ?)",
                (&class_name, subject, position as i64),
            )
            .map_err(|e| {
                HandlerErr::new("db_insert_failed", e.to_string())
                    .with_details(json!({ "table": "class_subjects" }))
            })?;
        }
        tx.commit().map_err(db_err("db_tx_failed"))?;

        Ok(json!(ClassSubjects {
            class_name,
            subjects,
        }))
    });
    respond(&req.id, result)
}

fn handle_classes_subjects_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let catalog = db::load_class_subjects(conn, Some(&class_name))
            .map_err(db_err("db_query_failed"))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                HandlerErr::new("not_found", "class has no subject catalog")
                    .with_details(json!({ "className": class_name }))
            })?;
        Ok(json!(catalog))
    });
    respond(&req.id, result)
}

fn handle_classes_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let classes = db::load_class_subjects(conn, None).map_err(db_err("db_query_failed"))?;
        Ok(json!({ "classes": classes }))
    });
    respond(&req.id, result)
}

fn handle_classes_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let removed = conn
            .execute("DELETE FROM class_subjects WHERE class_name = ?", [&class_name])
            .map_err(db_err("db_delete_failed"))?;
        if removed == 0 {
            return Err(HandlerErr::new("not_found", "class has no subject catalog"));
        }
        Ok(json!({ "ok": true }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.config.get" => Some(handle_classes_config_get(state, req)),
        "classes.config.set" => Some(handle_classes_config_set(state, req)),
        "classes.subjects.set" => Some(handle_classes_subjects_set(state, req)),
        "classes.subjects.get" => Some(handle_classes_subjects_get(state, req)),
        "classes.subjects.list" => Some(handle_classes_subjects_list(state, req)),
        "classes.subjects.delete" => Some(handle_classes_subjects_delete(state, req)),
        _ => None,
    }
}
