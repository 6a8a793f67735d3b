use crate::assignments::{self, TeacherAssignment};
use crate::db;
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::helpers::{optional_str, required_str, required_subjects};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

/// Assigned subjects must come from the class's subject catalog.
fn check_against_catalog(
    conn: &Connection,
    class_name: &str,
    subjects: &[String],
) -> Result<(), HandlerErr> {
    let catalog = db::load_class_subjects(conn, Some(class_name))
        .map_err(db_err("db_query_failed"))?
        .into_iter()
        .next()
        .ok_or_else(|| {
            HandlerErr::bad_params("class has no subject catalog")
                .with_details(json!({ "className": class_name }))
        })?;
    let unknown = assignments::subjects_outside_catalog(&catalog, subjects);
    if !unknown.is_empty() {
        return Err(HandlerErr::bad_params("subjects not offered by class")
            .with_details(json!({ "className": class_name, "unknownSubjects": unknown })));
    }
    Ok(())
}

fn handle_teachers_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let teacher = required_str(req, "teacher")?;
        let class_name = required_str(req, "className")?;
        let subjects = required_subjects(req, "subjects")?;
        let editing = optional_str(req, "assignmentId")?;
        check_against_catalog(conn, &class_name, &subjects)?;

        let subjects_json =
            serde_json::to_string(&subjects).map_err(db_err("db_update_failed"))?;

        let assignment_id = match editing {
            Some(id) => {
                let changed = conn
                    .execute(
                        "UPDATE teacher_assignments
                         SET teacher = ?, class_name = ?, subjects_json = ?
                         WHERE id = ?",
                        (&teacher, &class_name, &subjects_json, &id),
                    )
                    .map_err(db_err("db_update_failed"))?;
                if changed == 0 {
                    return Err(HandlerErr::new("not_found", "assignment not found")
                        .with_details(json!({ "assignmentId": id })));
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO teacher_assignments(id, teacher, class_name, subjects_json, created_at)
                     VALUES(?, ?, ?, ?, ?)
                     ON CONFLICT(teacher, class_name) DO UPDATE SET
                       subjects_json = excluded.subjects_json",
                    (
                        Uuid::new_v4().to_string(),
                        &teacher,
                        &class_name,
                        &subjects_json,
                        chrono::Utc::now().to_rfc3339(),
                    ),
                )
                .map_err(|e| {
                    HandlerErr::new("db_insert_failed", e.to_string())
                        .with_details(json!({ "table": "teacher_assignments" }))
                })?;
                conn.query_row(
                    "SELECT id FROM teacher_assignments WHERE teacher = ? AND class_name = ?",
                    (&teacher, &class_name),
                    |r| r.get::<_, String>(0),
                )
                .optional()
                .map_err(db_err("db_query_failed"))?
                .ok_or_else(|| HandlerErr::new("db_query_failed", "assignment vanished"))?
            }
        };

        tracing::info!(%teacher, class_name = %class_name, "teacher assigned");
        Ok(json!(TeacherAssignment {
            assignment_id,
            teacher,
            class_name,
            subjects,
        }))
    });
    respond(&req.id, result)
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let teacher = optional_str(req, "teacher")?;
        let class_name = optional_str(req, "className")?;
        let list = db::load_teacher_assignments(conn, teacher.as_deref(), class_name.as_deref())
            .map_err(db_err("db_query_failed"))?;
        Ok(json!({ "assignments": list }))
    });
    respond(&req.id, result)
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let id = required_str(req, "assignmentId")?;
        let removed = conn
            .execute("DELETE FROM teacher_assignments WHERE id = ?", [&id])
            .map_err(db_err("db_delete_failed"))?;
        if removed == 0 {
            return Err(HandlerErr::new("not_found", "assignment not found"));
        }
        Ok(json!({ "ok": true }))
    });
    respond(&req.id, result)
}

fn handle_teachers_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let search = optional_str(req, "search")?;
        let list =
            db::load_teacher_assignments(conn, None, None).map_err(db_err("db_query_failed"))?;
        Ok(json!({ "teachers": assignments::group_by_teacher(&list, search.as_deref()) }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.assign" => Some(handle_teachers_assign(state, req)),
        "teachers.assignments.list" => Some(handle_assignments_list(state, req)),
        "teachers.assignments.delete" => Some(handle_assignments_delete(state, req)),
        "teachers.report" => Some(handle_teachers_report(state, req)),
        _ => None,
    }
}
