mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn class_subject_catalog_set_get_and_delete() {
    let workspace = temp_dir("schoolbook-class-subjects");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.subjects.set",
        json!({ "className": "JSS1", "subjects": [" Math", "English", "Math", ""] }),
    );
    assert_eq!(saved.get("subjects"), Some(&json!(["Math", "English"])));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.subjects.set",
        json!({ "className": "JSS2", "subjects": ["Science"] }),
    );
    // Replacing a catalog drops subjects no longer listed.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.subjects.set",
        json!({ "className": "JSS1", "subjects": ["English", "Art"] }),
    );
    let one = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.subjects.get",
        json!({ "className": "JSS1" }),
    );
    assert_eq!(one.get("subjects"), Some(&json!(["English", "Art"])));

    let all = request_ok(&mut stdin, &mut reader, "6", "classes.subjects.list", json!({}));
    assert_eq!(
        all.get("classes"),
        Some(&json!([
            { "className": "JSS1", "subjects": ["English", "Art"] },
            { "className": "JSS2", "subjects": ["Science"] }
        ]))
    );

    let empty = request(
        &mut stdin,
        &mut reader,
        "7",
        "classes.subjects.set",
        json!({ "className": "JSS3", "subjects": ["  "] }),
    );
    assert_eq!(error_code(&empty), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.subjects.delete",
        json!({ "className": "JSS2" }),
    );
    let gone = request(
        &mut stdin,
        &mut reader,
        "9",
        "classes.subjects.get",
        json!({ "className": "JSS2" }),
    );
    assert_eq!(error_code(&gone), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn teachers_are_assigned_from_catalog_and_reported_by_name() {
    let workspace = temp_dir("schoolbook-teachers");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.subjects.set",
        json!({ "className": "JSS1", "subjects": ["Math", "English", "Science"] }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.subjects.set",
        json!({ "className": "JSS2", "subjects": ["Math"] }),
    );

    let no_catalog = request(
        &mut stdin,
        &mut reader,
        "4",
        "teachers.assign",
        json!({ "teacher": "Mr Bangura", "className": "SSS1", "subjects": ["Math"] }),
    );
    assert_eq!(error_code(&no_catalog), Some("bad_params"));

    let not_offered = request(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.assign",
        json!({ "teacher": "Mr Bangura", "className": "JSS2", "subjects": ["French"] }),
    );
    assert_eq!(error_code(&not_offered), Some("bad_params"));
    assert_eq!(
        not_offered.pointer("/error/details/unknownSubjects"),
        Some(&json!(["French"]))
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "teachers.assign",
        json!({ "teacher": "Mr Bangura", "className": "JSS2", "subjects": ["Math"] }),
    );
    let first_id = first
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignment id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "teachers.assign",
        json!({ "teacher": "Mr Bangura", "className": "JSS1", "subjects": ["Science"] }),
    );
    let kamara = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "teachers.assign",
        json!({ "teacher": "Mrs Kamara", "className": "JSS1", "subjects": ["English"] }),
    );

    // Same teacher and class again updates the existing row.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "teachers.assign",
        json!({ "teacher": "Mr Bangura", "className": "JSS1", "subjects": ["Science", "Math"] }),
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "teachers.assignments.list",
        json!({ "teacher": "Mr Bangura" }),
    );
    let rows = listed
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("className").and_then(|v| v.as_str()), Some("JSS1"));
    assert_eq!(rows[0].get("subjects"), Some(&json!(["Science", "Math"])));
    assert_eq!(rows[0].get("assignmentId"), again.get("assignmentId"));

    // Editing by id can move an assignment to another teacher.
    let kamara_id = kamara
        .get("assignmentId")
        .and_then(|v| v.as_str())
        .expect("assignment id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "teachers.assign",
        json!({
            "assignmentId": kamara_id,
            "teacher": "Ms Sesay",
            "className": "JSS1",
            "subjects": ["English"]
        }),
    );

    let report = request_ok(&mut stdin, &mut reader, "12", "teachers.report", json!({}));
    assert_eq!(
        report.get("teachers"),
        Some(&json!([
            {
                "teacher": "Mr Bangura",
                "classes": [
                    { "className": "JSS1", "subjects": ["Science", "Math"] },
                    { "className": "JSS2", "subjects": ["Math"] }
                ]
            },
            {
                "teacher": "Ms Sesay",
                "classes": [ { "className": "JSS1", "subjects": ["English"] } ]
            }
        ]))
    );

    let searched = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "teachers.report",
        json!({ "search": "sesay" }),
    );
    assert_eq!(
        searched
            .get("teachers")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "teachers.assignments.delete",
        json!({ "assignmentId": first_id }),
    );
    let missing = request(
        &mut stdin,
        &mut reader,
        "15",
        "teachers.assignments.delete",
        json!({ "assignmentId": first_id }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    let unknown_edit = request(
        &mut stdin,
        &mut reader,
        "16",
        "teachers.assign",
        json!({ "assignmentId": "nope", "teacher": "X", "className": "JSS2", "subjects": ["Math"] }),
    );
    assert_eq!(error_code(&unknown_edit), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
