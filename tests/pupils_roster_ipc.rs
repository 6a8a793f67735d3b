mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

const YEAR: &str = "2024/2025";

#[test]
fn register_list_summarize_and_delete_pupils() {
    let workspace = temp_dir("schoolbook-roster");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let generated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "pupils.register",
        json!({ "name": "Ama", "className": "JSS1", "academicYear": YEAR, "gender": "F" }),
    );
    let generated_id = generated
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("generated id")
        .to_string();
    assert_eq!(generated_id.len(), 8);
    assert_eq!(generated.get("gender").and_then(|v| v.as_str()), Some("female"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "pupils.register",
        json!({ "studentId": "S2", "name": "Kofi", "className": "JSS1", "academicYear": YEAR, "gender": "male" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "pupils.register",
        json!({ "studentId": "S3", "name": "Efua", "className": "JSS2", "academicYear": YEAR }),
    );

    let bad_gender = request(
        &mut stdin,
        &mut reader,
        "5",
        "pupils.register",
        json!({ "studentId": "S4", "name": "Yaw", "className": "JSS2", "academicYear": YEAR, "gender": "x" }),
    );
    assert_eq!(error_code(&bad_gender), Some("bad_params"));

    let jss1 = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "pupils.list",
        json!({ "className": "JSS1", "academicYear": YEAR }),
    );
    assert_eq!(
        jss1.get("pupils").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "pupils.summary",
        json!({ "academicYear": YEAR }),
    );
    assert_eq!(
        summary.get("perClass"),
        Some(&json!([
            { "className": "JSS1", "pupils": 2 },
            { "className": "JSS2", "pupils": 1 }
        ]))
    );
    assert_eq!(
        summary.get("genders"),
        Some(&json!({ "male": 1, "female": 1, "other": 1, "total": 3 }))
    );

    // Re-registering the same id moves the pupil instead of duplicating it.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "pupils.register",
        json!({ "studentId": "S2", "name": "Kofi", "className": "JSS2", "academicYear": YEAR, "gender": "male" }),
    );
    let everyone = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "pupils.list",
        json!({ "academicYear": YEAR }),
    );
    assert_eq!(
        everyone.get("pupils").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(3)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "grades.upsert",
        json!({
            "pupilId": "S3", "subject": "Math", "test": "Term 1 T1", "grade": 60,
            "className": "JSS2", "academicYear": YEAR
        }),
    );
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "pupils.delete",
        json!({ "studentId": "S3", "academicYear": YEAR }),
    );
    assert_eq!(deleted.get("scoresDeleted"), Some(&json!(1)));

    let missing = request(
        &mut stdin,
        &mut reader,
        "12",
        "pupils.delete",
        json!({ "studentId": "S3", "academicYear": YEAR }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
