mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

const YEAR: &str = "2024/2025";

fn status_for<'a>(statuses: &'a serde_json::Value, id: &str) -> &'a serde_json::Value {
    statuses
        .as_array()
        .and_then(|a| {
            a.iter()
                .find(|s| s.get("studentId").and_then(|v| v.as_str()) == Some(id))
        })
        .unwrap_or_else(|| panic!("no status for {}", id))
}

fn ids(list: &serde_json::Value) -> Vec<String> {
    list.as_array()
        .map(|a| {
            a.iter()
                .filter_map(|s| s.get("studentId").and_then(|v| v.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn reconcile_handles_missing_schedule_dangling_receipts_and_debtors() {
    let workspace = temp_dir("schoolbook-fees");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (i, (id, name, class)) in [
        ("S1", "Ama Mensah", "JSS1"),
        ("S2", "Kofi Boateng", "JSS2"),
        ("S3", "Efua Owusu", "JSS2"),
    ]
    .into_iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("reg-{}", i),
            "pupils.register",
            json!({ "studentId": id, "name": name, "className": class, "academicYear": YEAR }),
        );
    }

    // JSS1 has no schedule entry.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "fees.schedule.set",
        json!({ "className": "JSS2", "academicYear": YEAR, "totalAmount": 500 }),
    );

    for (i, (student, amount)) in [("S1", 20.0), ("S1", 30.0), ("S2", 100.0), ("S3", 500.0)]
        .into_iter()
        .enumerate()
    {
        let receipt = request_ok(
            &mut stdin,
            &mut reader,
            &format!("pay-{}", i),
            "fees.receipts.record",
            json!({ "studentId": student, "academicYear": YEAR, "amount": amount }),
        );
        assert!(receipt.get("receiptId").and_then(|v| v.as_str()).is_some());
        assert!(receipt.get("className").and_then(|v| v.as_str()).is_some());
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "fees.receipts.record",
        json!({ "studentId": "GHOST", "className": "JSS2", "academicYear": YEAR, "amount": 999 }),
    );

    let out = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "fees.reconcile",
        json!({ "academicYear": YEAR }),
    );
    assert_eq!(out.get("currencyLabel").and_then(|v| v.as_str()), Some("Le"));
    let statuses = out.get("statuses").expect("statuses");
    assert_eq!(ids(statuses).len(), 3);

    let s1 = status_for(statuses, "S1");
    assert_eq!(s1.get("totalFee").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(s1.get("totalPaid").and_then(|v| v.as_f64()), Some(50.0));
    assert_eq!(s1.get("outstanding").and_then(|v| v.as_f64()), Some(-50.0));
    assert_eq!(s1.get("status").and_then(|v| v.as_str()), Some("Paid"));

    let s2 = status_for(statuses, "S2");
    assert_eq!(s2.get("outstanding").and_then(|v| v.as_f64()), Some(400.0));
    assert_eq!(s2.get("status").and_then(|v| v.as_str()), Some("Owing"));

    let s3 = status_for(statuses, "S3");
    assert_eq!(s3.get("outstanding").and_then(|v| v.as_f64()), Some(0.0));
    assert_eq!(s3.get("status").and_then(|v| v.as_str()), Some("Paid"));

    assert_eq!(
        out.pointer("/totals/totalExpected").and_then(|v| v.as_f64()),
        Some(1000.0)
    );
    assert_eq!(
        out.pointer("/totals/totalCollected").and_then(|v| v.as_f64()),
        Some(650.0)
    );
    assert_eq!(
        out.pointer("/totals/totalOutstanding").and_then(|v| v.as_f64()),
        Some(350.0)
    );
    assert_eq!(out.pointer("/totals/owingCount"), Some(&json!(1)));

    let debtors = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "fees.debtors",
        json!({ "academicYear": YEAR }),
    );
    assert_eq!(ids(debtors.get("debtors").expect("debtors")), vec!["S2"]);

    let owing = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "fees.reconcile",
        json!({ "academicYear": YEAR, "status": "owing" }),
    );
    assert_eq!(ids(owing.get("statuses").expect("statuses")), vec!["S2"]);

    let searched = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "fees.reconcile",
        json!({ "academicYear": YEAR, "className": "JSS2", "search": "owusu" }),
    );
    assert_eq!(ids(searched.get("statuses").expect("statuses")), vec!["S3"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn saved_status_filter_applies_unless_overridden() {
    let workspace = temp_dir("schoolbook-fees-filter");
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
        "pupils.register",
        json!({ "studentId": "S1", "name": "Ama", "className": "JSS1", "academicYear": YEAR }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "pupils.register",
        json!({ "studentId": "S2", "name": "Kofi", "className": "JSS1", "academicYear": YEAR }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "fees.schedule.set",
        json!({ "className": "JSS1", "academicYear": YEAR, "totalAmount": 200 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "fees.receipts.record",
        json!({ "studentId": "S1", "academicYear": YEAR, "amount": 200 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "fees", "patch": { "defaultStatusFilter": "owing", "currencyLabel": "GHS" } }),
    );

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "fees.reconcile",
        json!({ "academicYear": YEAR }),
    );
    assert_eq!(ids(filtered.get("statuses").expect("statuses")), vec!["S2"]);
    assert_eq!(
        filtered.get("currencyLabel").and_then(|v| v.as_str()),
        Some("GHS")
    );

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "fees.reconcile",
        json!({ "academicYear": YEAR, "status": "all" }),
    );
    assert_eq!(ids(all.get("statuses").expect("statuses")).len(), 2);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_fee_inputs_are_rejected() {
    let workspace = temp_dir("schoolbook-fees-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let negative_fee = request(
        &mut stdin,
        &mut reader,
        "2",
        "fees.schedule.set",
        json!({ "className": "JSS1", "academicYear": YEAR, "totalAmount": -1 }),
    );
    assert_eq!(error_code(&negative_fee), Some("bad_params"));

    let negative_receipt = request(
        &mut stdin,
        &mut reader,
        "3",
        "fees.receipts.record",
        json!({ "studentId": "S1", "className": "JSS1", "academicYear": YEAR, "amount": -5 }),
    );
    assert_eq!(error_code(&negative_receipt), Some("bad_params"));

    let unknown_class = request(
        &mut stdin,
        &mut reader,
        "4",
        "fees.receipts.record",
        json!({ "studentId": "NOBODY", "academicYear": YEAR, "amount": 10 }),
    );
    assert_eq!(error_code(&unknown_class), Some("bad_params"));

    let bad_status = request(
        &mut stdin,
        &mut reader,
        "5",
        "fees.reconcile",
        json!({ "academicYear": YEAR, "status": "partial" }),
    );
    assert_eq!(error_code(&bad_status), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
