use crate::db;
use crate::fees::{self, FeeFilter, FeeState, Receipt};
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::handlers::setup::{currency_label, default_fee_status_filter};
use crate::ipc::helpers::{optional_str, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn non_negative_amount(req: &Request, key: &str) -> Result<f64, HandlerErr> {
    let amount = required_f64(req, key)?;
    if amount < 0.0 {
        return Err(HandlerErr::bad_params(format!("{} must be >= 0", key))
            .with_details(json!({ key: amount })));
    }
    Ok(amount)
}

fn handle_schedule_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let class_name = required_str(req, "className")?;
        let academic_year = required_str(req, "academicYear")?;
        let total_amount = non_negative_amount(req, "totalAmount")?;
        conn.execute(
            "INSERT INTO fee_schedules(class_name, academic_year, total_amount)
             VALUES(?, ?, ?)
             ON CONFLICT(class_name, academic_year) DO UPDATE SET
               total_amount = excluded.total_amount",
            (&class_name, &academic_year, total_amount),
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "fee_schedules" }))
        })?;
        Ok(json!(fees::FeeScheduleRecord {
            class_name,
            academic_year,
            total_amount,
        }))
    });
    respond(&req.id, result)
}

fn handle_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let academic_year = required_str(req, "academicYear")?;
        let schedule =
            db::load_fee_schedule(conn, &academic_year).map_err(db_err("db_query_failed"))?;
        Ok(json!({ "schedule": schedule }))
    });
    respond(&req.id, result)
}

fn handle_receipts_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let student_id = required_str(req, "studentId")?;
        let academic_year = required_str(req, "academicYear")?;
        let amount = non_negative_amount(req, "amount")?;
        let class_name = match optional_str(req, "className")? {
            Some(c) => c,
            None => conn
                .query_row(
                    "SELECT class_name FROM pupils WHERE student_id = ? AND academic_year = ?",
                    (&student_id, &academic_year),
                    |r| r.get::<_, String>(0),
                )
                .optional()
                .map_err(db_err("db_query_failed"))?
                .ok_or_else(|| {
                    HandlerErr::bad_params("className is required for an unregistered pupil")
                        .with_details(json!({ "studentId": student_id }))
                })?,
        };
        let timestamp =
            optional_str(req, "timestamp")?.unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        let receipt = Receipt {
            receipt_id: Uuid::new_v4().to_string(),
            student_id,
            amount,
            academic_year,
            class_name,
            timestamp,
        };
        conn.execute(
            "INSERT INTO receipts(id, student_id, amount, academic_year, class_name, recorded_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &receipt.receipt_id,
                &receipt.student_id,
                receipt.amount,
                &receipt.academic_year,
                &receipt.class_name,
                &receipt.timestamp,
            ),
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "receipts" }))
        })?;
        tracing::info!(
            student_id = %receipt.student_id,
            amount = receipt.amount,
            "receipt recorded"
        );
        Ok(json!(receipt))
    });
    respond(&req.id, result)
}

fn handle_receipts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let academic_year = required_str(req, "academicYear")?;
        let student_id = optional_str(req, "studentId")?;
        let receipts = db::load_receipts(conn, &academic_year, student_id.as_deref())
            .map_err(db_err("db_query_failed"))?;
        Ok(json!({ "receipts": receipts }))
    });
    respond(&req.id, result)
}

fn load_statuses(
    conn: &Connection,
    academic_year: &str,
) -> Result<Vec<fees::FeeStatus>, HandlerErr> {
    let pupils = db::load_roster(conn, None, academic_year).map_err(db_err("db_query_failed"))?;
    let schedule =
        db::load_fee_schedule(conn, academic_year).map_err(db_err("db_query_failed"))?;
    let receipts =
        db::load_receipts(conn, academic_year, None).map_err(db_err("db_query_failed"))?;
    Ok(fees::reconcile(&pupils, &schedule, &receipts))
}

fn handle_reconcile(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let academic_year = required_str(req, "academicYear")?;
        // An explicit "all" disables the saved default status filter.
        let status = match optional_str(req, "status")? {
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.parse::<FeeState>().map_err(|e| {
                HandlerErr::bad_params(e.to_string()).with_details(json!({ "status": s }))
            })?),
            None => default_fee_status_filter(conn)?,
        };
        let filter = FeeFilter {
            class_name: optional_str(req, "className")?,
            status,
            search: optional_str(req, "search")?,
        };

        let statuses = fees::filter_statuses(load_statuses(conn, &academic_year)?, &filter);
        let totals = fees::summarize(&statuses);
        Ok(json!({
            "currencyLabel": currency_label(conn)?,
            "statuses": statuses,
            "totals": totals
        }))
    });
    respond(&req.id, result)
}

fn handle_debtors(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let academic_year = required_str(req, "academicYear")?;
        let filter = FeeFilter {
            class_name: optional_str(req, "className")?,
            ..FeeFilter::default()
        };
        let statuses = fees::filter_statuses(load_statuses(conn, &academic_year)?, &filter);
        Ok(json!({ "debtors": fees::debtors(&statuses) }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.schedule.set" => Some(handle_schedule_set(state, req)),
        "fees.schedule.list" => Some(handle_schedule_list(state, req)),
        "fees.receipts.record" => Some(handle_receipts_record(state, req)),
        "fees.receipts.list" => Some(handle_receipts_list(state, req)),
        "fees.reconcile" => Some(handle_reconcile(state, req)),
        "fees.debtors" => Some(handle_debtors(state, req)),
        _ => None,
    }
}
