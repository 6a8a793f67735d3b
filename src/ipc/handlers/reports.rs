use crate::db;
use crate::grades::{self, GradingPolicy, PupilReport, ScoreRecord, Term};
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::handlers::setup::grading_policy;
use crate::ipc::helpers::{required_str, required_term};
use crate::ipc::types::{AppState, Request};
use crate::roster::Pupil;
use rusqlite::Connection;
use serde_json::json;

struct ClassSnapshot {
    roster: Vec<Pupil>,
    scores: Vec<ScoreRecord>,
    subject_percentage_total: Option<f64>,
    policy: GradingPolicy,
}

fn load_class_snapshot(
    conn: &Connection,
    class_name: &str,
    academic_year: &str,
) -> Result<ClassSnapshot, HandlerErr> {
    let roster = db::load_roster(conn, Some(class_name), academic_year)
        .map_err(db_err("db_query_failed"))?;
    let scores = db::load_class_scores(conn, class_name, academic_year)
        .map_err(db_err("db_query_failed"))?;
    let subject_percentage_total = db::subject_percentage_total(conn, class_name, academic_year)
        .map_err(db_err("db_query_failed"))?;
    let policy = grading_policy(conn)?;
    Ok(ClassSnapshot {
        roster,
        scores,
        subject_percentage_total,
        policy,
    })
}

fn report_json(report: &PupilReport, snapshot: &ClassSnapshot) -> serde_json::Value {
    let name = snapshot
        .roster
        .iter()
        .find(|p| p.student_id == report.pupil_id)
        .map(|p| p.name.clone());
    let bands: serde_json::Map<String, serde_json::Value> = report
        .subjects
        .iter()
        .map(|s| {
            (
                s.subject.clone(),
                json!(grades::grade_band(s.mean as f64, &snapshot.policy)),
            )
        })
        .collect();
    let mut v = json!(report);
    if let Some(obj) = v.as_object_mut() {
        obj.insert("name".into(), json!(name));
        obj.insert("bands".into(), serde_json::Value::Object(bands));
    }
    v
}

fn class_and_term(req: &Request) -> Result<(String, String, Term), HandlerErr> {
    Ok((
        required_str(req, "className")?,
        required_str(req, "academicYear")?,
        required_term(req)?,
    ))
}

fn handle_subject_rankings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let (class_name, academic_year, term) = class_and_term(req)?;
        let scores = db::load_class_scores(conn, &class_name, &academic_year)
            .map_err(db_err("db_query_failed"))?;
        Ok(json!({
            "term": term,
            "rankings": grades::compute_subject_rankings(&scores, term)
        }))
    });
    respond(&req.id, result)
}

fn handle_pupil_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let (class_name, academic_year, term) = class_and_term(req)?;
        let pupil_id = required_str(req, "pupilId")?;
        let snapshot = load_class_snapshot(conn, &class_name, &academic_year)?;
        let report = grades::build_pupil_report(
            &pupil_id,
            &snapshot.scores,
            term,
            snapshot.subject_percentage_total,
        );
        Ok(report_json(&report, &snapshot))
    });
    respond(&req.id, result)
}

fn handle_class_reports(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let (class_name, academic_year, term) = class_and_term(req)?;
        let snapshot = load_class_snapshot(conn, &class_name, &academic_year)?;
        let reports: Vec<serde_json::Value> = grades::build_class_reports(
            &snapshot.scores,
            term,
            snapshot.subject_percentage_total,
        )
        .iter()
        .map(|r| report_json(r, &snapshot))
        .collect();
        Ok(json!({ "term": term, "reports": reports }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.subjectRankings" => Some(handle_subject_rankings(state, req)),
        "reports.pupilReport" => Some(handle_pupil_report(state, req)),
        "reports.classReports" => Some(handle_class_reports(state, req)),
        _ => None,
    }
}
