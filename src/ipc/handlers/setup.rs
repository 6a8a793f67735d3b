use crate::db;
use crate::fees::FeeState;
use crate::grades::GradingPolicy;
use crate::ipc::error::{db_err, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
    Fees,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            "fees" => Some(Self::Fees),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
            Self::Fees => "setup.fees",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => {
            let p = GradingPolicy::default();
            json!({
                "maxScore": p.max_score,
                "passMark": p.pass_mark,
                "distinctionMark": p.distinction_mark
            })
        }
        SetupSection::Fees => json!({
            "currencyLabel": "Le",
            "defaultStatusFilter": "all"
        }),
    }
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("{} must be a number", key))?;
    if n < min || n > max {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "maxScore" => {
                    obj.insert(k.clone(), json!(parse_f64_range(v, k, 1.0, 1000.0)?));
                }
                "passMark" | "distinctionMark" => {
                    obj.insert(k.clone(), json!(parse_f64_range(v, k, 0.0, 1000.0)?));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::Fees => match k.as_str() {
                "currencyLabel" => {
                    let s = parse_string_max(v, k, 8)?;
                    if s.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "defaultStatusFilter" => {
                    let s = parse_string_max(v, k, 8)?.to_ascii_lowercase();
                    if s != "all" && s != "paid" && s != "owing" {
                        return Err("defaultStatusFilter must be one of: all, paid, owing".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown fees field: {}", k)),
            },
        }
    }

    if let SetupSection::Grading = section {
        let policy = policy_from_value(current);
        if policy.pass_mark > policy.distinction_mark || policy.distinction_mark > policy.max_score {
            return Err("expected passMark <= distinctionMark <= maxScore".into());
        }
    }
    Ok(())
}

fn policy_from_value(v: &Value) -> GradingPolicy {
    let d = GradingPolicy::default();
    let get = |k: &str, fallback: f64| v.get(k).and_then(|x| x.as_f64()).unwrap_or(fallback);
    GradingPolicy {
        max_score: get("maxScore", d.max_score),
        pass_mark: get("passMark", d.pass_mark),
        distinction_mark: get("distinctionMark", d.distinction_mark),
    }
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults.
            let mut candidate = current.clone();
            if merge_section_patch(section, &mut candidate, saved_obj).is_ok() {
                current = candidate;
            } else {
                tracing::warn!(section = section.key(), "ignoring invalid saved settings");
            }
        }
    }
    Ok(current)
}

pub fn grading_policy(conn: &rusqlite::Connection) -> Result<GradingPolicy, HandlerErr> {
    load_section(conn, SetupSection::Grading)
        .map(|v| policy_from_value(&v))
        .map_err(db_err("db_query_failed"))
}

pub fn currency_label(conn: &rusqlite::Connection) -> Result<String, HandlerErr> {
    let fees = load_section(conn, SetupSection::Fees).map_err(db_err("db_query_failed"))?;
    Ok(fees
        .get("currencyLabel")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

/// `None` means no status filter.
pub fn default_fee_status_filter(
    conn: &rusqlite::Connection,
) -> Result<Option<FeeState>, HandlerErr> {
    let fees = load_section(conn, SetupSection::Fees).map_err(db_err("db_query_failed"))?;
    Ok(fees
        .get("defaultStatusFilter")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<FeeState>().ok()))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let grading = load_section(conn, SetupSection::Grading).map_err(db_err("db_query_failed"))?;
        let fees = load_section(conn, SetupSection::Fees).map_err(db_err("db_query_failed"))?;
        Ok(json!({ "grading": grading, "fees": fees }))
    });
    respond(&req.id, result)
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = state.conn().and_then(|conn| {
        let section_raw = req
            .params
            .get("section")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerErr::bad_params("missing section"))?;
        let section = SetupSection::parse(section_raw)
            .ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
        let patch = req
            .params
            .get("patch")
            .and_then(|v| v.as_object())
            .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

        let mut current = load_section(conn, section).map_err(db_err("db_query_failed"))?;
        merge_section_patch(section, &mut current, patch).map_err(HandlerErr::bad_params)?;
        db::settings_set_json(conn, section.key(), &current).map_err(db_err("db_update_failed"))?;
        Ok(json!({ "ok": true, "section": current }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
