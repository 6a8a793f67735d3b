use super::error::HandlerErr;
use super::types::Request;
use crate::assignments;
use crate::grades::{Term, TestSlot};
use serde_json::json;

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    optional_str(req, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent, null and blank strings all read as `None`. Values are trimmed.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(HandlerErr::bad_params(format!("{} must be a string", key)));
            };
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
    }
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, HandlerErr> {
    optional_f64(req, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(HandlerErr::bad_params(format!("{} must be a number", key))
                .with_details(json!({ key: v }))),
        },
    }
}

/// `term` may be `"Term 2"`, `"2"` or `2`.
pub fn required_term(req: &Request) -> Result<Term, HandlerErr> {
    let raw = req
        .params
        .get("term")
        .ok_or_else(|| HandlerErr::bad_params("missing term"))?;
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_i64().and_then(Term::from_number),
        serde_json::Value::String(s) => s.parse::<Term>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        HandlerErr::bad_params("term must be 1, 2, 3 or 'Term N'")
            .with_details(json!({ "term": raw }))
    })
}

pub fn required_test(req: &Request, key: &str) -> Result<TestSlot, HandlerErr> {
    let raw = required_str(req, key)?;
    raw.parse::<TestSlot>().map_err(|e| {
        HandlerErr::bad_params(e.to_string()).with_details(json!({ key: raw }))
    })
}

pub fn optional_test(req: &Request, key: &str) -> Result<Option<TestSlot>, HandlerErr> {
    match optional_str(req, key)? {
        None => Ok(None),
        Some(_) => required_test(req, key).map(Some),
    }
}

/// A JSON array of strings, normalized like catalog subjects.
pub fn required_subjects(req: &Request, key: &str) -> Result<Vec<String>, HandlerErr> {
    let raw = req
        .params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an array of strings", key)))?;
    let mut items = Vec::with_capacity(raw.len());
    for v in raw {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::bad_params(format!("{} must be an array of strings", key))
                .with_details(json!({ key: raw })));
        };
        items.push(s);
    }
    let subjects = assignments::normalize_subjects(&items);
    if subjects.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must name at least one subject", key)));
    }
    Ok(subjects)
}
