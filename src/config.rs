use std::env;
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "SCHOOLBOOK_WORKSPACE";
pub const ENV_LOG_JSON: &str = "SCHOOLBOOK_LOG_JSON";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    pub log_json: bool,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = lookup(ENV_WORKSPACE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_json = lookup(ENV_LOG_JSON)
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false);
        Self {
            workspace,
            log_json,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
