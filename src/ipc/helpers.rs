use crate::ipc::error::HandlerErr;
use crate::ipc::types::Request;
use rusqlite::Connection;
use serde::de::DeserializeOwned;

pub fn require_db<'a>(db: Option<&'a Connection>) -> Result<&'a Connection, HandlerErr> {
    db.ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, HandlerErr> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid params: {e}")))
}

pub fn require_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {key}"))),
    }
}

/// Trims and rejects blank values for required text fields.
pub fn non_blank(field: &str, value: &str) -> Result<String, HandlerErr> {
    let t = value.trim();
    if t.is_empty() {
        return Err(HandlerErr::bad_params(format!("{field} must not be empty")));
    }
    Ok(t.to_string())
}

pub fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}
