use rusqlite::Connection;

use crate::hijri::{hijri_today, parse_hijri, HijriDate};
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::model::PeriodKey;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn db(code: &'static str, e: impl std::fmt::Display) -> Self {
        Self::new(code, e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

/// `period1` when omitted.
pub fn get_period(params: &serde_json::Value) -> Result<PeriodKey, HandlerErr> {
    match params.get("period") {
        None => Ok(PeriodKey::Period1),
        Some(v) if v.is_null() => Ok(PeriodKey::Period1),
        Some(v) => {
            let raw = match (v.as_str(), v.as_i64()) {
                (Some(s), _) => s.to_string(),
                (None, Some(n)) => n.to_string(),
                _ => String::new(),
            };
            PeriodKey::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params("period must be period1 or period2"))
        }
    }
}

/// Request `today`, then the pinned date, then the system calendar.
pub fn get_today(state: &AppState, params: &serde_json::Value) -> Result<HijriDate, HandlerErr> {
    match params.get("today").and_then(|v| v.as_str()) {
        Some(raw) => parse_hijri(raw)
            .ok_or_else(|| HandlerErr::bad_params("today must be YYYY/MM/DD")),
        None => Ok(state.today.unwrap_or_else(hijri_today)),
    }
}
