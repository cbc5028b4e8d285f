//! Stateless engine calls. These take grade and curriculum JSON straight from
//! the request and never touch the workspace.

use crate::calc::aggregate_json;
use crate::curriculum::{parse_curriculum, status_for_type_name};
use crate::hijri::compare_hijri;
use crate::ipc::error::ok;
use crate::ipc::handlers::grades::record_view;
use crate::ipc::helpers::{get_period, get_required_str, get_today, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::legacy;
use crate::model::ScoreMethod;
use serde_json::{json, Value};
use std::cmp::Ordering;

fn raw_grades(params: &Value) -> &Value {
    params.get("grades").unwrap_or(&Value::Null)
}

fn engine_normalize(params: &Value) -> Result<Value, HandlerErr> {
    let raw = raw_grades(params);
    Ok(json!({
        "legacyShape": legacy::is_legacy_shape(raw),
        "grades": legacy::normalize(raw),
    }))
}

fn engine_aggregate(params: &Value) -> Result<Value, HandlerErr> {
    let method_raw = get_required_str(params, "method")?;
    let Some(method) = ScoreMethod::parse(&method_raw) else {
        return Err(HandlerErr::bad_params("method must be sum, average or best"));
    };
    let values = params.get("values").unwrap_or(&Value::Null);
    Ok(json!({
        "method": method.as_str(),
        "score": aggregate_json(values, method),
    }))
}

fn engine_totals(params: &Value) -> Result<Value, HandlerErr> {
    Ok(record_view(&legacy::normalize(raw_grades(params))))
}

fn engine_status(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let kind = get_required_str(params, "type")?;
    let period = get_period(params)?;
    let today = get_today(state, params)?;
    let record = legacy::normalize(raw_grades(params));
    let raw_curriculum = params.get("curriculum").unwrap_or(&Value::Null);
    let curriculum = parse_curriculum(
        raw_curriculum.get("recitation").unwrap_or(&Value::Null),
        raw_curriculum.get("homework").unwrap_or(&Value::Null),
    );
    let status = status_for_type_name(&record, period, &kind, &curriculum, &today);
    Ok(json!({
        "today": today.to_string(),
        "period": period.key(),
        "status": status,
    }))
}

fn calendar_today(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let today = get_today(state, params)?;
    Ok(json!({ "today": today.to_string() }))
}

fn calendar_compare(params: &Value) -> Result<Value, HandlerErr> {
    let a = get_required_str(params, "a")?;
    let b = get_required_str(params, "b")?;
    let result = match compare_hijri(&a, &b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    Ok(json!({ "result": result }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "engine.normalize" => engine_normalize(&req.params),
        "engine.aggregate" => engine_aggregate(&req.params),
        "engine.totals" => engine_totals(&req.params),
        "engine.status" => engine_status(state, &req.params),
        "calendar.today" => calendar_today(state, &req.params),
        "calendar.compare" => calendar_compare(&req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
