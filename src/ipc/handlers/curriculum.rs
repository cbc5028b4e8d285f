use crate::curriculum::parse_curriculum;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Curriculum;
use rusqlite::Connection;
use serde_json::{json, Value};

/// Class key as stored: (grade level, section, teacher id).
pub fn class_key(params: &Value) -> Result<(String, String, String), HandlerErr> {
    Ok((
        get_required_str(params, "gradeLevel")?.trim().to_string(),
        get_required_str(params, "section")?.trim().to_string(),
        get_optional_str(params, "teacherId").unwrap_or_default(),
    ))
}

/// A class without a saved curriculum behaves like an empty one.
pub fn load_curriculum(
    conn: &Connection,
    grade_level: &str,
    section: &str,
    teacher_id: &str,
) -> Result<Option<Curriculum>, HandlerErr> {
    db::curriculum_get(conn, grade_level, section, teacher_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn curriculum_get(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let (grade_level, section, teacher_id) = class_key(params)?;
    let stored = load_curriculum(conn, &grade_level, &section, &teacher_id)?;
    Ok(json!({
        "exists": stored.is_some(),
        "curriculum": stored.unwrap_or_default(),
    }))
}

fn curriculum_save(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let (grade_level, section, teacher_id) = class_key(params)?;
    let curriculum = parse_curriculum(
        params.get("recitation").unwrap_or(&Value::Null),
        params.get("homework").unwrap_or(&Value::Null),
    );
    db::curriculum_put(conn, &grade_level, &section, &teacher_id, &curriculum)
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({
        "partCount": curriculum.period1.len() + curriculum.period2.len(),
        "curriculum": curriculum,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "curriculum.get" => curriculum_get(state, &req.params),
        "curriculum.save" => curriculum_save(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
