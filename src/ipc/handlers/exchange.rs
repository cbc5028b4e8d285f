use crate::exchange::{self, ApplyMode, ClassKey, PACKET_FORMAT_V1};
use crate::ipc::error::ok;
use crate::ipc::handlers::curriculum::class_key;
use crate::ipc::helpers::{get_optional_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::path::Path;

fn required_path(params: &Value, key: &str) -> Result<String, HandlerErr> {
    get_optional_str(params, key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn with_path(code: &'static str, e: impl std::fmt::Display, path: &str) -> HandlerErr {
    HandlerErr {
        details: Some(json!({ "path": path })),
        ..HandlerErr::new(code, e.to_string())
    }
}

fn exchange_export_class(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let (grade_level, section, teacher_id) = class_key(params)?;
    let out_path = required_path(params, "outPath")?;
    let class = ClassKey {
        grade_level,
        section,
        teacher_id,
    };

    let export = exchange::write_class_packet(conn, &class, Path::new(&out_path))
        .map_err(|e| with_path("io_failed", e, &out_path))?;
    Ok(json!({
        "path": out_path,
        "format": PACKET_FORMAT_V1,
        "studentCount": export.student_count,
        "hasCurriculum": export.has_curriculum,
        "recordsSha256": export.records_sha256,
    }))
}

/// Target class defaults to the one recorded in the packet.
fn exchange_import_class(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let in_path = required_path(params, "inPath")?;
    let mode = match get_optional_str(params, "mode") {
        None => ApplyMode::Upsert,
        Some(raw) => ApplyMode::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("mode must be upsert or replace"))?,
    };
    if !Path::new(&in_path).is_file() {
        return Err(with_path("not_found", "packet file not found", &in_path));
    }

    let records = exchange::read_class_packet(Path::new(&in_path))
        .map_err(|e| with_path("invalid_packet", e, &in_path))?;
    let target = if params.get("gradeLevel").is_some() {
        let (grade_level, section, teacher_id) = class_key(params)?;
        ClassKey {
            grade_level,
            section,
            teacher_id,
        }
    } else {
        records.class.clone()
    };

    let applied = exchange::apply_class_records(conn, &records, &target, mode)
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({
        "path": in_path,
        "mode": mode.as_str(),
        "class": target,
        "inserted": applied.inserted,
        "updated": applied.updated,
        "removed": applied.removed,
        "skipped": applied.skipped,
        "curriculumApplied": applied.curriculum_applied,
        "warnings": applied.warnings,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "exchange.exportClass" => exchange_export_class(state, &req.params),
        "exchange.importClass" => exchange_import_class(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
