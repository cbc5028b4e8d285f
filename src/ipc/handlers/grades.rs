use crate::calc::{category_breakdown, total_score};
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_period, get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Category, PeriodKey, StudentGradeRecord};
use log::info;
use rusqlite::Connection;
use serde_json::json;

const MAX_WEEKLY_NOTES: usize = 60;

pub fn load_record(conn: &Connection, student_id: &str) -> Result<StudentGradeRecord, HandlerErr> {
    db::student_grades_get(conn, student_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))
}

fn store_record(
    conn: &Connection,
    student_id: &str,
    record: &StudentGradeRecord,
) -> Result<(), HandlerErr> {
    let changed = db::student_grades_put(conn, student_id, record)
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    if !changed {
        return Err(HandlerErr::new("not_found", "student not found"));
    }
    Ok(())
}

/// Record plus derived numbers for both periods.
pub fn record_view(record: &StudentGradeRecord) -> serde_json::Value {
    let mut totals = serde_json::Map::new();
    let mut breakdown = serde_json::Map::new();
    for p in PeriodKey::ALL {
        totals.insert(p.key().to_string(), json!(total_score(record.period(p))));
        breakdown.insert(
            p.key().to_string(),
            json!(category_breakdown(record.period(p))),
        );
    }
    json!({
        "grades": record,
        "totals": totals,
        "categories": breakdown,
    })
}

fn grades_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let record = load_record(conn, &student_id)?;
    let mut view = record_view(&record);
    view["studentId"] = json!(student_id);
    Ok(view)
}

fn parse_slot_value(v: Option<&serde_json::Value>, category: Category) -> Result<Option<f64>, HandlerErr> {
    // Only an explicit null clears a slot.
    let Some(v) = v else {
        return Err(HandlerErr::bad_params("missing value"));
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(n) = v.as_f64().filter(|n| n.is_finite()) else {
        return Err(HandlerErr::bad_params("value must be a number or null"));
    };
    if n < 0.0 || n > category.slot_max() {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("value must be between 0 and {}", category.slot_max()),
            details: Some(json!({ "category": category.key(), "max": category.slot_max() })),
        });
    }
    Ok(Some(n))
}

fn grades_set_slot(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let period = get_period(params)?;
    let category_key = get_required_str(params, "category")?;
    let Some(category) = Category::from_key(&category_key) else {
        return Err(HandlerErr::bad_params(format!(
            "unknown category: {}",
            category_key
        )));
    };
    let index = params
        .get("index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| HandlerErr::bad_params("missing index"))?;
    if index >= category.slot_count() {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!(
                "index out of range for {} (0..{})",
                category.key(),
                category.slot_count()
            ),
            details: Some(json!({ "slotCount": category.slot_count() })),
        });
    }
    let value = parse_slot_value(params.get("value"), category)?;

    let mut record = load_record(conn, &student_id)?;
    record.period_mut(period).slots_mut(category)[index] = value;
    store_record(conn, &student_id, &record)?;
    info!(
        "event=grade_set module=grades status=ok period={} category={} index={} present={}",
        period.key(),
        category.key(),
        index,
        value.is_some()
    );

    Ok(json!({
        "studentId": student_id,
        "period": period.key(),
        "category": category.key(),
        "index": index,
        "value": value,
        "totals": total_score(record.period(period)),
    }))
}

fn notes_update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let week = params
        .get("week")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| HandlerErr::bad_params("missing week"))?;
    if week >= MAX_WEEKLY_NOTES {
        return Err(HandlerErr::bad_params(format!(
            "week must be below {}",
            MAX_WEEKLY_NOTES
        )));
    }
    let text = params
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut record = load_record(conn, &student_id)?;
    if record.weekly_notes.len() <= week {
        record.weekly_notes.resize(week + 1, String::new());
    }
    record.weekly_notes[week] = text;
    store_record(conn, &student_id, &record)?;

    Ok(json!({ "weeklyNotes": record.weekly_notes }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.get" => grades_get(state, &req.params),
        "grades.setSlot" => grades_set_slot(state, &req.params),
        "notes.update" => notes_update(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
