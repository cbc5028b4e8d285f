use crate::calc::{round_off_2_decimal, total_score};
use crate::curriculum::{status, CurriculumStatus};
use crate::hijri::HijriDate;
use crate::ipc::error::ok;
use crate::ipc::handlers::curriculum::{class_key, load_curriculum};
use crate::ipc::handlers::grades::load_record;
use crate::ipc::handlers::students::list_students;
use crate::ipc::helpers::{get_period, get_required_str, get_today, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Curriculum, CurriculumType, PeriodKey, StudentGradeRecord};
use rusqlite::OptionalExtension;
use serde_json::{json, Value};

fn statuses(
    record: &StudentGradeRecord,
    period: PeriodKey,
    curriculum: &Curriculum,
    today: &HijriDate,
) -> serde_json::Map<String, Value> {
    CurriculumType::ALL
        .iter()
        .map(|kind| {
            let s: CurriculumStatus = status(record, period, *kind, curriculum, today);
            (kind.as_str().to_string(), json!(s))
        })
        .collect()
}

fn student_summary(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let period = get_period(params)?;
    let today = get_today(state, params)?;

    let class: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT name, grade_level, section, teacher_id FROM students WHERE id = ?",
            [&student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let Some((name, grade_level, section, teacher_id)) = class else {
        return Err(HandlerErr::new("not_found", "student not found"));
    };

    let record = load_record(conn, &student_id)?;
    let curriculum =
        load_curriculum(conn, &grade_level, &section, &teacher_id)?.unwrap_or_default();

    Ok(json!({
        "studentId": student_id,
        "name": name,
        "period": period.key(),
        "today": today.to_string(),
        "totals": total_score(record.period(period)),
        "statuses": statuses(&record, period, &curriculum, &today),
        "weeklyNotes": record.weekly_notes,
    }))
}

fn class_overview(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let (grade_level, section, teacher_id) = class_key(params)?;
    let period = get_period(params)?;
    let today = get_today(state, params)?;

    let students = list_students(
        conn,
        Some(grade_level.as_str()),
        Some(section.as_str()),
        Some(teacher_id.as_str()),
    )?;
    let curriculum =
        load_curriculum(conn, &grade_level, &section, &teacher_id)?.unwrap_or_default();

    let mut rows: Vec<Value> = Vec::with_capacity(students.len());
    let mut grand_sum = 0.0_f64;
    for s in &students {
        let record = load_record(conn, &s.id)?;
        let totals = total_score(record.period(period));
        grand_sum += totals.grand_total;
        let labels: serde_json::Map<String, Value> = CurriculumType::ALL
            .iter()
            .map(|kind| {
                let st = status(&record, period, *kind, &curriculum, &today);
                (kind.as_str().to_string(), json!(st.label))
            })
            .collect();
        rows.push(json!({
            "studentId": s.id,
            "name": s.name,
            "sortOrder": s.sort_order,
            "totals": totals,
            "statuses": labels,
        }));
    }

    let class_average = if students.is_empty() {
        0.0
    } else {
        round_off_2_decimal(grand_sum / (students.len() as f64))
    };

    Ok(json!({
        "gradeLevel": grade_level,
        "section": section,
        "teacherId": teacher_id,
        "period": period.key(),
        "today": today.to_string(),
        "studentCount": students.len(),
        "classAverage": class_average,
        "rows": rows,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.studentSummary" => student_summary(state, &req.params),
        "reports.classOverview" => class_overview(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
