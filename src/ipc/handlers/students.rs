use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::legacy;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub grade_level: String,
    pub section: String,
    pub teacher_id: String,
    pub sort_order: i64,
}

impl StudentRow {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "gradeLevel": self.grade_level,
            "section": self.section,
            "teacherId": self.teacher_id,
            "sortOrder": self.sort_order,
        })
    }
}

/// Students in display order. `None` filters match everything.
pub fn list_students(
    conn: &Connection,
    grade_level: Option<&str>,
    section: Option<&str>,
    teacher_id: Option<&str>,
) -> Result<Vec<StudentRow>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, grade_level, section, teacher_id, sort_order
             FROM students
             WHERE (?1 IS NULL OR grade_level = ?1)
               AND (?2 IS NULL OR section = ?2)
               AND (?3 IS NULL OR teacher_id = ?3)
             ORDER BY grade_level, section, sort_order, name",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    stmt.query_map((grade_level, section, teacher_id), |r| {
        Ok(StudentRow {
            id: r.get(0)?,
            name: r.get(1)?,
            grade_level: r.get(2)?,
            section: r.get(3)?,
            teacher_id: r.get(4)?,
            sort_order: r.get(5)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let grade_level = get_optional_str(params, "gradeLevel");
    let section = get_optional_str(params, "section");
    let teacher_id = get_optional_str(params, "teacherId");
    let rows = list_students(
        conn,
        grade_level.as_deref(),
        section.as_deref(),
        teacher_id.as_deref(),
    )?;
    Ok(json!({
        "students": rows.iter().map(StudentRow::to_json).collect::<Vec<_>>()
    }))
}

fn students_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let grade_level = get_required_str(params, "gradeLevel")?.trim().to_string();
    let section = get_required_str(params, "section")?.trim().to_string();
    let teacher_id = get_optional_str(params, "teacherId").unwrap_or_default();
    // Imported records may still be in the flat layout.
    let grades = legacy::normalize(params.get("grades").unwrap_or(&serde_json::Value::Null));

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students
             WHERE grade_level = ? AND section = ? AND teacher_id = ?",
            (&grade_level, &section, &teacher_id),
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let id = Uuid::new_v4().to_string();
    let grades_text = grades.to_json().to_string();
    conn.execute(
        "INSERT INTO students(id, name, grade_level, section, teacher_id, sort_order, grades, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &name,
            &grade_level,
            &section,
            &teacher_id,
            next_sort,
            grades_text,
            chrono::Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", e))?;

    Ok(json!({ "studentId": id, "sortOrder": next_sort }))
}

fn students_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let removed = conn
        .execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if removed == 0 {
        return Err(HandlerErr::new("not_found", "student not found"));
    }
    Ok(json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
