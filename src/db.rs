use log::{error, info};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Instant;

use crate::curriculum::{curriculum_columns, parse_curriculum};
use crate::legacy;
use crate::model::{Curriculum, StudentGradeRecord};

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    let started_at = Instant::now();
    match open_and_bootstrap(workspace) {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(e) => {
            error!(
                "event=db_open module=db status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                e
            );
            Err(e)
        }
    }
}

fn open_and_bootstrap(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE_NAME))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade_level TEXT NOT NULL,
            section TEXT NOT NULL,
            teacher_id TEXT NOT NULL DEFAULT '',
            sort_order INTEGER NOT NULL,
            grades TEXT NOT NULL DEFAULT '{}'
        )",
        [],
    )?;
    // Workspaces created before grade edits were tracked lack updated_at.
    ensure_students_updated_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(grade_level, section, teacher_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum(
            id TEXT PRIMARY KEY,
            grade_level TEXT NOT NULL,
            section TEXT NOT NULL,
            teacher_id TEXT NOT NULL DEFAULT '',
            recitation TEXT NOT NULL DEFAULT '{}',
            homework TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT,
            UNIQUE(grade_level, section, teacher_id)
        )",
        [],
    )?;

    migrate_legacy_grades(&conn)?;

    Ok(conn)
}

fn ensure_students_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

/// Rewrites flat pre-semester grade blobs into the two-period layout.
fn migrate_legacy_grades(conn: &Connection) -> anyhow::Result<()> {
    let mut stmt = conn.prepare("SELECT id, grades FROM students")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut migrated = 0_usize;
    for (id, text) in rows {
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        if !legacy::is_legacy_shape(&raw) {
            continue;
        }
        let record = legacy::normalize(&raw);
        conn.execute(
            "UPDATE students SET grades = ? WHERE id = ?",
            (serde_json::to_string(&record)?, &id),
        )?;
        migrated += 1;
    }
    if migrated > 0 {
        info!(
            "event=grades_migrate module=db status=ok migrated={}",
            migrated
        );
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Stored grades for one student, always in canonical form.
pub fn student_grades_get(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Option<StudentGradeRecord>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT grades FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(text.map(|t| {
        let raw: serde_json::Value = serde_json::from_str(&t).unwrap_or_default();
        legacy::normalize(&raw)
    }))
}

pub fn student_grades_put(
    conn: &Connection,
    student_id: &str,
    record: &StudentGradeRecord,
) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE students SET grades = ?, updated_at = ? WHERE id = ?",
        (
            serde_json::to_string(record)?,
            chrono::Utc::now().to_rfc3339(),
            student_id,
        ),
    )?;
    Ok(changed > 0)
}

pub fn curriculum_get(
    conn: &Connection,
    grade_level: &str,
    section: &str,
    teacher_id: &str,
) -> anyhow::Result<Option<Curriculum>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT recitation, homework FROM curriculum
             WHERE grade_level = ? AND section = ? AND teacher_id = ?",
            (grade_level, section, teacher_id),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    Ok(row.map(|(recitation, homework)| {
        parse_curriculum(
            &serde_json::from_str(&recitation).unwrap_or_default(),
            &serde_json::from_str(&homework).unwrap_or_default(),
        )
    }))
}

pub fn curriculum_put(
    conn: &Connection,
    grade_level: &str,
    section: &str,
    teacher_id: &str,
    curriculum: &Curriculum,
) -> anyhow::Result<()> {
    let (recitation, homework) = curriculum_columns(curriculum);
    conn.execute(
        "INSERT INTO curriculum(id, grade_level, section, teacher_id, recitation, homework, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(grade_level, section, teacher_id) DO UPDATE SET
           recitation = excluded.recitation,
           homework = excluded.homework,
           updated_at = excluded.updated_at",
        (
            uuid::Uuid::new_v4().to_string(),
            grade_level,
            section,
            teacher_id,
            recitation.to_string(),
            homework.to_string(),
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}
