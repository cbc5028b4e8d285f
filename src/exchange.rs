use anyhow::{anyhow, Context};
use log::info;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::curriculum::{curriculum_columns, parse_curriculum};
use crate::db;
use crate::legacy;

const MANIFEST_ENTRY: &str = "manifest.json";
const RECORDS_ENTRY: &str = "records.json";
pub const PACKET_FORMAT_V1: &str = "gradebook-class-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassKey {
    pub grade_level: String,
    pub section: String,
    #[serde(default)]
    pub teacher_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketStudent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
    /// Canonical on export, normalized again on import.
    #[serde(default)]
    pub grades: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumColumns {
    #[serde(default)]
    pub recitation: Value,
    #[serde(default)]
    pub homework: Value,
}

/// One class worth of gradebook data: roster, grades and curriculum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecords {
    pub class: ClassKey,
    #[serde(default)]
    pub curriculum: Option<CurriculumColumns>,
    #[serde(default)]
    pub students: Vec<PacketStudent>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub student_count: usize,
    pub has_curriculum: bool,
    pub records_sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Insert new students, update ones already in the target class.
    Upsert,
    /// Drop the target class roster first.
    Replace,
}

impl ApplyMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "upsert" => Some(Self::Upsert),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplySummary {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
    pub curriculum_applied: bool,
    pub warnings: Vec<Value>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn load_class_records(conn: &Connection, class: &ClassKey) -> anyhow::Result<ClassRecords> {
    let mut stmt = conn.prepare(
        "SELECT id, name, sort_order FROM students
         WHERE grade_level = ? AND section = ? AND teacher_id = ?
         ORDER BY sort_order, name",
    )?;
    let rows = stmt
        .query_map(
            (&class.grade_level, &class.section, &class.teacher_id),
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut students = Vec::with_capacity(rows.len());
    for (id, name, sort_order) in rows {
        let grades = db::student_grades_get(conn, &id)?.unwrap_or_default();
        students.push(PacketStudent {
            id,
            name,
            sort_order,
            grades: grades.to_json(),
        });
    }

    let curriculum = db::curriculum_get(conn, &class.grade_level, &class.section, &class.teacher_id)?
        .map(|c| {
            let (recitation, homework) = curriculum_columns(&c);
            CurriculumColumns {
                recitation,
                homework,
            }
        });

    Ok(ClassRecords {
        class: class.clone(),
        curriculum,
        students,
    })
}

pub fn write_class_packet(
    conn: &Connection,
    class: &ClassKey,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let records = load_class_records(conn, class)?;
    let records_text =
        serde_json::to_string_pretty(&records).context("failed to serialize class records")?;
    let records_sha256 = sha256_hex(records_text.as_bytes());

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create packet {}", out_path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": PACKET_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "gradeLevel": class.grade_level,
        "section": class.section,
        "teacherId": class.teacher_id,
        "studentCount": records.students.len(),
        "recordsSha256": records_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(RECORDS_ENTRY, opts)
        .context("failed to start records entry")?;
    zip.write_all(records_text.as_bytes())
        .context("failed to write records entry")?;
    zip.finish().context("failed to finalize packet")?;

    info!(
        "event=class_export module=exchange status=ok students={} curriculum={}",
        records.students.len(),
        records.curriculum.is_some()
    );
    Ok(ExportSummary {
        student_count: records.students.len(),
        has_curriculum: records.curriculum.is_some(),
        records_sha256,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    Ok(read == 4 && sig == [0x50, 0x4B, 0x03, 0x04])
}

/// Reads and verifies a packet. Nothing is written to any workspace here.
pub fn read_class_packet(in_path: &Path) -> anyhow::Result<ClassRecords> {
    if !is_zip_file(in_path)? {
        return Err(anyhow!(
            "not a class packet: {}",
            in_path.to_string_lossy()
        ));
    }
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open packet {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("packet missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != PACKET_FORMAT_V1 {
        return Err(anyhow!("unsupported packet format: {}", format));
    }
    let expected = manifest
        .get("recordsSha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest missing recordsSha256"))?;

    let mut records_bytes: Vec<u8> = Vec::new();
    archive
        .by_name(RECORDS_ENTRY)
        .context("packet missing records.json")?
        .read_to_end(&mut records_bytes)
        .context("failed to extract records entry")?;
    let actual = sha256_hex(&records_bytes);
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(anyhow!(
            "records checksum mismatch: manifest {} actual {}",
            expected,
            actual
        ));
    }

    serde_json::from_slice(&records_bytes).context("records.json is invalid")
}

/// Writes packet records into `target` in one transaction. Incoming grades go
/// through the legacy normalizer, so older flat blobs land in canonical shape.
pub fn apply_class_records(
    conn: &Connection,
    records: &ClassRecords,
    target: &ClassKey,
    mode: ApplyMode,
) -> anyhow::Result<ApplySummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = ApplySummary::default();

    if mode == ApplyMode::Replace {
        summary.removed = tx.execute(
            "DELETE FROM students WHERE grade_level = ? AND section = ? AND teacher_id = ?",
            (&target.grade_level, &target.section, &target.teacher_id),
        )?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    for (index, student) in records.students.iter().enumerate() {
        let id = student.id.trim();
        let name = student.name.trim();
        if id.is_empty() || name.is_empty() {
            summary.skipped += 1;
            summary.warnings.push(json!({
                "index": index,
                "code": "missing_identity",
                "message": "student id and name are required"
            }));
            continue;
        }

        let existing: Option<ClassKey> = tx
            .query_row(
                "SELECT grade_level, section, teacher_id FROM students WHERE id = ?",
                [id],
                |r| {
                    Ok(ClassKey {
                        grade_level: r.get(0)?,
                        section: r.get(1)?,
                        teacher_id: r.get(2)?,
                    })
                },
            )
            .optional()?;
        let grades = legacy::normalize(&student.grades).to_json().to_string();

        match existing {
            Some(key) if &key != target => {
                summary.skipped += 1;
                summary.warnings.push(json!({
                    "index": index,
                    "studentId": id,
                    "code": "student_in_other_class",
                    "message": "student already belongs to another class"
                }));
            }
            Some(_) => {
                tx.execute(
                    "UPDATE students SET name = ?, sort_order = ?, grades = ?, updated_at = ?
                     WHERE id = ?",
                    (name, student.sort_order, &grades, &now, id),
                )?;
                summary.updated += 1;
            }
            None => {
                tx.execute(
                    "INSERT INTO students(id, name, grade_level, section, teacher_id, sort_order, grades, updated_at)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        id,
                        name,
                        &target.grade_level,
                        &target.section,
                        &target.teacher_id,
                        student.sort_order,
                        &grades,
                        &now,
                    ),
                )?;
                summary.inserted += 1;
            }
        }
    }

    if let Some(columns) = &records.curriculum {
        let curriculum = parse_curriculum(&columns.recitation, &columns.homework);
        db::curriculum_put(
            &tx,
            &target.grade_level,
            &target.section,
            &target.teacher_id,
            &curriculum,
        )?;
        summary.curriculum_applied = true;
    }

    tx.commit()?;
    info!(
        "event=class_import module=exchange status=ok mode={} inserted={} updated={} removed={} skipped={}",
        mode.as_str(),
        summary.inserted,
        summary.updated,
        summary.removed,
        summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;

    fn class_5a() -> ClassKey {
        ClassKey {
            grade_level: "5".to_string(),
            section: "A".to_string(),
            teacher_id: "t1".to_string(),
        }
    }

    fn insert_student(conn: &Connection, id: &str, class: &ClassKey, sort: i64, grades: Value) {
        conn.execute(
            "INSERT INTO students(id, name, grade_level, section, teacher_id, sort_order, grades)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                id,
                format!("Student {}", id),
                &class.grade_level,
                &class.section,
                &class.teacher_id,
                sort,
                grades.to_string(),
            ),
        )
        .expect("insert student");
    }

    fn student_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .expect("count")
    }

    #[test]
    fn packet_moves_class_between_workspaces() {
        let src = tempfile::tempdir().expect("src");
        let dst = tempfile::tempdir().expect("dst");
        let class = class_5a();
        let conn = open_db(src.path()).expect("open src");
        insert_student(&conn, "s1", &class, 0, json!({ "tests": [14, null] }));
        insert_student(&conn, "s2", &class, 1, json!({ "period2": { "homework": [1] } }));
        let curriculum = parse_curriculum(
            &json!([{ "type": "memorization", "dueDate": "1445/01/01", "start": "An-Naba" }]),
            &json!([]),
        );
        db::curriculum_put(&conn, "5", "A", "t1", &curriculum).expect("curriculum");

        let packet = src.path().join("out/class.zip");
        let exported = write_class_packet(&conn, &class, &packet).expect("export");
        assert_eq!(exported.student_count, 2);
        assert!(exported.has_curriculum);
        assert_eq!(exported.records_sha256.len(), 64);

        let records = read_class_packet(&packet).expect("read");
        let target = open_db(dst.path()).expect("open dst");
        let applied =
            apply_class_records(&target, &records, &class, ApplyMode::Upsert).expect("apply");
        assert_eq!(applied.inserted, 2);
        assert!(applied.curriculum_applied);

        let s1 = db::student_grades_get(&target, "s1").expect("get").expect("s1");
        assert_eq!(s1.period1.tests, vec![Some(14.0), None]);
        let s2 = db::student_grades_get(&target, "s2").expect("get").expect("s2");
        assert_eq!(s2.period2.homework[0], Some(1.0));
        assert_eq!(
            db::curriculum_get(&target, "5", "A", "t1").expect("get"),
            Some(curriculum)
        );
    }

    #[test]
    fn upsert_updates_and_keeps_other_classes_intact() {
        let dir = tempfile::tempdir().expect("dir");
        let conn = open_db(dir.path()).expect("open");
        let class = class_5a();
        let other = ClassKey {
            section: "B".to_string(),
            ..class_5a()
        };
        insert_student(&conn, "s1", &class, 0, json!({}));
        insert_student(&conn, "s9", &other, 0, json!({ "tests": [3] }));

        let records = ClassRecords {
            class: class.clone(),
            curriculum: None,
            students: vec![
                PacketStudent {
                    id: "s1".to_string(),
                    name: "Renamed".to_string(),
                    sort_order: 4,
                    grades: json!({ "tests": [20, 19] }),
                },
                PacketStudent {
                    id: "s9".to_string(),
                    name: "Intruder".to_string(),
                    sort_order: 0,
                    grades: json!({}),
                },
                PacketStudent {
                    id: " ".to_string(),
                    name: "No id".to_string(),
                    sort_order: 0,
                    grades: json!({}),
                },
            ],
        };
        let applied =
            apply_class_records(&conn, &records, &class, ApplyMode::Upsert).expect("apply");
        assert_eq!(applied.updated, 1);
        assert_eq!(applied.skipped, 2);
        assert_eq!(applied.warnings[0]["code"], json!("student_in_other_class"));
        assert_eq!(applied.warnings[1]["code"], json!("missing_identity"));
        assert!(!applied.curriculum_applied);

        let s1 = db::student_grades_get(&conn, "s1").expect("get").expect("s1");
        assert_eq!(s1.period1.tests, vec![Some(20.0), Some(19.0)]);
        let s9 = db::student_grades_get(&conn, "s9").expect("get").expect("s9");
        assert_eq!(s9.period1.tests, vec![Some(3.0), None]);
    }

    #[test]
    fn replace_drops_students_missing_from_packet() {
        let dir = tempfile::tempdir().expect("dir");
        let conn = open_db(dir.path()).expect("open");
        let class = class_5a();
        insert_student(&conn, "s1", &class, 0, json!({}));
        insert_student(&conn, "s2", &class, 1, json!({}));

        let records = ClassRecords {
            class: class.clone(),
            curriculum: None,
            students: vec![PacketStudent {
                id: "s3".to_string(),
                name: "New".to_string(),
                sort_order: 0,
                grades: Value::Null,
            }],
        };
        let applied =
            apply_class_records(&conn, &records, &class, ApplyMode::Replace).expect("apply");
        assert_eq!(applied.removed, 2);
        assert_eq!(applied.inserted, 1);
        assert_eq!(student_count(&conn), 1);
    }

    #[test]
    fn tampered_records_are_rejected() {
        let dir = tempfile::tempdir().expect("dir");
        let packet = dir.path().join("tampered.zip");
        {
            let mut zip = ZipWriter::new(File::create(&packet).expect("create"));
            let opts = FileOptions::default();
            zip.start_file(MANIFEST_ENTRY, opts).expect("manifest");
            zip.write_all(
                json!({ "format": PACKET_FORMAT_V1, "recordsSha256": "00" })
                    .to_string()
                    .as_bytes(),
            )
            .expect("write manifest");
            zip.start_file(RECORDS_ENTRY, opts).expect("records");
            zip.write_all(b"{\"class\":{\"gradeLevel\":\"5\",\"section\":\"A\"}}")
                .expect("write records");
            zip.finish().expect("finish");
        }
        let err = read_class_packet(&packet).expect_err("checksum must fail");
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn non_zip_input_is_rejected() {
        let dir = tempfile::tempdir().expect("dir");
        let raw = dir.path().join("old.sqlite3");
        std::fs::write(&raw, b"SQLite format 3\0").expect("write");
        let err = read_class_packet(&raw).expect_err("must reject");
        assert!(err.to_string().contains("not a class packet"));
    }
}
