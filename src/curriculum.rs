use serde::Serialize;
use serde_json::Value;

use crate::hijri::{normalize_hijri, parse_hijri, HijriDate};
use crate::model::{
    Curriculum, CurriculumPart, CurriculumType, PeriodKey, StudentGradeRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurriculumState {
    None,
    NotDue,
    NotStarted,
    Late,
    FullyCompleted,
}

impl CurriculumState {
    /// Wording shown for a given curriculum type.
    pub fn label(self, kind: Option<CurriculumType>) -> &'static str {
        match (self, kind) {
            (Self::None, _) => "none",
            (Self::NotDue, _) => "not_due",
            (Self::Late, _) => "late",
            (Self::NotStarted, Some(CurriculumType::Memorization)) => "not_memorized",
            (Self::NotStarted, Some(CurriculumType::Recitation)) => "not_recited",
            (Self::NotStarted, _) => "not_completed",
            (
                Self::FullyCompleted,
                Some(CurriculumType::Memorization | CurriculumType::Recitation),
            ) => "fully_recited",
            (Self::FullyCompleted, _) => "fully_completed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumStatus {
    pub state: CurriculumState,
    pub label: &'static str,
    pub detail: String,
    pub part: Option<CurriculumPart>,
    pub due_count: usize,
    pub completed_count: usize,
}

impl CurriculumStatus {
    fn none(kind: Option<CurriculumType>, detail: &str) -> Self {
        Self {
            state: CurriculumState::None,
            label: CurriculumState::None.label(kind),
            detail: detail.to_string(),
            part: None,
            due_count: 0,
            completed_count: 0,
        }
    }
}

fn describe(part: &CurriculumPart) -> String {
    let range = match (part.start.trim(), part.end.trim()) {
        ("", "") => String::new(),
        (s, "") | ("", s) => s.to_string(),
        (s, e) => format!("{} - {}", s, e),
    };
    if range.is_empty() {
        format!("due {}", part.due_date)
    } else {
        format!("{} (due {})", range, part.due_date)
    }
}

fn is_due(part: &CurriculumPart, today: &HijriDate) -> bool {
    // Unparseable due dates sort as earliest, so they are always due.
    parse_hijri(&part.due_date)
        .map(|d| d <= *today)
        .unwrap_or(true)
}

/// Parts of one type in due-date order. Ties keep their stored order.
pub fn sorted_parts(
    curriculum: &Curriculum,
    period: PeriodKey,
    kind: CurriculumType,
) -> Vec<&CurriculumPart> {
    let mut parts: Vec<&CurriculumPart> = curriculum
        .parts(period)
        .iter()
        .filter(|p| p.kind == kind)
        .collect();
    parts.sort_by_key(|p| parse_hijri(&p.due_date));
    parts
}

pub fn status(
    record: &StudentGradeRecord,
    period: PeriodKey,
    kind: CurriculumType,
    curriculum: &Curriculum,
    today: &HijriDate,
) -> CurriculumStatus {
    let parts = sorted_parts(curriculum, period, kind);
    if parts.is_empty() {
        return CurriculumStatus::none(Some(kind), "no curriculum defined");
    }

    let category = kind.category();
    let policy = category.completion_policy();
    let slots = record.period(period).slots(category);
    let completed_count = record.period(period).completed_count(category);
    let due: Vec<&CurriculumPart> = parts
        .iter()
        .copied()
        .filter(|p| is_due(p, today))
        .collect();

    let (state, part) = if due.is_empty() {
        (CurriculumState::NotDue, parts.first().copied())
    } else if completed_count == 0 {
        (CurriculumState::NotStarted, due.first().copied())
    } else if completed_count < due.len() {
        let first_open = due
            .iter()
            .enumerate()
            .find(|(idx, _)| !policy.is_complete(slots.get(*idx).copied().flatten()))
            .map(|(_, p)| *p)
            .or_else(|| due.get(completed_count).copied());
        (CurriculumState::Late, first_open)
    } else {
        (CurriculumState::FullyCompleted, None)
    };

    let detail = match (state, part) {
        (CurriculumState::NotDue, Some(p)) => format!("next: {}", describe(p)),
        (CurriculumState::NotStarted, Some(p)) => format!("not started: {}", describe(p)),
        (CurriculumState::Late, Some(p)) => format!("behind at: {}", describe(p)),
        _ => format!("{} of {} due parts completed", completed_count, due.len()),
    };

    CurriculumStatus {
        state,
        label: state.label(Some(kind)),
        detail,
        part: part.cloned(),
        due_count: due.len(),
        completed_count,
    }
}

/// [`status`] for a type name that arrived as a string.
pub fn status_for_type_name(
    record: &StudentGradeRecord,
    period: PeriodKey,
    kind: &str,
    curriculum: &Curriculum,
    today: &HijriDate,
) -> CurriculumStatus {
    match CurriculumType::parse(kind) {
        Some(kind) => status(record, period, kind, curriculum, today),
        None => CurriculumStatus::none(None, "unknown curriculum type"),
    }
}

fn first_str<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
}

fn parse_part(raw: &Value, default_kind: CurriculumType) -> Option<CurriculumPart> {
    let obj = raw.as_object()?;
    let kind = match obj.get("type") {
        None | Some(Value::Null) => default_kind,
        Some(v) => CurriculumType::parse(v.as_str()?)?,
    };
    Some(CurriculumPart {
        kind,
        due_date: normalize_hijri(first_str(obj, &["dueDate", "due_date"]).unwrap_or_default()),
        start: first_str(obj, &["start", "from"]).unwrap_or_default().to_string(),
        end: first_str(obj, &["end", "to"]).unwrap_or_default().to_string(),
    })
}

fn parse_parts(raw: Option<&Value>, default_kind: CurriculumType) -> Vec<CurriculumPart> {
    raw.and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|p| parse_part(p, default_kind)).collect())
        .unwrap_or_default()
}

fn parse_column(raw: &Value, default_kind: CurriculumType) -> (Vec<CurriculumPart>, Vec<CurriculumPart>) {
    if raw.is_array() {
        return (parse_parts(Some(raw), default_kind), Vec::new());
    }
    (
        parse_parts(raw.get(PeriodKey::Period1.key()), default_kind),
        parse_parts(raw.get(PeriodKey::Period2.key()), default_kind),
    )
}

/// Builds a curriculum from the stored `recitation` and `homework` columns.
pub fn parse_curriculum(recitation: &Value, homework: &Value) -> Curriculum {
    let (mut period1, mut period2) = parse_column(recitation, CurriculumType::Recitation);
    let (hw1, hw2) = parse_column(homework, CurriculumType::Homework);
    period1.extend(hw1);
    period2.extend(hw2);
    Curriculum { period1, period2 }
}

/// Splits a curriculum back into the two stored columns.
pub fn curriculum_columns(curriculum: &Curriculum) -> (Value, Value) {
    let is_recitation = |p: &&CurriculumPart| {
        matches!(
            p.kind,
            CurriculumType::Memorization | CurriculumType::Recitation
        )
    };
    let column = |want_recitation: bool| {
        let pick = |parts: &[CurriculumPart]| -> Vec<CurriculumPart> {
            parts
                .iter()
                .filter(|p| is_recitation(p) == want_recitation)
                .cloned()
                .collect()
        };
        serde_json::json!({
            "period1": pick(&curriculum.period1),
            "period2": pick(&curriculum.period2),
        })
    };
    (column(true), column(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::normalize;
    use serde_json::json;

    fn today(s: &str) -> HijriDate {
        parse_hijri(s).expect("valid hijri date")
    }

    fn part(kind: CurriculumType, due: &str, start: &str) -> CurriculumPart {
        CurriculumPart {
            kind,
            due_date: due.to_string(),
            start: start.to_string(),
            end: String::new(),
        }
    }

    fn one_period(parts: Vec<CurriculumPart>) -> Curriculum {
        Curriculum {
            period1: parts,
            period2: Vec::new(),
        }
    }

    #[test]
    fn memorization_due_and_untouched_is_not_started() {
        let c = one_period(vec![part(CurriculumType::Memorization, "1445/01/01", "Al-Mulk")]);
        let rec = StudentGradeRecord::default();
        let s = status(
            &rec,
            PeriodKey::Period1,
            CurriculumType::Memorization,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::NotStarted);
        assert_eq!(s.label, "not_memorized");
        assert!(s.detail.contains("Al-Mulk"), "{}", s.detail);
        assert_eq!(s.part.as_ref().map(|p| p.start.as_str()), Some("Al-Mulk"));
    }

    #[test]
    fn memorization_with_a_mark_is_fully_recited() {
        let c = one_period(vec![part(CurriculumType::Memorization, "1445/01/01", "Al-Mulk")]);
        let rec = normalize(&json!({ "period1": { "quranMemorization": [8] } }));
        let s = status(
            &rec,
            PeriodKey::Period1,
            CurriculumType::Memorization,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::FullyCompleted);
        assert_eq!(s.label, "fully_recited");
        assert_eq!(s.completed_count, 1);
    }

    #[test]
    fn homework_zero_does_not_count_as_done() {
        let c = one_period(vec![
            part(CurriculumType::Homework, "1445/01/01", "Sheet 1"),
            part(CurriculumType::Homework, "1445/01/05", "Sheet 2"),
        ]);
        let rec = normalize(&json!({ "period1": { "homework": [0] } }));
        let s = status(
            &rec,
            PeriodKey::Period1,
            CurriculumType::Homework,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.completed_count, 0);
        assert_eq!(s.state, CurriculumState::NotStarted);
        assert_eq!(s.label, "not_completed");
    }

    #[test]
    fn recitation_zero_counts_as_done() {
        let c = one_period(vec![part(CurriculumType::Recitation, "1445/01/01", "Juz 1")]);
        let rec = normalize(&json!({ "period1": { "quranRecitation": [0] } }));
        let s = status(
            &rec,
            PeriodKey::Period1,
            CurriculumType::Recitation,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::FullyCompleted);
    }

    #[test]
    fn late_names_first_incomplete_due_part() {
        let c = one_period(vec![
            part(CurriculumType::Homework, "1445/01/09", "Sheet 3"),
            part(CurriculumType::Homework, "1445/01/01", "Sheet 1"),
            part(CurriculumType::Homework, "1445/01/05", "Sheet 2"),
            part(CurriculumType::Homework, "1445/02/01", "Sheet 4"),
        ]);
        let rec = normalize(&json!({ "period1": { "homework": [1, 0, 1] } }));
        let s = status(
            &rec,
            PeriodKey::Period1,
            CurriculumType::Homework,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::Late);
        assert_eq!(s.due_count, 3);
        assert_eq!(s.completed_count, 2);
        assert_eq!(s.part.map(|p| p.start), Some("Sheet 2".to_string()));
    }

    #[test]
    fn nothing_due_names_next_part() {
        let c = one_period(vec![
            part(CurriculumType::PerformanceTask, "1445/03/01", "Project B"),
            part(CurriculumType::PerformanceTask, "1445/02/01", "Project A"),
        ]);
        let s = status(
            &StudentGradeRecord::default(),
            PeriodKey::Period1,
            CurriculumType::PerformanceTask,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::NotDue);
        assert!(s.detail.contains("Project A"), "{}", s.detail);
    }

    #[test]
    fn no_parts_of_type_is_none() {
        let c = one_period(vec![part(CurriculumType::Homework, "1445/01/01", "x")]);
        let s = status(
            &StudentGradeRecord::default(),
            PeriodKey::Period1,
            CurriculumType::Memorization,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::None);
        assert_eq!(s.detail, "no curriculum defined");

        let other_period = status(
            &StudentGradeRecord::default(),
            PeriodKey::Period2,
            CurriculumType::Homework,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(other_period.state, CurriculumState::None);
    }

    #[test]
    fn unknown_type_name_is_none() {
        let s = status_for_type_name(
            &StudentGradeRecord::default(),
            PeriodKey::Period1,
            "attendance",
            &Curriculum::default(),
            &today("1445/01/10"),
        );
        assert_eq!(s.state, CurriculumState::None);
        assert_eq!(s.detail, "unknown curriculum type");
    }

    #[test]
    fn due_today_counts_as_due() {
        let c = one_period(vec![part(CurriculumType::Homework, "1445/01/10", "x")]);
        let s = status(
            &StudentGradeRecord::default(),
            PeriodKey::Period1,
            CurriculumType::Homework,
            &c,
            &today("1445/01/10"),
        );
        assert_eq!(s.due_count, 1);
    }

    #[test]
    fn parse_curriculum_reads_both_columns_and_legacy_arrays() {
        let recitation = json!([
            { "type": "memorization", "dueDate": "1445/1/5", "from": "An-Naba", "to": "An-Naziat" },
            { "due_date": "1445/01/07", "start": "Juz 30" },
            { "type": "quiz", "dueDate": "1445/01/08" }
        ]);
        let homework = json!({
            "period1": [{ "dueDate": "1445/01/03", "start": "Sheet 1" }],
            "period2": [{ "type": "performanceTask", "dueDate": "1445/06/01" }]
        });
        let c = parse_curriculum(&recitation, &homework);
        assert_eq!(c.period1.len(), 3);
        assert_eq!(c.period1[0].kind, CurriculumType::Memorization);
        assert_eq!(c.period1[0].due_date, "1445/01/05");
        assert_eq!(c.period1[0].end, "An-Naziat");
        assert_eq!(c.period1[1].kind, CurriculumType::Recitation);
        assert_eq!(c.period1[2].kind, CurriculumType::Homework);
        assert_eq!(c.period2.len(), 1);
        assert_eq!(c.period2[0].kind, CurriculumType::PerformanceTask);
    }

    #[test]
    fn columns_split_back_by_type() {
        let c = one_period(vec![
            part(CurriculumType::Memorization, "1445/01/01", "a"),
            part(CurriculumType::Homework, "1445/01/02", "b"),
        ]);
        let (recitation, homework) = curriculum_columns(&c);
        assert_eq!(parse_curriculum(&recitation, &homework), c);
        assert_eq!(recitation["period1"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(homework["period2"], json!([]));
    }
}
