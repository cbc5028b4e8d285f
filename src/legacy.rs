//! Read boundary for stored grade JSON.
//!
//! Grade blobs come from older portal releases in two shapes: the flat
//! pre-semester layout (categories at the root) and the current
//! `{period1, period2}` layout. Both are folded into one canonical
//! [`StudentGradeRecord`] here. Nothing in this module fails: anything
//! unrecognised becomes absent slots.

use serde_json::{Map, Value};

use crate::model::{Category, GradePeriod, PeriodKey, StudentGradeRecord};

const NOTES_KEYS: [&str; 2] = ["weeklyNotes", "weekly_notes"];

/// One stored slot. Finite numbers and numeric strings are marks, the rest is absent.
pub fn slot_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            t.parse::<f64>().ok().filter(|x| x.is_finite())
        }
        _ => None,
    }
}

pub fn is_legacy_shape(raw: &Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };
    if PeriodKey::ALL.iter().any(|p| obj.contains_key(p.key())) {
        return false;
    }
    obj.keys().any(|k| Category::from_key(k).is_some())
}

pub fn normalize(raw: &Value) -> StudentGradeRecord {
    let Some(obj) = raw.as_object() else {
        return StudentGradeRecord::default();
    };

    if is_legacy_shape(raw) {
        return StudentGradeRecord {
            period1: normalize_period(Some(obj)),
            period2: GradePeriod::default(),
            weekly_notes: read_notes(obj),
        };
    }

    StudentGradeRecord {
        period1: normalize_period(obj.get(PeriodKey::Period1.key()).and_then(|v| v.as_object())),
        period2: normalize_period(obj.get(PeriodKey::Period2.key()).and_then(|v| v.as_object())),
        weekly_notes: read_notes(obj),
    }
}

fn normalize_period(obj: Option<&Map<String, Value>>) -> GradePeriod {
    let mut period = GradePeriod::default();
    let Some(obj) = obj else {
        return period;
    };
    for category in Category::ALL {
        *period.slots_mut(category) = read_slots(obj, category);
    }
    period
}

fn read_slots(obj: &Map<String, Value>, category: Category) -> Vec<Option<f64>> {
    let found = std::iter::once(category.key())
        .chain(category.alternate_keys().iter().copied())
        .find_map(|k| obj.get(k).and_then(|v| v.as_array()));
    let Some(arr) = found else {
        return category.empty_slots();
    };

    let mut slots: Vec<Option<f64>> = arr
        .iter()
        .take(category.slot_count())
        .map(slot_value)
        .collect();
    slots.resize(category.slot_count(), None);
    slots
}

fn read_notes(obj: &Map<String, Value>) -> Vec<String> {
    NOTES_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(|v| v.as_array()))
        .map(|arr| {
            arr.iter()
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_root_becomes_period1() {
        let rec = normalize(&json!({
            "tests": [5, null],
            "homework": [1, 1, 0]
        }));
        assert_eq!(rec.period1.tests, vec![Some(5.0), None]);
        assert_eq!(rec.period2.tests, vec![None, None]);
        assert_eq!(rec.period1.homework.len(), 10);
        assert_eq!(&rec.period1.homework[..4], &[Some(1.0), Some(1.0), Some(0.0), None]);
        assert_eq!(rec.period2, GradePeriod::default());
    }

    #[test]
    fn legacy_notes_prefer_camel_case() {
        let rec = normalize(&json!({
            "tests": [],
            "weekly_notes": ["old"],
            "weeklyNotes": ["week 1", 7, "week 3"]
        }));
        assert_eq!(rec.weekly_notes, vec!["week 1", "", "week 3"]);

        let snake_only = normalize(&json!({ "oral_test": [3], "weekly_notes": ["w"] }));
        assert_eq!(snake_only.weekly_notes, vec!["w"]);
        assert_eq!(snake_only.period1.class_interaction[0], Some(3.0));
    }

    #[test]
    fn modern_shape_reads_alternate_keys_in_order() {
        let rec = normalize(&json!({
            "period1": {
                "oralTest": [4],
                "oral_test": [9],
                "quran_recitation": [7, 8]
            },
            "period2": {
                "classInteraction": [2, 2],
                "oralTest": [9]
            }
        }));
        assert_eq!(rec.period1.class_interaction, vec![Some(4.0), None, None, None]);
        assert_eq!(rec.period1.quran_recitation[..2], [Some(7.0), Some(8.0)]);
        assert_eq!(rec.period2.class_interaction, vec![Some(2.0), Some(2.0), None, None]);
    }

    #[test]
    fn canonical_key_that_is_not_an_array_falls_through() {
        let rec = normalize(&json!({
            "period1": { "classInteraction": null, "class_interaction": [6] }
        }));
        assert_eq!(rec.period1.class_interaction[0], Some(6.0));
    }

    #[test]
    fn long_arrays_are_truncated() {
        let rec = normalize(&json!({
            "period1": { "tests": [1, 2, 3, 4] }
        }));
        assert_eq!(rec.period1.tests, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn malformed_input_is_all_absent() {
        for raw in [json!(null), json!(42), json!("grades"), json!([1, 2]), json!({})] {
            assert_eq!(normalize(&raw), StudentGradeRecord::default());
        }
        let rec = normalize(&json!({ "period1": "broken", "period2": { "tests": "x" } }));
        assert_eq!(rec, StudentGradeRecord::default());
    }

    #[test]
    fn slot_values_accept_numeric_strings_only() {
        assert_eq!(slot_value(&json!(" 7.5 ")), Some(7.5));
        assert_eq!(slot_value(&json!("")), None);
        assert_eq!(slot_value(&json!("abc")), None);
        assert_eq!(slot_value(&json!(true)), None);
        assert_eq!(slot_value(&json!(0)), Some(0.0));
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            json!({ "tests": [5, null], "weekly_notes": ["a"] }),
            json!({ "period2": { "oral_test": [1, "2", null, 4, 5] } }),
            json!({ "period1": { "homework": [1, 0, "x"] }, "weeklyNotes": [null] }),
            json!("nonsense"),
        ];
        for raw in inputs {
            let once = normalize(&raw);
            let twice = normalize(&once.to_json());
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn input_is_left_untouched() {
        let raw = json!({ "tests": [5] });
        let before = raw.clone();
        let _ = normalize(&raw);
        assert_eq!(raw, before);
    }
}
