use serde::Serialize;

use crate::legacy::slot_value;
use crate::model::{Category, GradePeriod, ScoreMethod};

/// Half-up rounding at the 2nd decimal: `Int(100*x + 0.5) / 100`
pub fn round_off_2_decimal(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Scores are always numbers; an overflowed result counts as nothing present.
fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Collapses a slot array into one score. Absent slots never contribute and
/// an array with nothing present yields 0 for every method.
pub fn aggregate(values: &[Option<f64>], method: ScoreMethod) -> f64 {
    let present: Vec<f64> = values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect();
    if present.is_empty() {
        return 0.0;
    }

    let raw: f64 = match method {
        ScoreMethod::Sum => present.iter().sum(),
        ScoreMethod::Average => present.iter().sum::<f64>() / (present.len() as f64),
        ScoreMethod::Best => present.iter().copied().fold(f64::MIN, f64::max),
    };
    finite_or_zero(round_off_2_decimal(raw))
}

/// Same as [`aggregate`] over untrusted JSON. Non-arrays have no present values.
pub fn aggregate_json(values: &serde_json::Value, method: ScoreMethod) -> f64 {
    let Some(arr) = values.as_array() else {
        return 0.0;
    };
    let slots: Vec<Option<f64>> = arr.iter().map(slot_value).collect();
    aggregate(&slots, method)
}

pub fn category_score(period: &GradePeriod, category: Category) -> f64 {
    aggregate(period.slots(category), category.method())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalScore {
    /// tests + recitation + memorization, out of 60.
    pub major_assessments: f64,
    /// homework + participation + performance tasks + class interaction, out of 40.
    pub coursework: f64,
    pub grand_total: f64,
}

pub const MAJOR_ASSESSMENTS: [Category; 3] = [
    Category::Tests,
    Category::QuranRecitation,
    Category::QuranMemorization,
];

pub const COURSEWORK: [Category; 4] = [
    Category::Homework,
    Category::Participation,
    Category::PerformanceTasks,
    Category::ClassInteraction,
];

pub fn total_score(period: &GradePeriod) -> TotalScore {
    let major_assessments = finite_or_zero(round_off_2_decimal(
        MAJOR_ASSESSMENTS
            .iter()
            .map(|c| category_score(period, *c))
            .sum(),
    ));
    let coursework = finite_or_zero(round_off_2_decimal(
        COURSEWORK
            .iter()
            .map(|c| category_score(period, *c))
            .sum(),
    ));
    TotalScore {
        major_assessments,
        coursework,
        grand_total: finite_or_zero(round_off_2_decimal(major_assessments + coursework)),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: &'static str,
    pub method: &'static str,
    pub score: f64,
    pub max_score: f64,
    pub completed_count: usize,
    pub slot_count: usize,
}

pub fn category_breakdown(period: &GradePeriod) -> Vec<CategoryBreakdown> {
    Category::ALL
        .iter()
        .map(|c| CategoryBreakdown {
            category: c.key(),
            method: c.method().as_str(),
            score: category_score(period, *c),
            max_score: c.max_score(),
            completed_count: period.completed_count(*c),
            slot_count: c.slot_count(),
        })
        .collect()
}
