use serde::{Deserialize, Serialize};

/// How a category's slots collapse into one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMethod {
    Sum,
    Average,
    Best,
}

impl ScoreMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "average" | "avg" => Some(Self::Average),
            "best" | "max" => Some(Self::Best),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Best => "best",
        }
    }
}

/// Whether a recorded zero means "graded" or "still outstanding".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    ZeroCounts,
    ZeroIsIncomplete,
}

impl CompletionPolicy {
    pub fn is_complete(self, slot: Option<f64>) -> bool {
        match (self, slot) {
            (_, None) => false,
            (_, Some(v)) if !v.is_finite() => false,
            (Self::ZeroCounts, Some(_)) => true,
            (Self::ZeroIsIncomplete, Some(v)) => v > 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tests,
    Homework,
    Participation,
    PerformanceTasks,
    ClassInteraction,
    QuranRecitation,
    QuranMemorization,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Tests,
        Category::Homework,
        Category::Participation,
        Category::PerformanceTasks,
        Category::ClassInteraction,
        Category::QuranRecitation,
        Category::QuranMemorization,
    ];

    /// Canonical camelCase key used in stored grade JSON.
    pub fn key(self) -> &'static str {
        match self {
            Self::Tests => "tests",
            Self::Homework => "homework",
            Self::Participation => "participation",
            Self::PerformanceTasks => "performanceTasks",
            Self::ClassInteraction => "classInteraction",
            Self::QuranRecitation => "quranRecitation",
            Self::QuranMemorization => "quranMemorization",
        }
    }

    /// Older spellings, tried in order after `key()`.
    pub fn alternate_keys(self) -> &'static [&'static str] {
        match self {
            Self::Tests | Self::Homework | Self::Participation => &[],
            Self::PerformanceTasks => &["performance_tasks"],
            Self::ClassInteraction => &["class_interaction", "oralTest", "oral_test"],
            Self::QuranRecitation => &["quran_recitation"],
            Self::QuranMemorization => &["quran_memorization"],
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.key() == t || c.alternate_keys().iter().any(|k| *k == t))
    }

    pub fn slot_count(self) -> usize {
        match self {
            Self::Tests => 2,
            Self::Homework | Self::Participation => 10,
            Self::PerformanceTasks | Self::ClassInteraction => 4,
            Self::QuranRecitation | Self::QuranMemorization => 5,
        }
    }

    pub fn method(self) -> ScoreMethod {
        match self {
            Self::Tests | Self::Homework | Self::Participation => ScoreMethod::Sum,
            Self::PerformanceTasks | Self::ClassInteraction => ScoreMethod::Best,
            Self::QuranRecitation | Self::QuranMemorization => ScoreMethod::Average,
        }
    }

    /// Natural upper bound of the aggregated category score.
    pub fn max_score(self) -> f64 {
        match self {
            Self::Tests => 40.0,
            _ => 10.0,
        }
    }

    /// Largest value a single slot may hold.
    pub fn slot_max(self) -> f64 {
        match self {
            Self::Tests => 20.0,
            Self::Homework | Self::Participation => 1.0,
            _ => 10.0,
        }
    }

    pub fn completion_policy(self) -> CompletionPolicy {
        match self {
            Self::Homework | Self::PerformanceTasks => CompletionPolicy::ZeroIsIncomplete,
            _ => CompletionPolicy::ZeroCounts,
        }
    }

    pub fn empty_slots(self) -> Vec<Option<f64>> {
        vec![None; self.slot_count()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodKey {
    Period1,
    Period2,
}

impl PeriodKey {
    pub const ALL: [PeriodKey; 2] = [PeriodKey::Period1, PeriodKey::Period2];

    pub fn key(self) -> &'static str {
        match self {
            Self::Period1 => "period1",
            Self::Period2 => "period2",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "period1" | "1" => Some(Self::Period1),
            "period2" | "2" => Some(Self::Period2),
            _ => None,
        }
    }
}

/// One semester half of raw marks. Slot lengths are fixed per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradePeriod {
    pub tests: Vec<Option<f64>>,
    pub homework: Vec<Option<f64>>,
    pub participation: Vec<Option<f64>>,
    pub performance_tasks: Vec<Option<f64>>,
    pub class_interaction: Vec<Option<f64>>,
    pub quran_recitation: Vec<Option<f64>>,
    pub quran_memorization: Vec<Option<f64>>,
}

impl Default for GradePeriod {
    fn default() -> Self {
        Self {
            tests: Category::Tests.empty_slots(),
            homework: Category::Homework.empty_slots(),
            participation: Category::Participation.empty_slots(),
            performance_tasks: Category::PerformanceTasks.empty_slots(),
            class_interaction: Category::ClassInteraction.empty_slots(),
            quran_recitation: Category::QuranRecitation.empty_slots(),
            quran_memorization: Category::QuranMemorization.empty_slots(),
        }
    }
}

impl GradePeriod {
    pub fn slots(&self, category: Category) -> &[Option<f64>] {
        match category {
            Category::Tests => &self.tests,
            Category::Homework => &self.homework,
            Category::Participation => &self.participation,
            Category::PerformanceTasks => &self.performance_tasks,
            Category::ClassInteraction => &self.class_interaction,
            Category::QuranRecitation => &self.quran_recitation,
            Category::QuranMemorization => &self.quran_memorization,
        }
    }

    pub fn slots_mut(&mut self, category: Category) -> &mut Vec<Option<f64>> {
        match category {
            Category::Tests => &mut self.tests,
            Category::Homework => &mut self.homework,
            Category::Participation => &mut self.participation,
            Category::PerformanceTasks => &mut self.performance_tasks,
            Category::ClassInteraction => &mut self.class_interaction,
            Category::QuranRecitation => &mut self.quran_recitation,
            Category::QuranMemorization => &mut self.quran_memorization,
        }
    }

    pub fn completed_count(&self, category: Category) -> usize {
        let policy = category.completion_policy();
        self.slots(category)
            .iter()
            .filter(|s| policy.is_complete(**s))
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradeRecord {
    pub period1: GradePeriod,
    pub period2: GradePeriod,
    pub weekly_notes: Vec<String>,
}

impl StudentGradeRecord {
    pub fn period(&self, key: PeriodKey) -> &GradePeriod {
        match key {
            PeriodKey::Period1 => &self.period1,
            PeriodKey::Period2 => &self.period2,
        }
    }

    pub fn period_mut(&mut self, key: PeriodKey) -> &mut GradePeriod {
        match key {
            PeriodKey::Period1 => &mut self.period1,
            PeriodKey::Period2 => &mut self.period2,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurriculumType {
    Memorization,
    Recitation,
    Homework,
    PerformanceTask,
}

impl CurriculumType {
    pub const ALL: [CurriculumType; 4] = [
        CurriculumType::Memorization,
        CurriculumType::Recitation,
        CurriculumType::Homework,
        CurriculumType::PerformanceTask,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "memorization" => Some(Self::Memorization),
            "recitation" => Some(Self::Recitation),
            "homework" => Some(Self::Homework),
            "performanceTask" | "performance_task" => Some(Self::PerformanceTask),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memorization => "memorization",
            Self::Recitation => "recitation",
            Self::Homework => "homework",
            Self::PerformanceTask => "performanceTask",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Self::Memorization => Category::QuranMemorization,
            Self::Recitation => Category::QuranRecitation,
            Self::Homework => Category::Homework,
            Self::PerformanceTask => Category::PerformanceTasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumPart {
    #[serde(rename = "type")]
    pub kind: CurriculumType,
    pub due_date: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub period1: Vec<CurriculumPart>,
    pub period2: Vec<CurriculumPart>,
}

impl Curriculum {
    pub fn parts(&self, key: PeriodKey) -> &[CurriculumPart] {
        match key {
            PeriodKey::Period1 => &self.period1,
            PeriodKey::Period2 => &self.period2,
        }
    }
}
