use super::Domain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Likert,
    ScenarioMcq,
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Likert => "LIKERT",
            QuestionType::ScenarioMcq => "SCENARIO_MCQ",
            QuestionType::OpenEnded => "OPEN_ENDED",
        }
    }
}

/// Immutable catalog entry. Seeded and curated outside the engine; the
/// engine only reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub bank_version: String,
    pub question_type: QuestionType,
    pub prompt: String,
    #[serde(default)]
    pub domain_tags: Vec<Domain>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub reverse_scored: bool,
    /// Exact grade ("9") or inclusive range ("8-10"). Unset matches all.
    #[serde(default)]
    pub grade_band: Option<String>,
    /// Optional skill-indicator tag, used for the weakest-skill readout.
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn default_active() -> bool {
    true
}

impl Question {
    pub fn tags(&self, domain: Domain) -> bool {
        self.domain_tags.contains(&domain)
    }

    /// Lenient grade-band match. Unparsable bands never block a question.
    pub fn matches_grade(&self, grade: Option<u32>) -> bool {
        let band = match self.grade_band.as_deref().map(str::trim) {
            Some(b) if !b.is_empty() => b,
            _ => return true,
        };
        let grade = match grade {
            Some(g) => g,
            None => return true,
        };
        if let Ok(exact) = band.parse::<u32>() {
            return exact == grade;
        }
        if let Some((lo, hi)) = band.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<u32>(), hi.trim().parse::<u32>()) {
                return lo <= grade && grade <= hi;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub question_id: String,
    pub label: String,
    pub value: i32,
    /// Carries the interest signal for SCENARIO_MCQ items; empty otherwise.
    #[serde(default)]
    pub domain_tags: Vec<Domain>,
}

/// Lookup view over one bank's questions and options, built once per
/// request and shared by the scoring engine and the selector.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    questions: HashMap<String, Question>,
    options: HashMap<String, QuestionOption>,
    options_by_question: HashMap<String, Vec<QuestionOption>>,
}

impl CatalogIndex {
    pub fn build(questions: Vec<Question>, options: Vec<QuestionOption>) -> Self {
        let mut index = CatalogIndex::default();
        for question in questions {
            index.questions.insert(question.id.clone(), question);
        }
        for option in options {
            index
                .options_by_question
                .entry(option.question_id.clone())
                .or_default()
                .push(option.clone());
            index.options.insert(option.id.clone(), option);
        }
        // Stable option order regardless of store iteration order.
        for opts in index.options_by_question.values_mut() {
            opts.sort_by(|a, b| a.id.cmp(&b.id));
        }
        index
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.get(id)
    }

    pub fn option(&self, id: &str) -> Option<&QuestionOption> {
        self.options.get(id)
    }

    pub fn options_for(&self, question_id: &str) -> &[QuestionOption] {
        self.options_by_question
            .get(question_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
