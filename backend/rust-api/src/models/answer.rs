use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only answer record. The ordered list of these is the sole input
/// to scoring; answers are never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    pub selected_option_id: Option<String>,
    pub free_text: Option<String>,
    /// Explicit numeric value for Likert answers submitted without an
    /// option id (scoring fallback).
    pub numeric_value: Option<f64>,
    pub time_spent_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(
        session_id: &str,
        question_id: &str,
        selected_option_id: Option<String>,
        free_text: Option<String>,
        numeric_value: Option<f64>,
        time_spent_ms: u64,
    ) -> Self {
        Answer {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            question_id: question_id.to_string(),
            selected_option_id,
            free_text,
            numeric_value,
            time_spent_ms,
            created_at: Utc::now(),
        }
    }
}

/// What the user actually saw for a question, after personalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonalizationSource {
    Raw,
    Template,
    Ai,
}

impl PersonalizationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonalizationSource::Raw => "RAW",
            PersonalizationSource::Template => "TEMPLATE",
            PersonalizationSource::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedOption {
    pub id: String,
    pub label: String,
}

/// Idempotency ledger entry: written at most once per
/// (session_id, question_number) and replayed verbatim on retries, so a
/// client refresh can never change or skip a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskedRecord {
    pub session_id: String,
    pub question_number: u32,
    pub question_id: String,
    pub prompt: String,
    pub options: Vec<RenderedOption>,
    pub source: PersonalizationSource,
    pub created_at: DateTime<Utc>,
}
