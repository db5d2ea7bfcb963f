use super::{
    ConfidenceLevel, Domain, PersonalizationSource, QuestionType, RenderedOption, SessionStatus,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

lazy_static! {
    // BCP 47 primary subtag with an optional region, e.g. "en" or "en-IN".
    static ref LOCALE_RE: Regex = Regex::new(r"^[a-z]{2,3}(-[A-Z]{2})?$").unwrap();
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartAssessmentRequest {
    #[validate(range(min = 1, max = 12, message = "grade must be between 1 and 12"))]
    pub grade: Option<u32>,
    #[validate(regex(path = *LOCALE_RE, message = "locale must look like \"en\" or \"en-IN\""))]
    pub locale: Option<String>,
    #[validate(length(max = 120))]
    pub display_name: Option<String>,
    #[validate(range(min = 18, max = 60, message = "max_questions must be between 18 and 60"))]
    pub max_questions: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StartAssessmentResponse {
    pub session_id: String,
    pub resumed: bool,
    pub status: SessionStatus,
    pub bank_version: String,
    pub answered_count: u32,
    pub max_questions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServedQuestion {
    pub id: String,
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: Vec<RenderedOption>,
    pub source: PersonalizationSource,
}

#[derive(Debug, Serialize)]
pub struct NextQuestionResponse {
    pub session_id: String,
    pub answered_count: u32,
    pub question_number: u32,
    pub stop: bool,
    pub early_stop_recommended: bool,
    pub eligible_remaining: usize,
    pub question: Option<ServedQuestion>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    pub selected_option_id: Option<String>,
    #[validate(length(max = 4000))]
    pub free_text: Option<String>,
    pub numeric_value: Option<f64>,
    pub time_spent_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub session_id: String,
    pub answered_count: u32,
    pub max_questions: u32,
    pub top_domains: Vec<Domain>,
    pub overall_confidence_score: f64,
    pub overall_confidence_level: ConfidenceLevel,
}

#[derive(Debug, Deserialize)]
pub struct RecentResultsQuery {
    pub limit: Option<i64>,
}
