use super::{ConfidenceLevel, Domain, Stream};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-domain statistics as computed by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStat {
    pub score_0_to_100: f64,
    pub confidence_0_to_1: f64,
    pub answered_count: u32,
    pub variance: f64,
}

impl Default for DomainStat {
    fn default() -> Self {
        DomainStat {
            score_0_to_100: 0.0,
            confidence_0_to_1: 0.0,
            answered_count: 0,
            variance: 0.0,
        }
    }
}

/// Score movement caused by a single answer, derived by diffing the
/// scoring snapshots of consecutive answer-list prefixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerImpact {
    pub question_number: u32,
    pub question_id: String,
    /// Non-zero per-domain score deltas only.
    pub score_deltas: BTreeMap<Domain, f64>,
    pub top_domain_after: Option<Domain>,
    /// One-line reading of what the answer meant for the profile.
    pub summary: String,
}

/// Narrative/explanation payload. These are the only Result fields the
/// regenerate operation may overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultNarrative {
    pub rationale: String,
    pub domain_narratives: BTreeMap<Domain, String>,
    pub answer_impacts: Vec<AnswerImpact>,
    pub report: Option<serde_json::Value>,
}

/// Ranked course candidate supplied by the external catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub provider: Option<String>,
    pub url: Option<String>,
}

/// Produced exactly once per session by `complete()`. Numeric fields are
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub client_id: String,
    pub domain_scores: BTreeMap<Domain, DomainStat>,
    pub top_domains: Vec<Domain>,
    pub top_margin: f64,
    pub overall_confidence_score: f64,
    pub overall_confidence_level: ConfidenceLevel,
    pub stream_suggestion: Stream,
    pub career_fields: Vec<String>,
    pub weakest_indicator: Option<String>,
    pub recommended_courses: Vec<CourseSummary>,
    pub narrative: ResultNarrative,
    pub created_at: DateTime<Utc>,
    pub regenerated_at: Option<DateTime<Utc>>,
}

impl AssessmentResult {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}
