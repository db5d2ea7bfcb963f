use super::ConfidenceLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SIGNATURE_HISTORY_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Abandoned => "ABANDONED",
        }
    }
}

/// Session-scoped personalization state. Strongly typed rather than a
/// free-form JSON bag so it can be validated on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Ordinal of the last question that referenced an earlier answer.
    #[serde(default)]
    pub last_reference_question_number: Option<u32>,
    /// Rolling history of the last 10 top-domain signatures ("IR", "RIA", ...).
    #[serde(default)]
    pub recent_top_domain_signatures: Vec<String>,
    #[serde(default)]
    pub last_confidence_level: Option<ConfidenceLevel>,
    #[serde(default)]
    pub last_confidence_score: Option<f64>,
}

impl SessionMeta {
    pub fn push_signature(&mut self, signature: String) {
        self.recent_top_domain_signatures.push(signature);
        let len = self.recent_top_domain_signatures.len();
        if len > SIGNATURE_HISTORY_CAP {
            self.recent_top_domain_signatures
                .drain(..len - SIGNATURE_HISTORY_CAP);
        }
    }

    /// The "reference your earlier answer" enhancement fires at most once
    /// every 3 questions and never before question 3.
    pub fn reference_allowed(&self, question_number: u32) -> bool {
        if question_number < 3 {
            return false;
        }
        match self.last_reference_question_number {
            Some(last) => question_number.saturating_sub(last) >= 3,
            None => true,
        }
    }
}

/// One assessment attempt. At most one IN_PROGRESS session per
/// (client, user); terminal sessions are never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub status: SessionStatus,
    pub bank_version: String,
    pub grade: Option<u32>,
    pub locale: Option<String>,
    pub display_name: Option<String>,
    pub max_questions: u32,
    pub current_question_index: u32,
    #[serde(default)]
    pub meta: SessionMeta,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub const DEFAULT_MAX_QUESTIONS: u32 = 30;

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_id: &str,
        user_id: &str,
        bank_version: &str,
        grade: Option<u32>,
        locale: Option<String>,
        display_name: Option<String>,
        max_questions: Option<u32>,
    ) -> Self {
        Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            status: SessionStatus::InProgress,
            bank_version: bank_version.to_string(),
            grade,
            locale,
            display_name,
            max_questions: max_questions.unwrap_or(DEFAULT_MAX_QUESTIONS),
            current_question_index: 0,
            meta: SessionMeta::default(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// First whitespace-separated token of the display name, if any.
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_history_is_capped_at_ten() {
        let mut meta = SessionMeta::default();
        for i in 0..14 {
            meta.push_signature(format!("S{}", i));
        }
        assert_eq!(meta.recent_top_domain_signatures.len(), 10);
        assert_eq!(meta.recent_top_domain_signatures[0], "S4");
        assert_eq!(meta.recent_top_domain_signatures[9], "S13");
    }

    #[test]
    fn reference_throttle_never_fires_before_question_three() {
        let meta = SessionMeta::default();
        assert!(!meta.reference_allowed(1));
        assert!(!meta.reference_allowed(2));
        assert!(meta.reference_allowed(3));
    }

    #[test]
    fn reference_throttle_spaces_by_three_questions() {
        let mut meta = SessionMeta::default();
        meta.last_reference_question_number = Some(5);
        assert!(!meta.reference_allowed(6));
        assert!(!meta.reference_allowed(7));
        assert!(meta.reference_allowed(8));
    }

    #[test]
    fn first_name_is_leading_token() {
        let mut session = Session::new("acme", "u1", "v1", Some(9), None, None, None);
        assert_eq!(session.first_name(), None);
        session.display_name = Some("Priya Sharma".into());
        assert_eq!(session.first_name(), Some("Priya"));
    }

    #[test]
    fn default_max_questions_is_thirty() {
        let session = Session::new("acme", "u1", "v1", None, None, None, None);
        assert_eq!(session.max_questions, 30);
        assert_eq!(session.status, SessionStatus::InProgress);
    }
}
