use crate::models::{
    Answer, AskedRecord, AssessmentResult, CourseSummary, Domain, Question, QuestionOption,
    ResultNarrative, Session, Stream,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Outcome of the atomic insert-if-absent on (session_id, question_number).
/// Losing the race is not an error; the caller serves the winner's record.
#[derive(Debug, Clone)]
pub enum AskedInsert {
    Inserted,
    Lost(AskedRecord),
}

/// Read-only question catalog. Questions and options are seeded and
/// curated outside the engine.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_active_questions(&self, bank_version: &str) -> Result<Vec<Question>>;
    /// Question lookup regardless of bank or active flag, for validation.
    async fn find_question(&self, question_id: &str) -> Result<Option<Question>>;
    async fn find_options(&self, question_id: &str) -> Result<Vec<QuestionOption>>;
    async fn find_option(&self, option_id: &str) -> Result<Option<QuestionOption>>;
    async fn find_options_for_questions(
        &self,
        question_ids: &[String],
    ) -> Result<Vec<QuestionOption>>;
}

/// Session, answer, asked-record and result persistence. All session
/// lookups are tenant-scoped so a miss never reveals whether the id
/// exists under another client.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn find_in_progress_session(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<Option<Session>>;
    async fn find_session(&self, client_id: &str, session_id: &str) -> Result<Option<Session>>;
    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn update_session(&self, session: &Session) -> Result<()>;

    /// Answers ordered by creation time; append-only.
    async fn list_answers(&self, session_id: &str) -> Result<Vec<Answer>>;
    async fn insert_answer(&self, answer: &Answer) -> Result<()>;

    async fn find_asked(
        &self,
        session_id: &str,
        question_number: u32,
    ) -> Result<Option<AskedRecord>>;
    async fn insert_asked_if_absent(&self, record: &AskedRecord) -> Result<AskedInsert>;

    async fn insert_result(&self, result: &AssessmentResult) -> Result<()>;
    async fn find_result_by_session(
        &self,
        client_id: &str,
        session_id: &str,
    ) -> Result<Option<AssessmentResult>>;
    async fn update_result_narrative(
        &self,
        session_id: &str,
        narrative: &ResultNarrative,
        regenerated_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn list_recent_results(
        &self,
        client_id: &str,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AssessmentResult>>;
}

/// Optional external course catalog. The engine only orders and labels
/// what it receives; an empty list is always acceptable.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn ranked_courses(
        &self,
        stream: Stream,
        domain: Domain,
        indicator: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CourseSummary>>;
}

/// Default collaborator: no catalog wired in, no recommendations.
pub struct NoopCourseCatalog;

#[async_trait]
impl CourseCatalog for NoopCourseCatalog {
    async fn ranked_courses(
        &self,
        _stream: Stream,
        _domain: Domain,
        _indicator: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<CourseSummary>> {
        Ok(Vec::new())
    }
}
