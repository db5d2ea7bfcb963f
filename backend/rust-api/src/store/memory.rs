//! In-memory store used by the integration tests and local development.
//! Mirrors the persistence contract of the MongoDB adapter, including the
//! insert-if-absent semantics of the asked-record ledger.

use super::{AskedInsert, AssessmentStore, CatalogStore};
use crate::models::{
    Answer, AskedRecord, AssessmentResult, Question, QuestionOption, ResultNarrative, Session,
    SessionStatus,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    questions: HashMap<String, Question>,
    options: HashMap<String, QuestionOption>,
    sessions: HashMap<String, Session>,
    answers: Vec<Answer>,
    asked: HashMap<(String, u32), AskedRecord>,
    results: HashMap<String, AssessmentResult>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn seed_catalog(&self, questions: Vec<Question>, options: Vec<QuestionOption>) {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        for question in questions {
            inner.questions.insert(question.id.clone(), question);
        }
        for option in options {
            inner.options.insert(option.id.clone(), option);
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_active_questions(&self, bank_version: &str) -> Result<Vec<Question>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut questions: Vec<Question> = inner
            .questions
            .values()
            .filter(|q| q.is_active && q.bank_version == bank_version)
            .cloned()
            .collect();
        questions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(questions)
    }

    async fn find_question(&self, question_id: &str) -> Result<Option<Question>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.questions.get(question_id).cloned())
    }

    async fn find_options(&self, question_id: &str) -> Result<Vec<QuestionOption>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut options: Vec<QuestionOption> = inner
            .options
            .values()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect();
        options.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(options)
    }

    async fn find_option(&self, option_id: &str) -> Result<Option<QuestionOption>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.options.get(option_id).cloned())
    }

    async fn find_options_for_questions(
        &self,
        question_ids: &[String],
    ) -> Result<Vec<QuestionOption>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut options: Vec<QuestionOption> = inner
            .options
            .values()
            .filter(|o| question_ids.iter().any(|id| *id == o.question_id))
            .cloned()
            .collect();
        options.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(options)
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_in_progress_session(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<Option<Session>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .sessions
            .values()
            .find(|s| {
                s.client_id == client_id
                    && s.user_id == user_id
                    && s.status == SessionStatus::InProgress
            })
            .cloned())
    }

    async fn find_session(&self, client_id: &str, session_id: &str) -> Result<Option<Session>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .sessions
            .get(session_id)
            .filter(|s| s.client_id == client_id)
            .cloned())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_answers(&self, session_id: &str) -> Result<Vec<Answer>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut answers: Vec<Answer> = inner
            .answers
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(answers)
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.answers.push(answer.clone());
        Ok(())
    }

    async fn find_asked(
        &self,
        session_id: &str,
        question_number: u32,
    ) -> Result<Option<AskedRecord>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .asked
            .get(&(session_id.to_string(), question_number))
            .cloned())
    }

    async fn insert_asked_if_absent(&self, record: &AskedRecord) -> Result<AskedInsert> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let key = (record.session_id.clone(), record.question_number);
        match inner.asked.get(&key) {
            Some(existing) => Ok(AskedInsert::Lost(existing.clone())),
            None => {
                inner.asked.insert(key, record.clone());
                Ok(AskedInsert::Inserted)
            }
        }
    }

    async fn insert_result(&self, result: &AssessmentResult) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner
            .results
            .insert(result.session_id.clone(), result.clone());
        Ok(())
    }

    async fn find_result_by_session(
        &self,
        client_id: &str,
        session_id: &str,
    ) -> Result<Option<AssessmentResult>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .results
            .get(session_id)
            .filter(|r| r.client_id == client_id)
            .cloned())
    }

    async fn update_result_narrative(
        &self,
        session_id: &str,
        narrative: &ResultNarrative,
        regenerated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if let Some(result) = inner.results.get_mut(session_id) {
            result.narrative = narrative.clone();
            result.regenerated_at = Some(regenerated_at);
        }
        Ok(())
    }

    async fn list_recent_results(
        &self,
        client_id: &str,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AssessmentResult>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut results: Vec<AssessmentResult> = inner
            .results
            .values()
            .filter(|r| r.client_id == client_id && r.user_id == user_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }
}
