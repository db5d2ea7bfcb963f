//! MongoDB persistence adapter. The asked-record ledger relies on a
//! unique index on (session_id, question_number): concurrent writers for
//! the same ordinal race on the insert and the loser reads back the
//! stored winner instead of erroring.

use super::{AskedInsert, AssessmentStore, CatalogStore};
use crate::models::{
    Answer, AskedRecord, AssessmentResult, Question, QuestionOption, ResultNarrative, Session,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};

const QUESTIONS: &str = "questions";
const OPTIONS: &str = "question_options";
const SESSIONS: &str = "sessions";
const ANSWERS: &str = "answers";
const ASKED_RECORDS: &str = "asked_records";
const RESULTS: &str = "results";

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }

    fn questions(&self) -> Collection<Question> {
        self.db.collection(QUESTIONS)
    }

    fn options(&self) -> Collection<QuestionOption> {
        self.db.collection(OPTIONS)
    }

    fn sessions(&self) -> Collection<Session> {
        self.db.collection(SESSIONS)
    }

    fn answers(&self) -> Collection<Answer> {
        self.db.collection(ANSWERS)
    }

    fn asked_records(&self) -> Collection<AskedRecord> {
        self.db.collection(ASKED_RECORDS)
    }

    fn results(&self) -> Collection<AssessmentResult> {
        self.db.collection(RESULTS)
    }

    /// Create the indexes the adapter depends on. Safe to call repeatedly.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.asked_records()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "session_id": 1, "question_number": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await
            .context("failed to create asked_records index")?;

        self.results()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "session_id": 1 })
                    .options(unique)
                    .build(),
            )
            .await
            .context("failed to create results index")?;

        self.sessions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "client_id": 1, "user_id": 1, "status": 1 })
                    .build(),
            )
            .await
            .context("failed to create sessions index")?;

        self.answers()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "session_id": 1, "created_at": 1 })
                    .build(),
            )
            .await
            .context("failed to create answers index")?;

        Ok(())
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *error.kind
    {
        return we.code == 11000;
    }
    false
}

#[async_trait]
impl CatalogStore for MongoStore {
    async fn find_active_questions(&self, bank_version: &str) -> Result<Vec<Question>> {
        let questions: Vec<Question> = self
            .questions()
            .find(doc! { "bank_version": bank_version, "is_active": true })
            .sort(doc! { "id": 1 })
            .await
            .context("failed to query questions")?
            .try_collect()
            .await
            .context("failed to read question cursor")?;
        Ok(questions)
    }

    async fn find_question(&self, question_id: &str) -> Result<Option<Question>> {
        self.questions()
            .find_one(doc! { "id": question_id })
            .await
            .context("failed to query question")
    }

    async fn find_options(&self, question_id: &str) -> Result<Vec<QuestionOption>> {
        let options: Vec<QuestionOption> = self
            .options()
            .find(doc! { "question_id": question_id })
            .sort(doc! { "id": 1 })
            .await
            .context("failed to query options")?
            .try_collect()
            .await
            .context("failed to read option cursor")?;
        Ok(options)
    }

    async fn find_option(&self, option_id: &str) -> Result<Option<QuestionOption>> {
        self.options()
            .find_one(doc! { "id": option_id })
            .await
            .context("failed to query option")
    }

    async fn find_options_for_questions(
        &self,
        question_ids: &[String],
    ) -> Result<Vec<QuestionOption>> {
        let options: Vec<QuestionOption> = self
            .options()
            .find(doc! { "question_id": { "$in": question_ids } })
            .sort(doc! { "id": 1 })
            .await
            .context("failed to query options by question ids")?
            .try_collect()
            .await
            .context("failed to read option cursor")?;
        Ok(options)
    }
}

#[async_trait]
impl AssessmentStore for MongoStore {
    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("mongodb ping failed")?;
        Ok(())
    }

    async fn find_in_progress_session(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<Option<Session>> {
        self.sessions()
            .find_one(doc! {
                "client_id": client_id,
                "user_id": user_id,
                "status": "IN_PROGRESS",
            })
            .await
            .context("failed to query in-progress session")
    }

    async fn find_session(&self, client_id: &str, session_id: &str) -> Result<Option<Session>> {
        self.sessions()
            .find_one(doc! { "id": session_id, "client_id": client_id })
            .await
            .context("failed to query session")
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.sessions()
            .insert_one(session)
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        self.sessions()
            .replace_one(doc! { "id": &session.id }, session)
            .await
            .context("failed to update session")?;
        Ok(())
    }

    async fn list_answers(&self, session_id: &str) -> Result<Vec<Answer>> {
        let answers: Vec<Answer> = self
            .answers()
            .find(doc! { "session_id": session_id })
            .sort(doc! { "created_at": 1 })
            .await
            .context("failed to query answers")?
            .try_collect()
            .await
            .context("failed to read answer cursor")?;
        Ok(answers)
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<()> {
        self.answers()
            .insert_one(answer)
            .await
            .context("failed to insert answer")?;
        Ok(())
    }

    async fn find_asked(
        &self,
        session_id: &str,
        question_number: u32,
    ) -> Result<Option<AskedRecord>> {
        self.asked_records()
            .find_one(doc! {
                "session_id": session_id,
                "question_number": question_number as i64,
            })
            .await
            .context("failed to query asked record")
    }

    async fn insert_asked_if_absent(&self, record: &AskedRecord) -> Result<AskedInsert> {
        match self.asked_records().insert_one(record).await {
            Ok(_) => Ok(AskedInsert::Inserted),
            Err(e) if is_duplicate_key(&e) => {
                let winner = self
                    .find_asked(&record.session_id, record.question_number)
                    .await?
                    .context("asked record vanished after duplicate-key race")?;
                Ok(AskedInsert::Lost(winner))
            }
            Err(e) => Err(e).context("failed to insert asked record"),
        }
    }

    async fn insert_result(&self, result: &AssessmentResult) -> Result<()> {
        self.results()
            .insert_one(result)
            .await
            .context("failed to insert result")?;
        Ok(())
    }

    async fn find_result_by_session(
        &self,
        client_id: &str,
        session_id: &str,
    ) -> Result<Option<AssessmentResult>> {
        self.results()
            .find_one(doc! { "session_id": session_id, "client_id": client_id })
            .await
            .context("failed to query result")
    }

    async fn update_result_narrative(
        &self,
        session_id: &str,
        narrative: &ResultNarrative,
        regenerated_at: DateTime<Utc>,
    ) -> Result<()> {
        let narrative_bson =
            to_bson(narrative).context("failed to serialize result narrative")?;
        let regenerated_bson =
            to_bson(&regenerated_at).context("failed to serialize timestamp")?;
        self.results()
            .update_one(
                doc! { "session_id": session_id },
                doc! { "$set": {
                    "narrative": narrative_bson,
                    "regenerated_at": regenerated_bson,
                } },
            )
            .await
            .context("failed to update result narrative")?;
        Ok(())
    }

    async fn list_recent_results(
        &self,
        client_id: &str,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AssessmentResult>> {
        let results: Vec<AssessmentResult> = self
            .results()
            .find(doc! { "client_id": client_id, "user_id": user_id })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await
            .context("failed to query recent results")?
            .try_collect()
            .await
            .context("failed to read result cursor")?;
        Ok(results)
    }
}
