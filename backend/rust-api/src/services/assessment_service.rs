//! Session orchestrator. Owns the lifecycle of an assessment attempt and
//! is the only writer of sessions, answers, asked-records and results.
//!
//! Serving a question is idempotent per ordinal: the first write of the
//! asked-record for (session, question_number) wins and every retry
//! replays it verbatim, so the adaptive selector can stay stateless.

use crate::error::ApiError;
use crate::metrics::{
    ANSWERS_SUBMITTED_TOTAL, ASSESSMENTS_COMPLETED_TOTAL, QUESTIONS_SERVED_TOTAL, SESSIONS_ACTIVE,
    SESSIONS_TOTAL,
};
use crate::models::{
    Answer, AskedRecord, AssessmentResult, CatalogIndex, Domain, NextQuestionResponse, Question,
    ServedQuestion, Session, SessionStatus, StartAssessmentRequest, StartAssessmentResponse,
    SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::services::explanation::build_narrative;
use crate::services::mapping::{derive_mapping, weakest_indicator};
use crate::services::personalization::{
    apply_rewrite, render_baseline, PersonalizeRequest, RenderedQuestion, TextGenClient,
};
use crate::services::scoring::{compute_snapshot, ScoringSnapshot};
use crate::services::selector::{select_next, Decision};
use crate::services::AppState;
use crate::store::{AskedInsert, AssessmentStore, CatalogStore, CourseCatalog};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;

const RECOMMENDED_COURSES_LIMIT: usize = 5;
const RECENT_RESULTS_DEFAULT: i64 = 10;
const RECENT_RESULTS_CAP: i64 = 50;

pub struct AssessmentService {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn AssessmentStore>,
    courses: Arc<dyn CourseCatalog>,
    textgen: TextGenClient,
    bank_version: String,
}

impl AssessmentService {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            catalog: state.catalog.clone(),
            store: state.store.clone(),
            courses: state.courses.clone(),
            textgen: state.textgen.clone(),
            bank_version: state.config.bank_version.clone(),
        }
    }

    /// Resume the caller's IN_PROGRESS session if one exists, otherwise
    /// create a fresh one. Parameters on the request are ignored when
    /// resuming; the original session keeps its configuration.
    pub async fn start_or_resume(
        &self,
        client_id: &str,
        user_id: &str,
        claim_name: Option<String>,
        req: StartAssessmentRequest,
    ) -> Result<StartAssessmentResponse, ApiError> {
        if let Some(existing) = self
            .store
            .find_in_progress_session(client_id, user_id)
            .await?
        {
            let answered = self.store.list_answers(&existing.id).await?.len() as u32;
            tracing::info!("Resuming session {} for user {}", existing.id, user_id);
            return Ok(StartAssessmentResponse {
                session_id: existing.id,
                resumed: true,
                status: existing.status,
                bank_version: existing.bank_version,
                answered_count: answered,
                max_questions: existing.max_questions,
            });
        }

        let display_name = req.display_name.or(claim_name);
        let session = Session::new(
            client_id,
            user_id,
            &self.bank_version,
            req.grade,
            req.locale,
            display_name,
            req.max_questions,
        );
        self.store.insert_session(&session).await?;

        SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!("Started session {} for user {}", session.id, user_id);

        Ok(StartAssessmentResponse {
            session_id: session.id,
            resumed: false,
            status: session.status,
            bank_version: session.bank_version,
            answered_count: 0,
            max_questions: session.max_questions,
        })
    }

    /// Serve the question at ordinal `answered + 1`, or report a stop.
    /// Retries for the same ordinal replay the recorded question verbatim.
    pub async fn get_next_question(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<NextQuestionResponse, ApiError> {
        let mut session = self.owned_session(client_id, user_id, session_id).await?;
        if session.status.is_terminal() {
            return Err(ApiError::InvalidState(
                "session is not in progress".to_string(),
            ));
        }

        let answers = self.store.list_answers(session_id).await?;
        let ordinal = answers.len() as u32 + 1;
        let (questions, index) = self.load_index(&session, &answers).await?;
        let snapshot = compute_snapshot(&index, &answers);
        let selection = select_next(&session, &answers, &questions, &index, &snapshot);

        // Replay before deciding anything new: the recorded question is
        // authoritative for this ordinal.
        if let Some(record) = self.store.find_asked(session_id, ordinal).await? {
            QUESTIONS_SERVED_TOTAL.with_label_values(&["REPLAY"]).inc();
            let question = self.served_from_record(&record).await?;
            return Ok(NextQuestionResponse {
                session_id: session_id.to_string(),
                answered_count: answers.len() as u32,
                question_number: ordinal,
                stop: false,
                early_stop_recommended: false,
                eligible_remaining: selection.eligible_ids.len(),
                question: Some(question),
            });
        }

        let chosen = match selection.decision {
            Decision::Stop { early } => {
                return Ok(NextQuestionResponse {
                    session_id: session_id.to_string(),
                    answered_count: answers.len() as u32,
                    question_number: ordinal,
                    stop: true,
                    early_stop_recommended: early,
                    eligible_remaining: selection.eligible_ids.len(),
                    question: None,
                });
            }
            Decision::Ask(question) => question,
        };

        let options = index.options_for(&chosen.id);
        let baseline = render_baseline(&chosen, options, session.first_name());
        let reference_wanted =
            !answers.is_empty() && session.meta.reference_allowed(ordinal);
        let (rendered, referenced) = self
            .rewrite_question(&session, &snapshot, &chosen, &baseline, reference_wanted)
            .await;

        let record = AskedRecord {
            session_id: session_id.to_string(),
            question_number: ordinal,
            question_id: chosen.id.clone(),
            prompt: rendered.prompt.clone(),
            options: rendered.options.clone(),
            source: rendered.source,
            created_at: Utc::now(),
        };

        let served = match self.store.insert_asked_if_absent(&record).await? {
            AskedInsert::Inserted => {
                QUESTIONS_SERVED_TOTAL
                    .with_label_values(&[rendered.source.as_str()])
                    .inc();
                session.current_question_index = ordinal;
                if referenced {
                    session.meta.last_reference_question_number = Some(ordinal);
                }
                self.store.update_session(&session).await?;
                ServedQuestion {
                    id: chosen.id.clone(),
                    question_type: chosen.question_type,
                    prompt: record.prompt,
                    options: record.options,
                    source: record.source,
                }
            }
            AskedInsert::Lost(winner) => {
                // Concurrent retry won the ordinal; serve its record.
                QUESTIONS_SERVED_TOTAL.with_label_values(&["REPLAY"]).inc();
                self.served_from_record(&winner).await?
            }
        };

        Ok(NextQuestionResponse {
            session_id: session_id.to_string(),
            answered_count: answers.len() as u32,
            question_number: ordinal,
            stop: false,
            early_stop_recommended: false,
            eligible_remaining: selection.eligible_ids.len(),
            question: Some(served),
        })
    }

    /// Append an answer and recompute the running profile.
    pub async fn submit_answer(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
        req: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ApiError> {
        let mut session = self.owned_session(client_id, user_id, session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(ApiError::InvalidState(
                "session is not in progress".to_string(),
            ));
        }

        let question = self
            .catalog
            .find_question(&req.question_id)
            .await?
            .ok_or(ApiError::NotFound("question"))?;
        if question.bank_version != session.bank_version {
            return Err(ApiError::Validation(
                "question does not belong to the session's question bank".to_string(),
            ));
        }
        if let Some(option_id) = req.selected_option_id.as_deref() {
            let option = self
                .catalog
                .find_option(option_id)
                .await?
                .ok_or(ApiError::NotFound("option"))?;
            if option.question_id != question.id {
                return Err(ApiError::Validation(
                    "option does not belong to the question".to_string(),
                ));
            }
        }

        let answer = Answer::new(
            session_id,
            &req.question_id,
            req.selected_option_id,
            req.free_text,
            req.numeric_value,
            req.time_spent_ms.unwrap_or(0),
        );
        self.store.insert_answer(&answer).await?;

        let mut answers = self.store.list_answers(session_id).await?;
        if !answers.iter().any(|a| a.id == answer.id) {
            answers.push(answer);
        }
        let (_, index) = self.load_index(&session, &answers).await?;
        let snapshot = compute_snapshot(&index, &answers);

        let signature = snapshot.top_signature();
        if !signature.is_empty() {
            session.meta.push_signature(signature);
        }
        session.meta.last_confidence_score = Some(snapshot.overall_confidence_score);
        session.meta.last_confidence_level = Some(snapshot.overall_confidence_level);
        self.store.update_session(&session).await?;

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[question.question_type.as_str()])
            .inc();

        Ok(SubmitAnswerResponse {
            session_id: session_id.to_string(),
            answered_count: answers.len() as u32,
            max_questions: session.max_questions,
            top_domains: snapshot.top_domains,
            overall_confidence_score: snapshot.overall_confidence_score,
            overall_confidence_level: snapshot.overall_confidence_level,
        })
    }

    /// Finalize the session: freeze scores, derive the stream and career
    /// mapping, and persist the result exactly once.
    pub async fn complete(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<AssessmentResult, ApiError> {
        let mut session = self.owned_session(client_id, user_id, session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(ApiError::InvalidState(
                "session has already been finalized".to_string(),
            ));
        }

        let answers = self.store.list_answers(session_id).await?;
        let (_, index) = self.load_index(&session, &answers).await?;
        let snapshot = compute_snapshot(&index, &answers);
        let mapping = derive_mapping(
            &snapshot.top_domains,
            snapshot.overall_confidence_level,
            session.grade,
        );

        let answered_questions: Vec<&Question> = answers
            .iter()
            .filter_map(|a| index.question(&a.question_id))
            .collect();
        let weakest = weakest_indicator(answered_questions);

        let top_domain = snapshot
            .top_domains
            .first()
            .copied()
            .unwrap_or(Domain::Realistic);
        let recommended_courses = match self
            .courses
            .ranked_courses(
                mapping.stream,
                top_domain,
                weakest.as_deref(),
                RECOMMENDED_COURSES_LIMIT,
            )
            .await
        {
            Ok(courses) => courses,
            Err(e) => {
                tracing::warn!("course catalog lookup failed, recommending none: {}", e);
                Vec::new()
            }
        };

        let narrative =
            build_narrative(&self.textgen, &index, &answers, &snapshot, &mapping).await;

        let now = Utc::now();
        let result = AssessmentResult {
            id: AssessmentResult::new_id(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            domain_scores: snapshot.domains.clone(),
            top_domains: snapshot.top_domains.clone(),
            top_margin: snapshot.top_margin,
            overall_confidence_score: snapshot.overall_confidence_score,
            overall_confidence_level: snapshot.overall_confidence_level,
            stream_suggestion: mapping.stream,
            career_fields: mapping.career_fields.clone(),
            weakest_indicator: weakest,
            recommended_courses,
            narrative,
            created_at: now,
            regenerated_at: None,
        };
        self.store.insert_result(&result).await?;

        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        self.store.update_session(&session).await?;

        ASSESSMENTS_COMPLETED_TOTAL
            .with_label_values(&[snapshot.overall_confidence_level.as_str()])
            .inc();
        SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
        SESSIONS_ACTIVE.dec();
        tracing::info!(
            "Completed session {} ({} answers, {} confidence)",
            session_id,
            answers.len(),
            snapshot.overall_confidence_level.as_str()
        );

        Ok(result)
    }

    /// Mark an in-progress session abandoned. No result is produced.
    pub async fn abandon(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Session, ApiError> {
        let mut session = self.owned_session(client_id, user_id, session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(ApiError::InvalidState(
                "session has already been finalized".to_string(),
            ));
        }
        session.status = SessionStatus::Abandoned;
        session.completed_at = Some(Utc::now());
        self.store.update_session(&session).await?;

        SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        SESSIONS_ACTIVE.dec();
        Ok(session)
    }

    pub async fn get_result(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<AssessmentResult, ApiError> {
        let result = self
            .store
            .find_result_by_session(client_id, session_id)
            .await?
            .ok_or(ApiError::NotFound("result"))?;
        if result.user_id != user_id {
            return Err(ApiError::Forbidden);
        }
        Ok(result)
    }

    /// Rebuild the narrative artifacts of an existing result. Numeric
    /// fields are immutable; only the narrative and regenerated_at change.
    pub async fn regenerate_artifacts(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<AssessmentResult, ApiError> {
        let result = self.get_result(client_id, user_id, session_id).await?;
        let session = self.owned_session(client_id, user_id, session_id).await?;

        let answers = self.store.list_answers(session_id).await?;
        let (_, index) = self.load_index(&session, &answers).await?;
        // Scoring is deterministic over the stored answers, so this
        // reproduces the frozen numbers rather than changing them.
        let snapshot = compute_snapshot(&index, &answers);
        let mapping = derive_mapping(
            &result.top_domains,
            result.overall_confidence_level,
            session.grade,
        );
        let narrative =
            build_narrative(&self.textgen, &index, &answers, &snapshot, &mapping).await;

        let regenerated_at = Utc::now();
        self.store
            .update_result_narrative(session_id, &narrative, regenerated_at)
            .await?;

        let mut updated = result;
        updated.narrative = narrative;
        updated.regenerated_at = Some(regenerated_at);
        Ok(updated)
    }

    pub async fn list_recent_results(
        &self,
        client_id: &str,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<AssessmentResult>, ApiError> {
        let limit = limit
            .unwrap_or(RECENT_RESULTS_DEFAULT)
            .clamp(1, RECENT_RESULTS_CAP);
        let results = self
            .store
            .list_recent_results(client_id, user_id, limit)
            .await?;
        Ok(results)
    }

    async fn owned_session(
        &self,
        client_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Session, ApiError> {
        let session = self
            .store
            .find_session(client_id, session_id)
            .await?
            .ok_or(ApiError::NotFound("session"))?;
        if session.user_id != user_id {
            return Err(ApiError::Forbidden);
        }
        Ok(session)
    }

    /// Load the session's bank plus any answered questions that have since
    /// left it (deactivated or re-banked), so scoring never drops history.
    async fn load_index(
        &self,
        session: &Session,
        answers: &[Answer],
    ) -> Result<(Vec<Question>, CatalogIndex)> {
        let mut questions = self
            .catalog
            .find_active_questions(&session.bank_version)
            .await?;
        for answer in answers {
            if questions.iter().any(|q| q.id == answer.question_id) {
                continue;
            }
            if let Some(question) = self.catalog.find_question(&answer.question_id).await? {
                questions.push(question);
            }
        }
        let ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        let options = self.catalog.find_options_for_questions(&ids).await?;
        let index = CatalogIndex::build(questions.clone(), options);
        Ok((questions, index))
    }

    async fn served_from_record(&self, record: &AskedRecord) -> Result<ServedQuestion, ApiError> {
        let question = self
            .catalog
            .find_question(&record.question_id)
            .await?
            .ok_or_else(|| {
                ApiError::Internal(anyhow!(
                    "asked record references unknown question {}",
                    record.question_id
                ))
            })?;
        Ok(ServedQuestion {
            id: record.question_id.clone(),
            question_type: question.question_type,
            prompt: record.prompt.clone(),
            options: record.options.clone(),
            source: record.source,
        })
    }

    /// Ask the text collaborator to rewrite the baseline rendering. Any
    /// failure or invalid rewrite keeps the baseline. Returns the rendering
    /// plus whether an earlier-answer reference was actually used.
    async fn rewrite_question(
        &self,
        session: &Session,
        snapshot: &ScoringSnapshot,
        question: &Question,
        baseline: &RenderedQuestion,
        reference_wanted: bool,
    ) -> (RenderedQuestion, bool) {
        if !self.textgen.enabled() {
            return (baseline.clone(), false);
        }

        let request = PersonalizeRequest {
            question_type: question.question_type,
            prompt: baseline.prompt.clone(),
            options: baseline.options.clone(),
            locale: session.locale.clone(),
            grade: session.grade,
            first_name: session.first_name().map(str::to_string),
            recent_top_domains: Some(snapshot.top_signature()).filter(|s| !s.is_empty()),
            reference_earlier_answer: reference_wanted,
        };

        match self.textgen.personalize(&request).await {
            Ok(response) => match apply_rewrite(baseline, question.question_type, &response) {
                Some(rendered) => (rendered, reference_wanted),
                None => (baseline.clone(), false),
            },
            Err(e) => {
                tracing::warn!("personalization failed, serving baseline: {}", e);
                (baseline.clone(), false)
            }
        }
    }
}
