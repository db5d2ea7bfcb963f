//! Adaptive question selector. Stateless: re-derived from scratch on every
//! "next question" call from the committed answer list; its choice only
//! becomes durable once the orchestrator writes the asked-record.

use crate::models::{Answer, CatalogIndex, ConfidenceLevel, Domain, Question, QuestionType, Session};
use std::collections::HashSet;

/// Confidence-based stops never fire before this many answers.
pub const MIN_ANSWERS_BEFORE_STOP: u32 = 18;
/// Coverage-first phase runs while fewer answers than this exist.
const START_PHASE_ANSWERS: u32 = 12;
/// Early stop requires HIGH confidence and at least this margin.
const EARLY_STOP_MARGIN: f64 = 8.0;
/// Below this margin the leaders are ambiguous and a scenario probe is
/// preferred over another Likert item.
const PROBE_MARGIN: f64 = 5.0;

use super::scoring::ScoringSnapshot;

#[derive(Debug, Clone)]
pub enum Decision {
    Ask(Question),
    Stop { early: bool },
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub decision: Decision,
    pub eligible_ids: Vec<String>,
}

/// Filter the bank pool down to questions this session may still be asked:
/// active, matching bank version and grade band, not yet answered.
fn eligible_pool<'a>(
    session: &Session,
    answers: &[Answer],
    pool: &'a [Question],
) -> Vec<&'a Question> {
    let answered: HashSet<&str> = answers.iter().map(|a| a.question_id.as_str()).collect();
    pool.iter()
        .filter(|q| q.is_active)
        .filter(|q| q.bank_version == session.bank_version)
        .filter(|q| q.matches_grade(session.grade))
        .filter(|q| !answered.contains(q.id.as_str()))
        .collect()
}

/// Count of primary (Likert) answers already tagging each domain.
fn primary_counts(index: &CatalogIndex, answers: &[Answer]) -> [u32; 6] {
    let mut counts = [0u32; 6];
    for answer in answers {
        if let Some(question) = index.question(&answer.question_id) {
            if question.question_type == QuestionType::Likert {
                for &domain in &question.domain_tags {
                    counts[domain.index()] += 1;
                }
            }
        }
    }
    counts
}

fn first_of_type<'a>(eligible: &[&'a Question], kind: QuestionType) -> Option<&'a Question> {
    eligible.iter().copied().find(|q| q.question_type == kind)
}

fn likert_tagged<'a>(eligible: &[&'a Question], domain: Domain) -> Option<&'a Question> {
    eligible
        .iter()
        .copied()
        .find(|q| q.question_type == QuestionType::Likert && q.tags(domain))
}

pub fn select_next(
    session: &Session,
    answers: &[Answer],
    pool: &[Question],
    index: &CatalogIndex,
    snapshot: &ScoringSnapshot,
) -> Selection {
    let eligible = eligible_pool(session, answers, pool);
    let eligible_ids: Vec<String> = eligible.iter().map(|q| q.id.clone()).collect();
    let answered = answers.len() as u32;

    if answered >= session.max_questions {
        return Selection {
            decision: Decision::Stop { early: false },
            eligible_ids,
        };
    }
    if eligible.is_empty() {
        // Bank exhausted.
        return Selection {
            decision: Decision::Stop { early: false },
            eligible_ids,
        };
    }
    if answered >= MIN_ANSWERS_BEFORE_STOP
        && snapshot.overall_confidence_level == ConfidenceLevel::High
        && snapshot.top_margin >= EARLY_STOP_MARGIN
    {
        return Selection {
            decision: Decision::Stop { early: true },
            eligible_ids,
        };
    }

    let chosen = if answered < START_PHASE_ANSWERS {
        pick_coverage(&eligible, index, answers)
    } else {
        pick_focused(&eligible, snapshot)
    };

    Selection {
        decision: Decision::Ask(chosen.clone()),
        eligible_ids,
    }
}

/// Start phase: target the domain with the fewest primary answers so every
/// domain gets baseline coverage before the engine starts narrowing.
fn pick_coverage<'a>(
    eligible: &[&'a Question],
    index: &CatalogIndex,
    answers: &[Answer],
) -> &'a Question {
    let counts = primary_counts(index, answers);
    let target = Domain::ALL
        .into_iter()
        .min_by_key(|d| (counts[d.index()], d.index()))
        .unwrap_or(Domain::Realistic);

    likert_tagged(eligible, target)
        .or_else(|| first_of_type(eligible, QuestionType::Likert))
        .unwrap_or(eligible[0])
}

/// Focused phase: weight each domain by how much more evidence it needs,
/// doubling the weight of current leaders.
fn pick_focused<'a>(eligible: &[&'a Question], snapshot: &ScoringSnapshot) -> &'a Question {
    let target = Domain::ALL
        .into_iter()
        .max_by(|a, b| {
            let need = |d: Domain| {
                let base = if snapshot.top_domains.contains(&d) { 1.0 } else { 0.5 };
                base * (1.0 - snapshot.confidence(d))
            };
            need(*a)
                .partial_cmp(&need(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
                // max_by keeps the later element on ties; prefer the
                // earlier fixed-order domain instead.
                .then(b.index().cmp(&a.index()))
        })
        .unwrap_or(Domain::Realistic);

    if snapshot.top_margin < PROBE_MARGIN {
        if let Some(probe) = first_of_type(eligible, QuestionType::ScenarioMcq) {
            return probe;
        }
    }

    likert_tagged(eligible, target)
        .or_else(|| first_of_type(eligible, QuestionType::Likert))
        .unwrap_or(eligible[0])
}
