//! Pure scoring engine: converts the full ordered answer history into
//! normalized per-domain scores with uncertainty estimation.
//!
//! The computation is deterministic and replayable: running it over any
//! prefix of the answer list reproduces exactly what an incremental
//! computation would have seen at that point. The explanation builder
//! relies on this to derive per-answer score deltas.

use crate::models::{
    Answer, CatalogIndex, ConfidenceLevel, Domain, DomainStat, QuestionType,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Likert values are normalized to this signed scale before scoring.
const LIKERT_MIN: f64 = -2.0;
const LIKERT_MAX: f64 = 2.0;
/// Scenario option values are expected in [0, 2].
const SCENARIO_MAX: f64 = 2.0;

const HIGH_THRESHOLD: f64 = 0.75;
const MEDIUM_THRESHOLD: f64 = 0.55;
/// Domains within this many points of the leader join `top_domains`.
const TOP_BAND_POINTS: f64 = 3.0;
const TOP_DOMAINS_CAP: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct ScoringSnapshot {
    pub domains: BTreeMap<Domain, DomainStat>,
    /// Ordered best-first, size 2..=3 once at least two domains exist.
    pub top_domains: Vec<Domain>,
    /// Score gap between the two leading domains.
    pub top_margin: f64,
    pub overall_confidence_score: f64,
    pub overall_confidence_level: ConfidenceLevel,
    pub answered_count: u32,
}

impl ScoringSnapshot {
    pub fn stat(&self, domain: Domain) -> &DomainStat {
        &self.domains[&domain]
    }

    pub fn confidence(&self, domain: Domain) -> f64 {
        self.stat(domain).confidence_0_to_1
    }

    /// Compact signature of the current leaders, e.g. "IR" or "RIA".
    pub fn top_signature(&self) -> String {
        self.top_domains.iter().map(|d| d.code()).collect()
    }
}

#[derive(Default)]
struct DomainAccumulator {
    primary_sum: f64,
    primary_count: u32,
    secondary_sum: f64,
    secondary_count: u32,
    samples: Vec<f64>,
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Rescale an option value to the signed Likert interval when the
/// question's option range differs from [-2, 2].
fn rescale_likert(value: f64, range: Option<(f64, f64)>) -> f64 {
    match range {
        Some((lo, hi)) if (lo - LIKERT_MIN).abs() < f64::EPSILON
            && (hi - LIKERT_MAX).abs() < f64::EPSILON =>
        {
            value
        }
        Some((lo, hi)) if hi > lo => {
            LIKERT_MIN + (LIKERT_MAX - LIKERT_MIN) * (value - lo) / (hi - lo)
        }
        Some(_) => 0.0,
        None => clamp(value, LIKERT_MIN, LIKERT_MAX),
    }
}

fn option_value_range(index: &CatalogIndex, question_id: &str) -> Option<(f64, f64)> {
    let options = index.options_for(question_id);
    if options.is_empty() {
        return None;
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for option in options {
        lo = lo.min(option.value as f64);
        hi = hi.max(option.value as f64);
    }
    Some((lo, hi))
}

fn sample_variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

pub fn confidence_level(score: f64) -> ConfidenceLevel {
    if score >= HIGH_THRESHOLD {
        ConfidenceLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Compute the scoring snapshot for the given ordered answer list.
///
/// Answers referencing questions or options missing from the catalog
/// index contribute nothing; an empty history yields zero scores and LOW
/// confidence rather than an error.
pub fn compute_snapshot(index: &CatalogIndex, answers: &[Answer]) -> ScoringSnapshot {
    let mut acc: [DomainAccumulator; 6] = Default::default();

    for answer in answers {
        let question = match index.question(&answer.question_id) {
            Some(q) => q,
            None => continue,
        };
        match question.question_type {
            QuestionType::Likert => {
                let raw = match answer
                    .selected_option_id
                    .as_deref()
                    .and_then(|id| index.option(id))
                {
                    Some(option) => rescale_likert(
                        option.value as f64,
                        option_value_range(index, &question.id),
                    ),
                    None => match answer.numeric_value {
                        Some(v) => rescale_likert(v, None),
                        None => continue,
                    },
                };
                let scored = if question.reverse_scored { -raw } else { raw };
                for &domain in &question.domain_tags {
                    let slot = &mut acc[domain.index()];
                    slot.primary_sum += scored * question.weight;
                    slot.primary_count += 1;
                    slot.samples.push(raw);
                }
            }
            QuestionType::ScenarioMcq => {
                let option = match answer
                    .selected_option_id
                    .as_deref()
                    .and_then(|id| index.option(id))
                {
                    Some(o) => o,
                    None => continue,
                };
                let value = clamp(option.value as f64, 0.0, SCENARIO_MAX);
                for &domain in &option.domain_tags {
                    let slot = &mut acc[domain.index()];
                    slot.secondary_sum += value;
                    slot.secondary_count += 1;
                }
            }
            QuestionType::OpenEnded => {}
        }
    }

    let mut domains = BTreeMap::new();
    for domain in Domain::ALL {
        let slot = &acc[domain.index()];
        let base = if slot.primary_count > 0 {
            clamp(
                ((slot.primary_sum / slot.primary_count as f64 + 2.0) / 4.0) * 100.0,
                0.0,
                100.0,
            )
        } else {
            0.0
        };
        let boost = if slot.secondary_count > 0 {
            clamp(
                (slot.secondary_sum / (slot.secondary_count as f64 * 2.0)) * 10.0,
                0.0,
                10.0,
            )
        } else {
            0.0
        };
        let variance = sample_variance(&slot.samples);
        let count_factor = clamp(slot.primary_count as f64 / 4.0, 0.0, 1.0);
        // No primary answers means no consistency evidence either; without
        // this a domain nobody touched would sit at 0.4 confidence.
        let consistency_factor = if slot.primary_count == 0 {
            0.0
        } else {
            clamp(1.0 - variance / 4.0, 0.0, 1.0)
        };
        domains.insert(
            domain,
            DomainStat {
                score_0_to_100: clamp(base + boost, 0.0, 100.0),
                confidence_0_to_1: clamp(0.6 * count_factor + 0.4 * consistency_factor, 0.0, 1.0),
                answered_count: slot.primary_count + slot.secondary_count,
                variance,
            },
        );
    }

    // Rank descending by score, ties broken by the fixed domain order.
    let mut ranked: Vec<Domain> = Domain::ALL.to_vec();
    ranked.sort_by(|a, b| {
        domains[b]
            .score_0_to_100
            .partial_cmp(&domains[a].score_0_to_100)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index().cmp(&b.index()))
    });

    let best = domains[&ranked[0]].score_0_to_100;
    let mut top_domains: Vec<Domain> = ranked
        .iter()
        .copied()
        .filter(|d| best - domains[d].score_0_to_100 <= TOP_BAND_POINTS)
        .take(TOP_DOMAINS_CAP)
        .collect();
    if top_domains.len() < 2 {
        top_domains = ranked.iter().copied().take(2).collect();
    }

    let top_margin = domains[&ranked[0]].score_0_to_100 - domains[&ranked[1]].score_0_to_100;

    let mean_confidence = Domain::ALL
        .iter()
        .map(|d| domains[d].confidence_0_to_1)
        .sum::<f64>()
        / Domain::ALL.len() as f64;
    let overall = clamp(
        0.75 * mean_confidence + 0.25 * clamp(top_margin / 10.0, 0.0, 1.0),
        0.0,
        1.0,
    );

    ScoringSnapshot {
        domains,
        top_domains,
        top_margin,
        overall_confidence_score: overall,
        overall_confidence_level: confidence_level(overall),
        answered_count: answers.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionOption};

    fn likert_question(id: &str, domains: &[Domain], reverse: bool) -> Question {
        Question {
            id: id.to_string(),
            bank_version: "v1".into(),
            question_type: QuestionType::Likert,
            prompt: format!("likert {}", id),
            domain_tags: domains.to_vec(),
            weight: 1.0,
            reverse_scored: reverse,
            grade_band: None,
            indicator: None,
            is_active: true,
        }
    }

    fn likert_options(question_id: &str) -> Vec<QuestionOption> {
        (-2..=2)
            .map(|v| QuestionOption {
                id: format!("{}-opt{}", question_id, v),
                question_id: question_id.to_string(),
                label: format!("value {}", v),
                value: v,
                domain_tags: vec![],
            })
            .collect()
    }

    fn scenario_question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            bank_version: "v1".into(),
            question_type: QuestionType::ScenarioMcq,
            prompt: format!("scenario {}", id),
            domain_tags: vec![],
            weight: 1.0,
            reverse_scored: false,
            grade_band: None,
            indicator: None,
            is_active: true,
        }
    }

    fn open_question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            bank_version: "v1".into(),
            question_type: QuestionType::OpenEnded,
            prompt: format!("open {}", id),
            domain_tags: vec![Domain::Artistic],
            weight: 1.0,
            reverse_scored: false,
            grade_band: None,
            indicator: None,
            is_active: true,
        }
    }

    fn answer(question_id: &str, option_id: &str) -> Answer {
        Answer::new("s1", question_id, Some(option_id.to_string()), None, None, 500)
    }

    fn max_agree_index(n: usize) -> (CatalogIndex, Vec<Answer>) {
        let mut questions = Vec::new();
        let mut options = Vec::new();
        let mut answers = Vec::new();
        for i in 0..n {
            let qid = format!("q{}", i);
            questions.push(likert_question(&qid, &[Domain::Investigative], false));
            options.extend(likert_options(&qid));
            answers.push(answer(&qid, &format!("{}-opt2", qid)));
        }
        (CatalogIndex::build(questions, options), answers)
    }

    #[test]
    fn empty_history_yields_zero_scores_and_low_confidence() {
        let index = CatalogIndex::build(vec![], vec![]);
        let snapshot = compute_snapshot(&index, &[]);
        for domain in Domain::ALL {
            let stat = snapshot.stat(domain);
            assert_eq!(stat.score_0_to_100, 0.0);
            assert_eq!(stat.confidence_0_to_1, 0.0);
        }
        assert_eq!(snapshot.overall_confidence_level, ConfidenceLevel::Low);
        assert_eq!(snapshot.top_margin, 0.0);
        assert_eq!(snapshot.answered_count, 0);
    }

    #[test]
    fn eighteen_max_agree_likerts_score_one_hundred() {
        let (index, answers) = max_agree_index(18);
        let snapshot = compute_snapshot(&index, &answers);
        let stat = snapshot.stat(Domain::Investigative);
        assert_eq!(stat.score_0_to_100, 100.0);
        // countFactor = 1, consistencyFactor = 1 (variance 0)
        assert!(stat.confidence_0_to_1 >= 0.6);
        assert_eq!(stat.variance, 0.0);
        // Domains with no answers carry no confidence at all.
        assert_eq!(snapshot.confidence(Domain::Realistic), 0.0);
        assert_eq!(snapshot.top_domains[0], Domain::Investigative);
    }

    #[test]
    fn scores_and_confidence_stay_in_bounds() {
        let mut questions = vec![
            likert_question("q0", &[Domain::Realistic], true),
            likert_question("q1", &[Domain::Realistic, Domain::Social], false),
            scenario_question("q2"),
            open_question("q3"),
        ];
        questions[1].weight = 3.5;
        let mut options = likert_options("q0");
        options.extend(likert_options("q1"));
        options.push(QuestionOption {
            id: "q2-a".into(),
            question_id: "q2".into(),
            label: "build something".into(),
            value: 2,
            domain_tags: vec![Domain::Realistic],
        });
        let index = CatalogIndex::build(questions, options);
        let answers = vec![
            answer("q0", "q0-opt-2"),
            answer("q1", "q1-opt2"),
            answer("q2", "q2-a"),
            Answer::new("s1", "q3", None, Some("essay".into()), None, 900),
        ];
        let snapshot = compute_snapshot(&index, &answers);
        for domain in Domain::ALL {
            let stat = snapshot.stat(domain);
            assert!((0.0..=100.0).contains(&stat.score_0_to_100));
            assert!((0.0..=1.0).contains(&stat.confidence_0_to_1));
        }
        assert!((0.0..=1.0).contains(&snapshot.overall_confidence_score));
    }

    #[test]
    fn reverse_scored_negates_before_weighting() {
        let questions = vec![likert_question("q0", &[Domain::Conventional], true)];
        let options = likert_options("q0");
        let index = CatalogIndex::build(questions, options);
        // Strong agreement with a reverse-scored item pulls the domain down.
        let snapshot = compute_snapshot(&index, &[answer("q0", "q0-opt2")]);
        assert_eq!(snapshot.stat(Domain::Conventional).score_0_to_100, 0.0);
    }

    #[test]
    fn open_ended_answers_never_move_scores() {
        let (index_base, answers) = max_agree_index(5);
        let before = compute_snapshot(&index_base, &answers);

        let mut questions: Vec<Question> = (0..5)
            .map(|i| likert_question(&format!("q{}", i), &[Domain::Investigative], false))
            .collect();
        questions.push(open_question("open1"));
        let options = (0..5).flat_map(|i| likert_options(&format!("q{}", i))).collect();
        let index = CatalogIndex::build(questions, options);

        let mut extended = answers.clone();
        extended.push(Answer::new("s1", "open1", None, Some("I like art".into()), None, 100));
        let after = compute_snapshot(&index, &extended);

        for domain in Domain::ALL {
            assert_eq!(
                before.stat(domain).score_0_to_100,
                after.stat(domain).score_0_to_100
            );
        }
        assert_eq!(after.answered_count, 6);
    }

    #[test]
    fn scenario_boost_is_capped_at_ten() {
        let questions = vec![scenario_question("sc1"), scenario_question("sc2")];
        let options = vec![
            QuestionOption {
                id: "sc1-a".into(),
                question_id: "sc1".into(),
                label: "lead the group".into(),
                value: 2,
                domain_tags: vec![Domain::Enterprising],
            },
            QuestionOption {
                id: "sc2-a".into(),
                question_id: "sc2".into(),
                label: "pitch the idea".into(),
                value: 2,
                domain_tags: vec![Domain::Enterprising],
            },
        ];
        let index = CatalogIndex::build(questions, options);
        let answers = vec![answer("sc1", "sc1-a"), answer("sc2", "sc2-a")];
        let snapshot = compute_snapshot(&index, &answers);
        // No primary evidence: base 0, boost capped at 10.
        assert_eq!(snapshot.stat(Domain::Enterprising).score_0_to_100, 10.0);
    }

    #[test]
    fn non_standard_option_range_is_rescaled() {
        let questions = vec![likert_question("q0", &[Domain::Social], false)];
        let options: Vec<QuestionOption> = (1..=5)
            .map(|v| QuestionOption {
                id: format!("q0-o{}", v),
                question_id: "q0".into(),
                label: format!("{}", v),
                value: v,
                domain_tags: vec![],
            })
            .collect();
        let index = CatalogIndex::build(questions, options);
        // Top of a 1..5 scale rescales to +2, i.e. score 100.
        let snapshot = compute_snapshot(&index, &[answer("q0", "q0-o5")]);
        assert_eq!(snapshot.stat(Domain::Social).score_0_to_100, 100.0);
        // Midpoint rescales to 0, i.e. score 50.
        let snapshot = compute_snapshot(&index, &[answer("q0", "q0-o3")]);
        assert_eq!(snapshot.stat(Domain::Social).score_0_to_100, 50.0);
    }

    #[test]
    fn snapshot_is_deterministic_and_replayable() {
        let (index, answers) = max_agree_index(12);
        let full_a = serde_json::to_string(&compute_snapshot(&index, &answers)).unwrap();
        let full_b = serde_json::to_string(&compute_snapshot(&index, &answers)).unwrap();
        assert_eq!(full_a, full_b);

        // Prefix replay matches an incremental computation at that point.
        let prefix = compute_snapshot(&index, &answers[..7]);
        assert_eq!(prefix.answered_count, 7);
        assert_eq!(prefix.stat(Domain::Investigative).answered_count, 7);
    }

    #[test]
    fn top_domains_within_three_points_capped_at_three() {
        // Four domains all at 100: only the first three (fixed order) kept.
        let mut questions = Vec::new();
        let mut options = Vec::new();
        let mut answers = Vec::new();
        for (i, domain) in [
            Domain::Realistic,
            Domain::Investigative,
            Domain::Artistic,
            Domain::Social,
        ]
        .iter()
        .enumerate()
        {
            let qid = format!("q{}", i);
            questions.push(likert_question(&qid, &[*domain], false));
            options.extend(likert_options(&qid));
            answers.push(answer(&qid, &format!("{}-opt2", qid)));
        }
        let index = CatalogIndex::build(questions, options);
        let snapshot = compute_snapshot(&index, &answers);
        assert_eq!(
            snapshot.top_domains,
            vec![Domain::Realistic, Domain::Investigative, Domain::Artistic]
        );
        assert_eq!(snapshot.top_margin, 0.0);
    }

    #[test]
    fn second_ranked_domain_is_forced_in_when_leader_is_isolated() {
        let (index, answers) = max_agree_index(4);
        let snapshot = compute_snapshot(&index, &answers);
        assert_eq!(snapshot.top_domains.len(), 2);
        assert_eq!(snapshot.top_domains[0], Domain::Investigative);
        // Runner-up is the first zero-score domain in fixed order.
        assert_eq!(snapshot.top_domains[1], Domain::Realistic);
        assert_eq!(snapshot.top_margin, 100.0);
    }
}
