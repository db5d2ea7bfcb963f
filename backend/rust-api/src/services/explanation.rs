//! Explanation payload for a completed assessment: per-answer score
//! deltas (derived by diffing prefix snapshots of the pure scoring
//! function) and per-domain narratives. The text collaborator may improve
//! the wording; the deterministic fallback is always available.

use super::mapping::MappingOutcome;
use super::personalization::TextGenClient;
use super::scoring::{compute_snapshot, ScoringSnapshot};
use crate::models::{Answer, AnswerImpact, CatalogIndex, Domain, DomainStat, ResultNarrative};
use serde_json::json;
use std::collections::BTreeMap;

/// Deltas smaller than this are noise and are not reported.
const DELTA_EPSILON: f64 = 0.005;

/// Score movement per answer, computed by replaying the scoring function
/// over each prefix of the answer list.
pub fn answer_impacts(index: &CatalogIndex, answers: &[Answer]) -> Vec<AnswerImpact> {
    let mut impacts = Vec::with_capacity(answers.len());
    let mut previous = compute_snapshot(index, &[]);
    for (i, answer) in answers.iter().enumerate() {
        let current = compute_snapshot(index, &answers[..=i]);
        let mut deltas = BTreeMap::new();
        for domain in Domain::ALL {
            let delta =
                current.stat(domain).score_0_to_100 - previous.stat(domain).score_0_to_100;
            if delta.abs() > DELTA_EPSILON {
                deltas.insert(domain, (delta * 100.0).round() / 100.0);
            }
        }
        let summary = impact_summary(&deltas);
        impacts.push(AnswerImpact {
            question_number: (i + 1) as u32,
            question_id: answer.question_id.clone(),
            score_deltas: deltas,
            top_domain_after: current.top_domains.first().copied(),
            summary,
        });
        previous = current;
    }
    impacts
}

fn impact_summary(deltas: &BTreeMap<Domain, f64>) -> String {
    let strongest = deltas
        .iter()
        .max_by(|a, b| {
            a.1.abs()
                .partial_cmp(&b.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(domain, delta)| (*domain, *delta));
    match strongest {
        Some((domain, delta)) if delta > 0.0 => {
            format!("Strengthened the {} profile by {:.1} points", domain.name(), delta)
        }
        Some((domain, delta)) => {
            format!("Softened the {} profile by {:.1} points", domain.name(), delta.abs())
        }
        None => "Did not move any domain score".to_string(),
    }
}

fn fallback_domain_narrative(domain: Domain, stat: &DomainStat) -> String {
    let strength = if stat.score_0_to_100 >= 70.0 {
        "a strong"
    } else if stat.score_0_to_100 >= 40.0 {
        "a moderate"
    } else {
        "a limited"
    };
    format!(
        "Your answers show {} pull towards {} interests (score {:.0}, based on {} answers).",
        strength,
        domain.name(),
        stat.score_0_to_100,
        stat.answered_count
    )
}

/// Assemble the narrative payload. Collaborator failures are absorbed:
/// every field has a deterministic fallback and the numeric inputs are
/// never affected.
pub async fn build_narrative(
    textgen: &TextGenClient,
    index: &CatalogIndex,
    answers: &[Answer],
    snapshot: &ScoringSnapshot,
    mapping: &MappingOutcome,
) -> ResultNarrative {
    let mut impacts = answer_impacts(index, answers);

    let mut domain_narratives: BTreeMap<Domain, String> = Domain::ALL
        .into_iter()
        .map(|domain| (domain, fallback_domain_narrative(domain, snapshot.stat(domain))))
        .collect();

    let mut report = None;

    if textgen.enabled() {
        let evidence = json!({
            "scores": snapshot.domains,
            "top_domains": snapshot.top_domains,
            "confidence": snapshot.overall_confidence_score,
            "confidence_level": snapshot.overall_confidence_level,
            "stream": mapping.stream.as_str(),
        });

        match textgen.summarize_domain_narratives(&evidence).await {
            Ok(narratives) => {
                for (code, text) in narratives {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(domain) = Domain::from_code(&code) {
                        domain_narratives.insert(domain, text.to_string());
                    }
                }
            }
            Err(e) => tracing::warn!("domain narrative generation failed, using fallback: {}", e),
        }

        let answer_payload = json!({
            "answers": impacts,
        });
        match textgen.summarize_answer_meanings(&answer_payload).await {
            Ok(meanings) => {
                for impact in impacts.iter_mut() {
                    if let Some(text) = meanings.get(&impact.question_id) {
                        let text = text.trim();
                        if !text.is_empty() {
                            impact.summary = text.to_string();
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("answer meaning generation failed, using fallback: {}", e),
        }

        match textgen.generate_report(&evidence).await {
            Ok(value) => report = Some(value),
            Err(e) => tracing::warn!("report generation failed, skipping report: {}", e),
        }
    }

    ResultNarrative {
        rationale: mapping.rationale.clone(),
        domain_narratives,
        answer_impacts: impacts,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, Question, QuestionOption, QuestionType};
    use crate::services::mapping::derive_mapping;

    fn likert(id: &str, domain: Domain) -> (Question, Vec<QuestionOption>) {
        let question = Question {
            id: id.to_string(),
            bank_version: "v1".into(),
            question_type: QuestionType::Likert,
            prompt: "p".into(),
            domain_tags: vec![domain],
            weight: 1.0,
            reverse_scored: false,
            grade_band: None,
            indicator: None,
            is_active: true,
        };
        let options = (-2..=2)
            .map(|v| QuestionOption {
                id: format!("{}-opt{}", id, v),
                question_id: id.to_string(),
                label: format!("{}", v),
                value: v,
                domain_tags: vec![],
            })
            .collect();
        (question, options)
    }

    #[test]
    fn impacts_track_score_movement_per_answer() {
        let (q1, o1) = likert("q1", Domain::Investigative);
        let (q2, o2) = likert("q2", Domain::Investigative);
        let mut options = o1;
        options.extend(o2);
        let index = CatalogIndex::build(vec![q1, q2], options);
        let answers = vec![
            Answer::new("s1", "q1", Some("q1-opt2".into()), None, None, 100),
            Answer::new("s1", "q2", Some("q2-opt0".into()), None, None, 100),
        ];
        let impacts = answer_impacts(&index, &answers);
        assert_eq!(impacts.len(), 2);
        // First answer: 0 -> 100 on Investigative.
        assert_eq!(impacts[0].score_deltas[&Domain::Investigative], 100.0);
        // Second answer averages the domain down to 75.
        assert_eq!(impacts[1].score_deltas[&Domain::Investigative], -25.0);
        assert_eq!(impacts[1].top_domain_after, Some(Domain::Investigative));
        assert!(impacts[1].summary.starts_with("Softened"));
    }

    #[tokio::test]
    async fn narrative_falls_back_without_collaborator() {
        let (q1, options) = likert("q1", Domain::Realistic);
        let index = CatalogIndex::build(vec![q1], options);
        let answers = vec![Answer::new("s1", "q1", Some("q1-opt2".into()), None, None, 100)];
        let snapshot = compute_snapshot(&index, &answers);
        let mapping = derive_mapping(&snapshot.top_domains, ConfidenceLevel::Low, Some(9));
        let textgen = TextGenClient::new(None);

        let narrative = build_narrative(&textgen, &index, &answers, &snapshot, &mapping).await;
        assert_eq!(narrative.domain_narratives.len(), 6);
        assert!(narrative.domain_narratives[&Domain::Realistic].contains("Realistic"));
        assert_eq!(narrative.answer_impacts.len(), 1);
        assert!(narrative.report.is_none());
        assert_eq!(narrative.rationale, mapping.rationale);
    }
}
