//! Pure stream/career mapping derived from the final top domains.

use crate::models::{ConfidenceLevel, Domain, Question, Stream};
use std::collections::BTreeMap;

const MAX_CAREER_FIELDS: usize = 3;

#[derive(Debug, Clone)]
pub struct MappingOutcome {
    pub stream: Stream,
    pub career_fields: Vec<String>,
    pub rationale: String,
}

fn stream_points(domain: Domain) -> Stream {
    match domain {
        Domain::Investigative | Domain::Realistic => Stream::Science,
        Domain::Enterprising | Domain::Conventional => Stream::Commerce,
        Domain::Artistic | Domain::Social => Stream::Arts,
    }
}

/// Career fields keyed by the unordered pair of leading domains.
fn pair_field(a: Domain, b: Domain) -> Option<&'static str> {
    let mut pair = [a.code(), b.code()];
    pair.sort();
    match (pair[0], pair[1]) {
        ("I", "R") => Some("Engineering & Technology"),
        ("A", "R") => Some("Architecture & Industrial Design"),
        ("R", "S") => Some("Sports & Physical Education"),
        ("E", "R") => Some("Logistics & Operations"),
        ("C", "R") => Some("Skilled Trades & Manufacturing"),
        ("A", "I") => Some("Research & Scientific Communication"),
        ("I", "S") => Some("Medicine & Healthcare"),
        ("E", "I") => Some("Business Analytics & Consulting"),
        ("C", "I") => Some("Data Science & Actuarial Work"),
        ("A", "S") => Some("Media, Arts & Social Work"),
        ("A", "E") => Some("Marketing & Advertising"),
        ("A", "C") => Some("Publishing & Graphic Design"),
        ("E", "S") => Some("Management & Public Relations"),
        ("C", "S") => Some("Education & Administration"),
        ("C", "E") => Some("Business, Finance & Commerce"),
        _ => None,
    }
}

fn stream_defaults(stream: Stream) -> [&'static str; 2] {
    match stream {
        Stream::Science => ["Engineering & Technology", "Pure Sciences & Research"],
        Stream::Commerce => ["Business & Management", "Finance & Accounting"],
        Stream::Arts => ["Humanities & Social Sciences", "Design & Media"],
    }
}

pub fn derive_mapping(
    top_domains: &[Domain],
    confidence: ConfidenceLevel,
    grade: Option<u32>,
) -> MappingOutcome {
    let top1 = top_domains.first().copied();
    let top2 = top_domains.get(1).copied();

    // 2 points per occurrence; ties resolved Science > Commerce > Arts.
    let mut points = [(Stream::Science, 0u32), (Stream::Commerce, 0u32), (Stream::Arts, 0u32)];
    for domain in [top1, top2].into_iter().flatten() {
        let stream = stream_points(domain);
        for slot in points.iter_mut() {
            if slot.0 == stream {
                slot.1 += 2;
            }
        }
    }
    // Only a strictly higher score displaces the pick, so the array order
    // (Science, Commerce, Arts) is the tie order.
    let mut stream = Stream::Science;
    let mut best = 0u32;
    for (candidate, pts) in points {
        if pts > best {
            best = pts;
            stream = candidate;
        }
    }

    let mut fields: Vec<String> = Vec::new();
    if let (Some(a), Some(b)) = (top1, top2) {
        if let Some(field) = pair_field(a, b) {
            fields.push(field.to_string());
        }
    }
    if fields.is_empty() {
        fields.extend(stream_defaults(stream).iter().map(|f| f.to_string()));
    }
    fields.push(match confidence {
        ConfidenceLevel::Low => "Exploration across streams before committing".to_string(),
        _ => "Skill-building in your strongest interest areas".to_string(),
    });
    fields.truncate(MAX_CAREER_FIELDS);

    let interests = match (top1, top2) {
        (Some(a), Some(b)) => format!("{} and {}", a.name(), b.name()),
        (Some(a), None) => a.name().to_string(),
        _ => "a balanced interest profile".to_string(),
    };
    let grade_note = match grade {
        Some(g) if g <= 10 => " There is still room to explore electives before the stream choice.",
        _ => "",
    };
    let rationale = format!(
        "Leading interests in {} point towards the {} stream ({} confidence).{}",
        interests,
        stream.as_str(),
        confidence.as_str(),
        grade_note
    );

    MappingOutcome {
        stream,
        career_fields: fields,
        rationale,
    }
}

/// Least-frequent indicator tag among the answered questions, ties broken
/// towards the lexicographically smallest tag.
pub fn weakest_indicator<'a, I>(answered_questions: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Question>,
{
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for question in answered_questions {
        if let Some(indicator) = question.indicator.as_deref() {
            *counts.entry(indicator).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .min_by_key(|(tag, count)| (*count, *tag))
        .map(|(tag, _)| tag.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;

    #[test]
    fn investigative_realistic_maps_to_science_engineering() {
        let outcome = derive_mapping(
            &[Domain::Investigative, Domain::Realistic],
            ConfidenceLevel::High,
            Some(11),
        );
        assert_eq!(outcome.stream, Stream::Science);
        assert_eq!(outcome.career_fields[0], "Engineering & Technology");
        assert_eq!(outcome.career_fields.len(), 2);
        assert_eq!(
            outcome.career_fields[1],
            "Skill-building in your strongest interest areas"
        );
    }

    #[test]
    fn enterprising_conventional_maps_to_commerce() {
        let outcome = derive_mapping(
            &[Domain::Enterprising, Domain::Conventional],
            ConfidenceLevel::Medium,
            None,
        );
        assert_eq!(outcome.stream, Stream::Commerce);
        assert_eq!(outcome.career_fields[0], "Business, Finance & Commerce");
    }

    #[test]
    fn mixed_pair_tie_resolves_science_first() {
        // I -> Science 2 points, A -> Arts 2 points: tie, Science wins.
        let outcome = derive_mapping(
            &[Domain::Investigative, Domain::Artistic],
            ConfidenceLevel::High,
            None,
        );
        assert_eq!(outcome.stream, Stream::Science);
    }

    #[test]
    fn science_arts_tie_resolves_to_science() {
        // A -> Arts 2 points, R -> Science 2 points.
        let outcome = derive_mapping(
            &[Domain::Artistic, Domain::Realistic],
            ConfidenceLevel::Medium,
            None,
        );
        assert_eq!(outcome.stream, Stream::Science);
    }

    #[test]
    fn commerce_arts_tie_resolves_to_commerce() {
        // E -> Commerce 2 points, S -> Arts 2 points.
        let outcome = derive_mapping(
            &[Domain::Enterprising, Domain::Social],
            ConfidenceLevel::Medium,
            None,
        );
        assert_eq!(outcome.stream, Stream::Commerce);
    }

    #[test]
    fn low_confidence_appends_exploration_field() {
        let outcome = derive_mapping(
            &[Domain::Artistic, Domain::Social],
            ConfidenceLevel::Low,
            Some(9),
        );
        assert_eq!(outcome.stream, Stream::Arts);
        assert!(outcome
            .career_fields
            .iter()
            .any(|f| f.starts_with("Exploration")));
        assert!(outcome.career_fields.len() <= 3);
    }

    #[test]
    fn missing_pair_falls_back_to_stream_defaults() {
        let outcome = derive_mapping(&[Domain::Realistic], ConfidenceLevel::Medium, None);
        assert_eq!(outcome.stream, Stream::Science);
        assert_eq!(outcome.career_fields[0], "Engineering & Technology");
        assert_eq!(outcome.career_fields[1], "Pure Sciences & Research");
        assert_eq!(outcome.career_fields.len(), 3);
    }

    fn question_with_indicator(id: &str, indicator: Option<&str>) -> Question {
        Question {
            id: id.to_string(),
            bank_version: "v1".into(),
            question_type: QuestionType::Likert,
            prompt: "p".into(),
            domain_tags: vec![Domain::Realistic],
            weight: 1.0,
            reverse_scored: false,
            grade_band: None,
            indicator: indicator.map(String::from),
            is_active: true,
        }
    }

    #[test]
    fn weakest_indicator_is_least_frequent_tag() {
        let questions = vec![
            question_with_indicator("q1", Some("numerical")),
            question_with_indicator("q2", Some("numerical")),
            question_with_indicator("q3", Some("verbal")),
            question_with_indicator("q4", None),
        ];
        assert_eq!(
            weakest_indicator(questions.iter()),
            Some("verbal".to_string())
        );
    }

    #[test]
    fn weakest_indicator_none_without_tags() {
        let questions = vec![question_with_indicator("q1", None)];
        assert_eq!(weakest_indicator(questions.iter()), None);
    }

    #[test]
    fn weakest_indicator_tie_breaks_lexicographically() {
        let questions = vec![
            question_with_indicator("q1", Some("verbal")),
            question_with_indicator("q2", Some("numerical")),
        ];
        assert_eq!(
            weakest_indicator(questions.iter()),
            Some("numerical".to_string())
        );
    }
}
