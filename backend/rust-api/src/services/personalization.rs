//! Question rendering: a deterministic baseline that always works, plus an
//! optional text-generation collaborator that may rewrite the wording.
//! Collaborator output is validated and discarded wholesale when it does
//! not line up with the catalog options, so the rendered question can
//! never end up worse than the baseline.

use crate::metrics::TEXTGEN_CALLS_TOTAL;
use crate::models::{
    PersonalizationSource, Question, QuestionOption, QuestionType, RenderedOption,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const TEXTGEN_TIMEOUT: Duration = Duration::from_secs(2);

const SCALE_SEVEN: [&str; 7] = [
    "Strongly agree",
    "Agree",
    "Slightly agree",
    "Neutral",
    "Slightly disagree",
    "Disagree",
    "Strongly disagree",
];

const SCALE_FIVE: [&str; 5] = [
    "Definitely",
    "Probably",
    "Not sure",
    "Probably not",
    "Not at all",
];

#[derive(Debug, Clone)]
pub struct RenderedQuestion {
    pub prompt: String,
    pub options: Vec<RenderedOption>,
    pub source: PersonalizationSource,
}

/// Deterministic baseline personalization. Prefixes the prompt with the
/// user's first name when known; for Likert items relabels the options
/// with the fixed agreement scale, ordered by value descending. Option
/// counts other than 5 or 7 keep their original labels.
pub fn render_baseline(
    question: &Question,
    options: &[QuestionOption],
    first_name: Option<&str>,
) -> RenderedQuestion {
    let mut templated = false;

    let prompt = match first_name {
        Some(name) => {
            templated = true;
            format!("{}, {}", name, question.prompt)
        }
        None => question.prompt.clone(),
    };

    let mut sorted: Vec<&QuestionOption> = options.iter().collect();
    sorted.sort_by(|a, b| b.value.cmp(&a.value).then(a.id.cmp(&b.id)));

    let scale: Option<&[&str]> = if question.question_type == QuestionType::Likert {
        match sorted.len() {
            7 => Some(&SCALE_SEVEN),
            5 => Some(&SCALE_FIVE),
            _ => None,
        }
    } else {
        None
    };

    let rendered = match scale {
        Some(labels) => {
            templated = true;
            sorted
                .iter()
                .zip(labels.iter())
                .map(|(option, label)| RenderedOption {
                    id: option.id.clone(),
                    label: (*label).to_string(),
                })
                .collect()
        }
        None => options
            .iter()
            .map(|option| RenderedOption {
                id: option.id.clone(),
                label: option.label.clone(),
            })
            .collect(),
    };

    RenderedQuestion {
        prompt,
        options: rendered,
        source: if templated {
            PersonalizationSource::Template
        } else {
            PersonalizationSource::Raw
        },
    }
}

/// Validate a collaborator rewrite against the baseline rendering and
/// apply it, or return None to keep the baseline. Labels are only applied
/// for option ids that exist; a Likert rewrite where fewer than half the
/// options received valid labels is discarded entirely.
pub fn apply_rewrite(
    baseline: &RenderedQuestion,
    question_type: QuestionType,
    rewrite: &PersonalizeResponse,
) -> Option<RenderedQuestion> {
    let known_ids: HashMap<&str, usize> = baseline
        .options
        .iter()
        .enumerate()
        .map(|(i, o)| (o.id.as_str(), i))
        .collect();

    let mut valid_labels = 0usize;
    let mut options = baseline.options.clone();
    for (id, label) in &rewrite.option_labels_by_id {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        if let Some(&slot) = known_ids.get(id.as_str()) {
            options[slot].label = label.to_string();
            valid_labels += 1;
        }
    }

    if question_type == QuestionType::Likert
        && !baseline.options.is_empty()
        && valid_labels * 2 < baseline.options.len()
    {
        return None;
    }

    let prompt = match rewrite.prompt.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => baseline.prompt.clone(),
    };
    if prompt == baseline.prompt && valid_labels == 0 {
        return None;
    }

    Some(RenderedQuestion {
        prompt,
        options,
        source: PersonalizationSource::Ai,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalizeRequest {
    pub question_type: QuestionType,
    pub prompt: String,
    pub options: Vec<RenderedOption>,
    pub locale: Option<String>,
    pub grade: Option<u32>,
    pub first_name: Option<String>,
    /// Signature of the user's current leading domains, e.g. "IR".
    pub recent_top_domains: Option<String>,
    /// Ask the collaborator to reference one of the earlier answers.
    pub reference_earlier_answer: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalizeResponse {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub option_labels_by_id: HashMap<String, String>,
}

/// Thin HTTP client for the optional text-generation collaborator. Every
/// call carries a bounded timeout; callers treat all failures as a signal
/// to fall back to deterministic output.
#[derive(Clone)]
pub struct TextGenClient {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl TextGenClient {
    pub fn new(base_url: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(TEXTGEN_TIMEOUT)
            .build()
            .unwrap_or_default();
        TextGenClient {
            base_url: base_url.filter(|url| !url.trim().is_empty()),
            http,
        }
    }

    pub fn enabled(&self) -> bool {
        self.base_url.is_some()
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow!("text generation collaborator not configured"))?;
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        let result = async {
            let response = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await
                .context("failed to call text generation collaborator")?;
            if !response.status().is_success() {
                anyhow::bail!("collaborator returned status {}", response.status());
            }
            response
                .json::<R>()
                .await
                .context("failed to parse collaborator response")
        }
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        TEXTGEN_CALLS_TOTAL
            .with_label_values(&[operation, status])
            .inc();
        result
    }

    pub async fn personalize(&self, request: &PersonalizeRequest) -> Result<PersonalizeResponse> {
        self.post_json("personalize", "/v1/personalize", request)
            .await
    }

    pub async fn summarize_answer_meanings(
        &self,
        payload: &serde_json::Value,
    ) -> Result<HashMap<String, String>> {
        self.post_json("answer_meanings", "/v1/answer-meanings", payload)
            .await
    }

    pub async fn summarize_domain_narratives(
        &self,
        payload: &serde_json::Value,
    ) -> Result<HashMap<String, String>> {
        self.post_json("domain_narratives", "/v1/domain-narratives", payload)
            .await
    }

    pub async fn generate_report(&self, payload: &serde_json::Value) -> Result<serde_json::Value> {
        self.post_json("report", "/v1/report", payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Domain;

    fn likert(option_count: usize) -> (Question, Vec<QuestionOption>) {
        let question = Question {
            id: "q1".into(),
            bank_version: "v1".into(),
            question_type: QuestionType::Likert,
            prompt: "I enjoy building things.".into(),
            domain_tags: vec![Domain::Realistic],
            weight: 1.0,
            reverse_scored: false,
            grade_band: None,
            indicator: None,
            is_active: true,
        };
        let options = (0..option_count)
            .map(|i| QuestionOption {
                id: format!("o{}", i),
                question_id: "q1".into(),
                label: format!("label {}", i),
                value: i as i32,
                domain_tags: vec![],
            })
            .collect();
        (question, options)
    }

    #[test]
    fn first_name_is_prefixed() {
        let (question, options) = likert(5);
        let rendered = render_baseline(&question, &options, Some("Priya"));
        assert_eq!(rendered.prompt, "Priya, I enjoy building things.");
        assert_eq!(rendered.source, PersonalizationSource::Template);
    }

    #[test]
    fn five_option_likert_gets_fixed_scale_by_descending_value() {
        let (question, options) = likert(5);
        let rendered = render_baseline(&question, &options, None);
        // Highest value ("o4") first.
        assert_eq!(rendered.options[0].id, "o4");
        assert_eq!(rendered.options[0].label, "Definitely");
        assert_eq!(rendered.options[4].id, "o0");
        assert_eq!(rendered.options[4].label, "Not at all");
        assert_eq!(rendered.source, PersonalizationSource::Template);
    }

    #[test]
    fn seven_option_likert_gets_agreement_scale() {
        let (question, options) = likert(7);
        let rendered = render_baseline(&question, &options, None);
        assert_eq!(rendered.options[0].label, "Strongly agree");
        assert_eq!(rendered.options[6].label, "Strongly disagree");
    }

    #[test]
    fn other_option_counts_keep_original_labels() {
        let (question, options) = likert(4);
        let rendered = render_baseline(&question, &options, None);
        assert_eq!(rendered.options[0].label, "label 0");
        assert_eq!(rendered.source, PersonalizationSource::Raw);
    }

    #[test]
    fn scenario_options_are_never_relabeled() {
        let (mut question, options) = likert(5);
        question.question_type = QuestionType::ScenarioMcq;
        let rendered = render_baseline(&question, &options, None);
        assert_eq!(rendered.options[0].label, "label 0");
    }

    #[test]
    fn rewrite_with_unknown_option_ids_is_discarded_for_likert() {
        let (question, options) = likert(5);
        let baseline = render_baseline(&question, &options, None);
        let rewrite = PersonalizeResponse {
            prompt: Some("Do you like making things?".into()),
            option_labels_by_id: [
                ("ghost-1".to_string(), "Yes".to_string()),
                ("ghost-2".to_string(), "No".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        assert!(apply_rewrite(&baseline, question.question_type, &rewrite).is_none());
    }

    #[test]
    fn rewrite_below_half_valid_labels_is_discarded_for_likert() {
        let (question, options) = likert(5);
        let baseline = render_baseline(&question, &options, None);
        let rewrite = PersonalizeResponse {
            prompt: None,
            option_labels_by_id: [
                ("o0".to_string(), "Never".to_string()),
                ("o1".to_string(), "Rarely".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        // 2 of 5 valid labels: below half, whole rewrite dropped.
        assert!(apply_rewrite(&baseline, question.question_type, &rewrite).is_none());
    }

    #[test]
    fn valid_rewrite_is_applied_with_ai_source() {
        let (question, options) = likert(5);
        let baseline = render_baseline(&question, &options, None);
        let rewrite = PersonalizeResponse {
            prompt: Some("Do you enjoy hands-on projects?".into()),
            option_labels_by_id: baseline
                .options
                .iter()
                .map(|o| (o.id.clone(), format!("new {}", o.label)))
                .collect(),
        };
        let applied = apply_rewrite(&baseline, question.question_type, &rewrite).unwrap();
        assert_eq!(applied.prompt, "Do you enjoy hands-on projects?");
        assert_eq!(applied.source, PersonalizationSource::Ai);
        assert!(applied.options.iter().all(|o| o.label.starts_with("new ")));
    }

    #[test]
    fn partial_labels_apply_per_field_for_scenario() {
        let (mut question, options) = likert(4);
        question.question_type = QuestionType::ScenarioMcq;
        let baseline = render_baseline(&question, &options, None);
        let rewrite = PersonalizeResponse {
            prompt: None,
            option_labels_by_id: [("o2".to_string(), "Organize the event".to_string())]
                .into_iter()
                .collect(),
        };
        let applied = apply_rewrite(&baseline, question.question_type, &rewrite).unwrap();
        let changed = applied.options.iter().find(|o| o.id == "o2").unwrap();
        assert_eq!(changed.label, "Organize the event");
        let unchanged = applied.options.iter().find(|o| o.id == "o0").unwrap();
        assert_eq!(unchanged.label, "label 0");
    }

    #[test]
    fn disabled_client_reports_disabled() {
        assert!(!TextGenClient::new(None).enabled());
        assert!(!TextGenClient::new(Some("  ".into())).enabled());
        assert!(TextGenClient::new(Some("http://localhost:9000".into())).enabled());
    }
}
