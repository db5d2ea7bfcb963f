use axum::Router;
use compass_api::middlewares::{JwtClaims, JwtService};
use compass_api::models::{Domain, Question, QuestionOption, QuestionType};
use compass_api::store::{MemoryStore, NoopCourseCatalog};
use compass_api::{create_router, services::AppState, Config};
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_BANK: &str = "riasec-v1";

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config {
        mongo_uri: String::new(),
        mongo_database: String::new(),
        jwt_secret: TEST_SECRET.to_string(),
        text_api_url: None,
        bank_version: TEST_BANK.to_string(),
    };

    let store = Arc::new(MemoryStore::new());
    let (questions, options) = seed_catalog();
    store.seed_catalog(questions, options);

    let app_state = Arc::new(AppState::new(
        config,
        store.clone(),
        store,
        Arc::new(NoopCourseCatalog),
    ));

    create_router(app_state)
}

pub fn bearer_token(user_id: &str, client_id: &str, name: Option<&str>) -> String {
    let claims = JwtClaims {
        sub: user_id.to_string(),
        client_id: client_id.to_string(),
        name: name.map(String::from),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iat: chrono::Utc::now().timestamp() as usize,
    };
    JwtService::new(TEST_SECRET)
        .generate_token(claims)
        .expect("failed to mint test token")
}

/// Six Likert questions per domain (five options each, values -2..=2),
/// two scenario probes, and one question from a foreign bank.
fn seed_catalog() -> (Vec<Question>, Vec<QuestionOption>) {
    let mut questions = Vec::new();
    let mut options = Vec::new();

    for domain in Domain::ALL {
        for n in 1..=6 {
            let id = format!("q-{}-{}", domain.code(), n);
            questions.push(Question {
                id: id.clone(),
                bank_version: TEST_BANK.to_string(),
                question_type: QuestionType::Likert,
                prompt: format!(
                    "I enjoy {} activities like example {}",
                    domain.name().to_lowercase(),
                    n
                ),
                domain_tags: vec![domain],
                weight: 1.0,
                reverse_scored: false,
                grade_band: None,
                indicator: Some(format!("ind-{}", domain.code())),
                is_active: true,
            });
            for value in -2..=2i32 {
                options.push(QuestionOption {
                    id: format!("{}-o{}", id, value + 2),
                    question_id: id.clone(),
                    label: format!("level {}", value),
                    value,
                    domain_tags: vec![],
                });
            }
        }
    }

    for n in 1..=2 {
        let id = format!("q-scn-{}", n);
        questions.push(Question {
            id: id.clone(),
            bank_version: TEST_BANK.to_string(),
            question_type: QuestionType::ScenarioMcq,
            prompt: format!("A group project needs a volunteer, scenario {}", n),
            domain_tags: vec![],
            weight: 1.0,
            reverse_scored: false,
            grade_band: None,
            indicator: None,
            is_active: true,
        });
        for (slot, (value, domain)) in [
            (2, Domain::Investigative),
            (1, Domain::Artistic),
            (0, Domain::Social),
        ]
        .into_iter()
        .enumerate()
        {
            options.push(QuestionOption {
                id: format!("{}-o{}", id, slot),
                question_id: id.clone(),
                label: format!("choice {}", slot),
                value,
                domain_tags: vec![domain],
            });
        }
    }

    // A question from another bank; submitting it must be rejected.
    questions.push(Question {
        id: "q-foreign-1".to_string(),
        bank_version: "other-bank".to_string(),
        question_type: QuestionType::Likert,
        prompt: "I enjoy activities from a different catalog".to_string(),
        domain_tags: vec![Domain::Realistic],
        weight: 1.0,
        reverse_scored: false,
        grade_band: None,
        indicator: None,
        is_active: true,
    });
    for value in -2..=2i32 {
        options.push(QuestionOption {
            id: format!("q-foreign-1-o{}", value + 2),
            question_id: "q-foreign-1".to_string(),
            label: format!("level {}", value),
            value,
            domain_tags: vec![],
        });
    }

    (questions, options)
}
