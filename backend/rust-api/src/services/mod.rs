use crate::config::Config;
use crate::store::{AssessmentStore, CatalogStore, CourseCatalog};
use personalization::TextGenClient;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn CatalogStore>,
    pub store: Arc<dyn AssessmentStore>,
    pub courses: Arc<dyn CourseCatalog>,
    pub textgen: TextGenClient,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn AssessmentStore>,
        courses: Arc<dyn CourseCatalog>,
    ) -> Self {
        let textgen = TextGenClient::new(config.text_api_url.clone());
        Self {
            config,
            catalog,
            store,
            courses,
            textgen,
        }
    }
}

pub mod assessment_service;
pub mod explanation;
pub mod mapping;
pub mod personalization;
pub mod scoring;
pub mod selector;
