use std::sync::Arc;

use crate::api::{AssessmentApi, HttpAssessmentApi};
use crate::browser::BrowserHost;
use crate::config::Config;

/// Collaborators shared by the coordinator and the snapshot poller.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub api: Arc<dyn AssessmentApi>,
    pub host: Arc<dyn BrowserHost>,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn AssessmentApi>, host: Arc<dyn BrowserHost>) -> Self {
        Self { config, api, host }
    }

    /// Wires the HTTP client from `config`.
    pub fn with_http_api(config: Config, host: Arc<dyn BrowserHost>) -> anyhow::Result<Self> {
        let api = HttpAssessmentApi::new(&config)?;
        tracing::info!("Assessment API client configured for {}", config.api_base_url);
        Ok(Self::new(config, Arc::new(api), host))
    }
}

pub mod answer_service;
pub mod anticheat_service;
pub mod session_service;
pub mod snapshot_poller;
pub mod timer_service;
