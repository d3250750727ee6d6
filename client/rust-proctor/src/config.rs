use serde::Deserialize;
use std::env;
use std::time::Duration;
use validator::Validate;

const DEFAULT_API_URL: &str = "http://localhost:8081";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(url)]
    pub api_base_url: String,
    pub api_token: Option<String>,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
    #[validate(range(min = 10, max = 60000))]
    pub tick_interval_ms: u64,
    #[validate(range(min = 1, max = 3600))]
    pub heartbeat_interval_secs: u64,
    #[validate(range(min = 1, max = 3600))]
    pub snapshot_poll_interval_secs: u64,
    #[validate(range(min = 1, max = 10))]
    pub answer_retry_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout_secs: 10,
            tick_interval_ms: 1000,
            heartbeat_interval_secs: 30,
            snapshot_poll_interval_secs: 5,
            answer_retry_attempts: 3,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml first, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let api_base_url = settings
            .get_string("api.base_url")
            .or_else(|_| env::var("PROCTOR_API_URL"))
            .unwrap_or(defaults.api_base_url);

        let api_token = settings
            .get_string("api.token")
            .ok()
            .or_else(|| env::var("PROCTOR_API_TOKEN").ok())
            .filter(|token| !token.trim().is_empty());

        let read_u64 = |key: &str, fallback: u64| -> u64 {
            settings
                .get_int(key)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(fallback)
        };

        let config = Config {
            api_base_url,
            api_token,
            request_timeout_secs: read_u64("api.request_timeout_secs", defaults.request_timeout_secs),
            tick_interval_ms: read_u64("timer.tick_interval_ms", defaults.tick_interval_ms),
            heartbeat_interval_secs: read_u64(
                "timer.heartbeat_interval_secs",
                defaults.heartbeat_interval_secs,
            ),
            snapshot_poll_interval_secs: read_u64(
                "monitor.snapshot_poll_interval_secs",
                defaults.snapshot_poll_interval_secs,
            ),
            answer_retry_attempts: read_u64(
                "api.answer_retry_attempts",
                defaults.answer_retry_attempts as u64,
            ) as usize,
        };

        config.validate()?;

        if config.api_token.is_none() {
            tracing::warn!("No API token configured; requests will be sent unauthenticated");
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn snapshot_poll_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_poll_interval_secs)
    }
}
