use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::AssessmentApi;
use crate::config::Config;
use crate::errors::ApiError;
use crate::metrics::track_api_call;
use crate::models::answer::{HeartbeatRequest, SubmitAnswerRequest, SubmitAnswerResponse};
use crate::models::anticheat::{AntiCheatConfig, SecurityEvent, SecurityEventRequest};
use crate::models::{
    AnswerRecord, SessionSnapshot, StartAssessmentRequest, StartAssessmentResponse,
    SubmissionResult, SubmitAssessmentRequest,
};

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// `AssessmentApi` over the backend's REST endpoints.
pub struct HttpAssessmentApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpAssessmentApi {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Appends `segments` below the base URL's own path, percent-encoding each.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn session_url(&self, session_id: &str, endpoint: Option<&str>) -> Result<Url, ApiError> {
        match endpoint {
            Some(endpoint) => self.url(&["assessment-sessions", session_id, endpoint]),
            None => self.url(&["assessment-sessions", session_id]),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout_secs)
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(match status {
            401 | 403 => ApiError::Unauthorized(message),
            404 => ApiError::NotFound(message),
            408 => ApiError::Timeout(self.timeout_secs),
            _ => ApiError::Rejected { status, message },
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssessmentApi for HttpAssessmentApi {
    async fn start_assessment(
        &self,
        assessment_id: &str,
        anti_cheat: &AntiCheatConfig,
    ) -> Result<StartAssessmentResponse, ApiError> {
        let url = self.url(&["assessments", assessment_id, "sessions"])?;
        let body = StartAssessmentRequest {
            anti_cheat_config: anti_cheat,
        };

        tracing::debug!("Starting assessment {} via {}", assessment_id, url);

        track_api_call(
            "start_assessment",
            self.send_json(self.client.post(url).json(&body)),
        )
        .await
    }

    async fn get_assessment_session(&self, session_id: &str) -> Result<SessionSnapshot, ApiError> {
        let url = self.session_url(session_id, None)?;
        track_api_call("get_assessment_session", self.send_json(self.client.get(url))).await
    }

    async fn submit_answer(
        &self,
        session_id: &str,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ApiError> {
        let url = self.session_url(session_id, Some("answers"))?;
        track_api_call(
            "submit_answer",
            self.send_json(
                self.client
                    .post(url)
                    .header("idempotency-key", &request.idempotency_key)
                    .json(request),
            ),
        )
        .await
    }

    async fn session_heartbeat(
        &self,
        session_id: &str,
        request: &HeartbeatRequest,
    ) -> Result<(), ApiError> {
        let url = self.session_url(session_id, Some("heartbeat"))?;
        track_api_call("session_heartbeat", async {
            self.send(self.client.post(url).json(request)).await?;
            Ok(())
        })
        .await
    }

    async fn report_security_event(
        &self,
        session_id: &str,
        event: &SecurityEvent,
    ) -> Result<(), ApiError> {
        let url = self.session_url(session_id, Some("security-events"))?;
        let body = SecurityEventRequest {
            event_type: event.event_type,
            timestamp: event.timestamp,
            metadata: &event.metadata,
        };
        track_api_call("report_security_event", async {
            self.send(self.client.post(url).json(&body)).await?;
            Ok(())
        })
        .await
    }

    async fn submit_assessment(
        &self,
        session_id: &str,
        answers: &AnswerRecord,
    ) -> Result<SubmissionResult, ApiError> {
        let url = self.session_url(session_id, Some("submit"))?;
        let body = SubmitAssessmentRequest {
            confirm_submission: true,
            answers,
        };
        track_api_call(
            "submit_assessment",
            self.send_json(self.client.post(url).json(&body)),
        )
        .await
    }
}
