//! Request/response contracts of the external assessment API.

use async_trait::async_trait;

use crate::errors::ApiError;
use crate::models::answer::{HeartbeatRequest, SubmitAnswerRequest, SubmitAnswerResponse};
use crate::models::anticheat::{AntiCheatConfig, SecurityEvent};
use crate::models::{
    AnswerRecord, SessionSnapshot, StartAssessmentResponse, SubmissionResult,
};

pub mod http;

pub use http::HttpAssessmentApi;

#[async_trait]
pub trait AssessmentApi: Send + Sync {
    async fn start_assessment(
        &self,
        assessment_id: &str,
        anti_cheat: &AntiCheatConfig,
    ) -> Result<StartAssessmentResponse, ApiError>;

    async fn get_assessment_session(&self, session_id: &str) -> Result<SessionSnapshot, ApiError>;

    async fn submit_answer(
        &self,
        session_id: &str,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ApiError>;

    async fn session_heartbeat(
        &self,
        session_id: &str,
        request: &HeartbeatRequest,
    ) -> Result<(), ApiError>;

    async fn report_security_event(
        &self,
        session_id: &str,
        event: &SecurityEvent,
    ) -> Result<(), ApiError>;

    async fn submit_assessment(
        &self,
        session_id: &str,
        answers: &AnswerRecord,
    ) -> Result<SubmissionResult, ApiError>;
}
