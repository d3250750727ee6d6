use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

pub mod answer;
pub mod anticheat;
pub mod timer;

use anticheat::AntiCheatConfig;

/// A learner's current answer value. Shape depends on the question type.
pub type AnswerValue = serde_json::Value;

/// Staged answers keyed by question id.
pub type AnswerRecord = BTreeMap<String, AnswerValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub session_id: String,
    pub assessment_id: String,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Submitted,
    TimedOut,
    Flagged,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Submitted | SessionStatus::TimedOut | SessionStatus::Abandoned
        )
    }
}

/// Local lifecycle of the coordinator for one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Starting,
    InProgress,
    Submitted,
    TimedOut,
    Abandoned,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Submitted | SessionPhase::TimedOut | SessionPhase::Abandoned
        )
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            SessionPhase::NotStarted | SessionPhase::Starting => SessionStatus::NotStarted,
            SessionPhase::InProgress => SessionStatus::InProgress,
            SessionPhase::Submitted => SessionStatus::Submitted,
            SessionPhase::TimedOut => SessionStatus::TimedOut,
            SessionPhase::Abandoned => SessionStatus::Abandoned,
        }
    }
}

/// Per-assessment settings the coordinator is created with.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentConfig {
    #[validate(length(min = 1))]
    pub assessment_id: String,
    #[validate(length(min = 1))]
    pub question_ids: Vec<String>,
    #[validate(range(min = 1))]
    pub time_limit_seconds: Option<u64>,
    #[serde(default)]
    pub allow_back_navigation: bool,
    #[serde(default)]
    #[validate(nested)]
    pub anti_cheat: AntiCheatConfig,
}

/// Returned to the caller once the backend has issued a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub assessment_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StartAssessmentRequest<'a> {
    pub anti_cheat_config: &'a AntiCheatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAssessmentResponse {
    pub session_id: String,
}

/// Server view of a session as returned by the polling endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answered_count: u32,
    #[serde(default)]
    pub security_event_count: u32,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAssessmentRequest<'a> {
    pub confirm_submission: bool,
    pub answers: &'a AnswerRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Destinations the coordinator asks the host to navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    AssessmentList,
    Results { session_id: String },
}
