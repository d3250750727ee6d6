use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnswerValue;

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    pub answer: AnswerValue,
    pub time_spent_ms: u64,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    #[serde(default)]
    pub next_question_id: Option<String>,
    #[serde(default)]
    pub adaptive_adjustment: Option<AdaptiveAdjustment>,
}

/// Backend-driven change to difficulty or ordering based on prior answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveAdjustment {
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub timestamp: DateTime<Utc>,
    pub is_active: bool,
    pub metadata: HeartbeatMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatMetadata {
    pub tab_switches: u32,
    pub keystrokes: u64,
    pub mouse_movements: u64,
    pub elapsed_seconds: u64,
    pub current_question_id: Option<String>,
}
