//! Error types for the assessment API client and the session coordinator.

use thiserror::Error;

use crate::models::SessionPhase;

/// Errors returned by an [`AssessmentApi`](crate::api::AssessmentApi) call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Transport-level failure (DNS, connection reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The credentials were missing, expired or insufficient.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend answered with an error status.
    #[error("API error (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be parsed.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Network(_) => true,
            ApiError::Rejected { status, .. } => *status >= 500 || *status == 429,
            ApiError::Unauthorized(_) | ApiError::NotFound(_) | ApiError::Decode(_) => false,
        }
    }
}

/// Errors surfaced by [`SessionCoordinator`](crate::services::session_service::SessionCoordinator).
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The backend refused to create a session (attempt limit, unavailable assessment).
    #[error("failed to start session: {0}")]
    SessionStart(#[source] ApiError),

    #[error("fullscreen is required but was denied: {0}")]
    FullscreenDenied(String),

    #[error("failed to submit answer for question {question_id}: {source}")]
    AnswerSubmit {
        question_id: String,
        #[source]
        source: ApiError,
    },

    #[error("answer for question {0} is already being submitted")]
    AnswerInFlight(String),

    #[error("heartbeat failed: {0}")]
    Heartbeat(#[source] ApiError),

    #[error("security event report failed: {0}")]
    SecurityReport(#[source] ApiError),

    /// The final submission failed; local answers are kept so the learner can retry.
    #[error("failed to submit assessment: {0}")]
    Submission(#[source] ApiError),

    /// Answers are locked once the time limit is reached.
    #[error("time limit reached; answers can no longer change")]
    TimeExpired,

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error("submitting the assessment requires confirmation")]
    ConfirmationRequired,

    #[error("back navigation is disabled for this assessment")]
    BackNavigationDisabled,

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("operation not allowed while the session is {0:?}")]
    InvalidState(SessionPhase),

    #[error("invalid assessment configuration: {0}")]
    InvalidAssessment(#[from] validator::ValidationErrors),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApiError::Timeout(10).is_transient());
        assert!(ApiError::Network("reset".into()).is_transient());
        assert!(ApiError::Rejected {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(ApiError::Rejected {
            status: 429,
            message: "slow down".into()
        }
        .is_transient());
        assert!(!ApiError::Rejected {
            status: 422,
            message: "invalid".into()
        }
        .is_transient());
        assert!(!ApiError::Unauthorized("expired".into()).is_transient());
    }
}
