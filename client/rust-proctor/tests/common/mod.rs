#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assessment_proctor::browser::{BrowserHost, EventKind};
use assessment_proctor::models::answer::{
    HeartbeatRequest, SubmitAnswerRequest, SubmitAnswerResponse,
};
use assessment_proctor::models::anticheat::{AntiCheatConfig, SecurityEvent, Warning};
use assessment_proctor::models::{
    AnswerRecord, AssessmentConfig, Route, SessionSnapshot, SessionStatus,
    StartAssessmentResponse, SubmissionResult,
};
use assessment_proctor::{ApiError, AppState, AssessmentApi, Config, SessionCoordinator};

pub const SESSION_ID: &str = "session-1";

/// In-memory stand-in for the assessment backend. Records every call.
#[derive(Default)]
pub struct FakeApi {
    pub start_calls: AtomicUsize,
    pub start_error: Mutex<Option<ApiError>>,
    pub answers: Mutex<Vec<SubmitAnswerRequest>>,
    pub answer_failures: Mutex<VecDeque<ApiError>>,
    pub answer_responses: Mutex<VecDeque<SubmitAnswerResponse>>,
    pub answer_delay: Mutex<Option<Duration>>,
    pub heartbeats: Mutex<Vec<HeartbeatRequest>>,
    pub heartbeat_fails: AtomicBool,
    pub security_events: Mutex<Vec<SecurityEvent>>,
    pub security_fails: AtomicBool,
    pub submissions: Mutex<Vec<AnswerRecord>>,
    pub submit_failures: Mutex<VecDeque<ApiError>>,
    pub submit_delay: Mutex<Option<Duration>>,
    pub snapshots: Mutex<VecDeque<Result<SessionSnapshot, ApiError>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.security_events.lock().unwrap().clone()
    }

    pub fn answer_requests(&self) -> Vec<SubmitAnswerRequest> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssessmentApi for FakeApi {
    async fn start_assessment(
        &self,
        _assessment_id: &str,
        _anti_cheat: &AntiCheatConfig,
    ) -> Result<StartAssessmentResponse, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.start_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(StartAssessmentResponse {
            session_id: SESSION_ID.to_string(),
        })
    }

    async fn get_assessment_session(&self, _session_id: &str) -> Result<SessionSnapshot, ApiError> {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::NotFound("no snapshot queued".to_string())))
    }

    async fn submit_answer(
        &self,
        _session_id: &str,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ApiError> {
        let delay = *self.answer_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answers.lock().unwrap().push(request.clone());
        if let Some(err) = self.answer_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self
            .answer_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn session_heartbeat(
        &self,
        _session_id: &str,
        request: &HeartbeatRequest,
    ) -> Result<(), ApiError> {
        self.heartbeats.lock().unwrap().push(request.clone());
        if self.heartbeat_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    async fn report_security_event(
        &self,
        _session_id: &str,
        event: &SecurityEvent,
    ) -> Result<(), ApiError> {
        self.security_events.lock().unwrap().push(event.clone());
        if self.security_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected {
                status: 500,
                message: "telemetry store down".to_string(),
            });
        }
        Ok(())
    }

    async fn submit_assessment(
        &self,
        session_id: &str,
        answers: &AnswerRecord,
    ) -> Result<SubmissionResult, ApiError> {
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.submissions.lock().unwrap().push(answers.clone());
        if let Some(err) = self.submit_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(SubmissionResult {
            session_id: session_id.to_string(),
            status: SessionStatus::Submitted,
            score: Some(answers.len() as f64),
            max_score: None,
            submitted_at: None,
        })
    }
}

/// Records what the coordinator asked the browser to do.
#[derive(Default)]
pub struct FakeHost {
    pub deny_fullscreen: AtomicBool,
    pub fullscreen_requests: AtomicUsize,
    pub fullscreen_exits: AtomicUsize,
    pub attached: Mutex<BTreeSet<EventKind>>,
    pub attach_calls: AtomicUsize,
    pub detach_calls: AtomicUsize,
    pub warnings: Mutex<Vec<Warning>>,
    pub routes: Mutex<Vec<Route>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attached(&self) -> BTreeSet<EventKind> {
        self.attached.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserHost for FakeHost {
    async fn request_fullscreen(&self) -> Result<(), String> {
        self.fullscreen_requests.fetch_add(1, Ordering::SeqCst);
        if self.deny_fullscreen.load(Ordering::SeqCst) {
            Err("permission denied".to_string())
        } else {
            Ok(())
        }
    }

    fn exit_fullscreen(&self) {
        self.fullscreen_exits.fetch_add(1, Ordering::SeqCst);
    }

    fn attach_listeners(&self, kinds: &[EventKind]) {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        self.attached.lock().unwrap().extend(kinds.iter().copied());
    }

    fn detach_listeners(&self, kinds: &[EventKind]) {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        let mut attached = self.attached.lock().unwrap();
        for kind in kinds {
            attached.remove(kind);
        }
    }

    fn show_warning(&self, warning: &Warning) {
        self.warnings.lock().unwrap().push(warning.clone());
    }

    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

pub fn assessment(
    questions: usize,
    time_limit_seconds: Option<u64>,
    anti_cheat: AntiCheatConfig,
) -> AssessmentConfig {
    AssessmentConfig {
        assessment_id: "assessment-1".to_string(),
        question_ids: (1..=questions).map(|i| format!("q{}", i)).collect(),
        time_limit_seconds,
        allow_back_navigation: false,
        anti_cheat,
    }
}

pub fn coordinator(
    api: &Arc<FakeApi>,
    host: &Arc<FakeHost>,
    assessment: AssessmentConfig,
) -> SessionCoordinator {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let state = AppState::new(Config::default(), api.clone(), host.clone());
    SessionCoordinator::new(state, assessment).expect("valid assessment")
}
