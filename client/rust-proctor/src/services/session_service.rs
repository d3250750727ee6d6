use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use validator::Validate;

use super::answer_service::AnswerSheet;
use super::anticheat_service::SecurityMonitor;
use super::timer_service;
use super::AppState;
use crate::api::AssessmentApi;
use crate::browser::{BrowserEvent, BrowserHost, EventDisposition, ListenerRegistration, ListenerTable};
use crate::errors::{ApiError, CoordinatorError};
use crate::metrics::{
    ANSWERS_SUBMITTED_TOTAL, AUTO_SUBMITS_TOTAL, SECURITY_REPORTS_TOTAL, SESSIONS_ACTIVE,
    SESSIONS_TOTAL,
};
use crate::models::answer::{HeartbeatRequest, SubmitAnswerResponse};
use crate::models::anticheat::{SecurityCounters, SecurityEvent};
use crate::models::timer::{TimeExpired, TimerEvent, TimerState, TimerTick};
use crate::models::{
    AnswerRecord, AnswerValue, AssessmentConfig, AssessmentSession, Route, SessionHandle,
    SessionPhase, SubmissionResult,
};
use crate::utils::retry::{retry_if, RetryConfig};
use crate::utils::time::elapsed_seconds;

const TIMER_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    Expired,
    Stop,
}

#[derive(Debug, Clone, Copy)]
enum SubmitTrigger {
    Learner,
    Timer,
}

/// Timers and listeners that only exist while a session is in progress.
/// Dropping it is the teardown: tasks are aborted, listeners detached and
/// fullscreen released, whichever path ended the session.
struct SessionRuntime {
    tasks: Vec<JoinHandle<()>>,
    listeners: ListenerRegistration,
    host: Arc<dyn BrowserHost>,
    holds_fullscreen: bool,
}

impl SessionRuntime {
    fn new(
        tasks: Vec<JoinHandle<()>>,
        listeners: ListenerRegistration,
        host: Arc<dyn BrowserHost>,
        holds_fullscreen: bool,
    ) -> Self {
        SESSIONS_ACTIVE.inc();
        Self {
            tasks,
            listeners,
            host,
            holds_fullscreen,
        }
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if self.holds_fullscreen {
            self.host.exit_fullscreen();
        }
        SESSIONS_ACTIVE.dec();
        tracing::debug!("Session runtime torn down");
    }
}

struct SessionState {
    phase: SessionPhase,
    session: Option<AssessmentSession>,
    started_instant: Option<Instant>,
    timer: TimerState,
    time_expired: bool,
    submission_in_flight: bool,
    /// The timer fired while a learner submission was in flight.
    auto_submit_deferred: bool,
    monitor: SecurityMonitor,
    answers: AnswerSheet,
    result: Option<SubmissionResult>,
    runtime: Option<SessionRuntime>,
}

impl SessionState {
    fn session_id(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.session_id.clone())
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        if let Some(session) = self.session.as_mut() {
            session.status = phase.status();
        }
    }

    fn elapsed_seconds(&self, now: Instant) -> u64 {
        self.started_instant
            .map(|start| elapsed_seconds(start, now))
            .unwrap_or(0)
    }

    /// Detaches the runtime, releasing fullscreen only if the learner is still in it.
    fn take_runtime(&mut self) -> Option<SessionRuntime> {
        let mut runtime = self.runtime.take()?;
        runtime.holds_fullscreen &= self.monitor.is_fullscreen_active();
        Some(runtime)
    }

    /// In-progress session id, or the error for the current phase.
    fn require_in_progress(&self) -> Result<String, CoordinatorError> {
        match (self.phase, self.session_id()) {
            (SessionPhase::InProgress, Some(id)) => Ok(id),
            (phase, _) => Err(CoordinatorError::InvalidState(phase)),
        }
    }
}

pub(crate) struct CoordinatorInner {
    state: AppState,
    assessment: AssessmentConfig,
    session: Mutex<SessionState>,
    timer_events: broadcast::Sender<TimerEvent>,
    auto_submit_fired: AtomicBool,
    pending_reports: Mutex<Vec<JoinHandle<()>>>,
}

impl CoordinatorInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn api(&self) -> Arc<dyn AssessmentApi> {
        self.state.api.clone()
    }

    pub(crate) fn on_tick(&self, now: Instant) -> TickOutcome {
        let event = {
            let mut s = self.lock();
            if s.phase != SessionPhase::InProgress {
                return TickOutcome::Stop;
            }
            let Some(session_id) = s.session_id() else {
                return TickOutcome::Stop;
            };

            let elapsed = s.elapsed_seconds(now);
            s.timer.advance_to(elapsed);

            if s.timer.is_expired() {
                s.time_expired = true;
                TimerEvent::TimeExpired(TimeExpired {
                    session_id,
                    elapsed_seconds: s.timer.elapsed_seconds,
                    timestamp: Utc::now(),
                })
            } else {
                TimerEvent::TimerTick(TimerTick {
                    session_id,
                    elapsed_seconds: s.timer.elapsed_seconds,
                    remaining_seconds: s.timer.remaining_seconds(),
                    total_seconds: s.timer.total_seconds,
                    timestamp: Utc::now(),
                })
            }
        };

        let expired = matches!(event, TimerEvent::TimeExpired(_));
        if expired {
            tracing::info!("Time limit reached for assessment {}", self.assessment.assessment_id);
        }
        // No subscribers is fine; the UI may not be listening yet.
        let _ = self.timer_events.send(event);

        if expired {
            TickOutcome::Expired
        } else {
            TickOutcome::Continue
        }
    }

    /// One-shot guard: only the first caller wins.
    pub(crate) fn claim_auto_submit(&self) -> bool {
        self.auto_submit_fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) async fn auto_submit(self: Arc<Self>) {
        match self.submit(SubmitTrigger::Timer).await {
            Ok(result) => {
                AUTO_SUBMITS_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!("Timed-out session {} submitted", result.session_id);
            }
            Err(CoordinatorError::SubmissionInFlight) => {
                AUTO_SUBMITS_TOTAL.with_label_values(&["deferred"]).inc();
                tracing::info!(
                    "Time expired while a submission was in flight; retrying if it fails"
                );
            }
            Err(e) => {
                AUTO_SUBMITS_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!("Automatic submission failed, learner must retry: {}", e);
            }
        }
    }

    /// Clears and returns the deferred flag set when the timer lost the race
    /// against a learner submission.
    fn take_deferred_auto_submit(&self) -> bool {
        std::mem::take(&mut self.lock().auto_submit_deferred)
    }

    pub(crate) fn heartbeat_payload(&self, now: Instant) -> Option<(String, HeartbeatRequest)> {
        let s = self.lock();
        let session_id = s.require_in_progress().ok()?;
        let elapsed = s.elapsed_seconds(now);
        let current_question = s.answers.current_question().map(str::to_string);

        Some((
            session_id,
            HeartbeatRequest {
                timestamp: Utc::now(),
                is_active: s.monitor.is_active(),
                metadata: s.monitor.heartbeat_metadata(elapsed, current_question),
            },
        ))
    }

    fn spawn_report(&self, session_id: String, event: SecurityEvent) {
        let api = self.api();
        let handle = tokio::spawn(async move {
            match api.report_security_event(&session_id, &event).await {
                Ok(()) => {
                    SECURITY_REPORTS_TOTAL.with_label_values(&["success"]).inc();
                }
                Err(e) => {
                    SECURITY_REPORTS_TOTAL.with_label_values(&["error"]).inc();
                    let err = CoordinatorError::SecurityReport(e);
                    tracing::warn!(
                        "Session {}: {} (type={}, count={})",
                        session_id,
                        err,
                        event.event_type,
                        event.metadata.count
                    );
                }
            }
        });

        let mut pending = self
            .pending_reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    async fn flush_reports(&self) {
        let pending = {
            let mut pending = self
                .pending_reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *pending)
        };
        if pending.is_empty() {
            return;
        }
        tracing::debug!("Waiting for {} security reports", pending.len());
        // Report failures are already logged inside each task.
        let _ = futures::future::join_all(pending).await;
    }

    async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmissionResult, CoordinatorError> {
        let (session_id, answers) = {
            let mut s = self.lock();
            let session_id = s.require_in_progress()?;
            if s.submission_in_flight {
                if matches!(trigger, SubmitTrigger::Timer) {
                    s.auto_submit_deferred = true;
                }
                return Err(CoordinatorError::SubmissionInFlight);
            }
            s.submission_in_flight = true;
            (session_id, s.answers.answers().clone())
        };

        tracing::info!(
            "Submitting session {} ({:?}) with {} answers",
            session_id,
            trigger,
            answers.len()
        );

        self.flush_reports().await;
        let result = self.state.api.submit_assessment(&session_id, &answers).await;

        let (outcome, runtime) = {
            let mut s = self.lock();
            s.submission_in_flight = false;
            match result {
                Ok(result) => {
                    let phase = if s.time_expired {
                        SessionPhase::TimedOut
                    } else {
                        SessionPhase::Submitted
                    };
                    s.set_phase(phase);
                    s.result = Some(result.clone());
                    s.auto_submit_deferred = false;
                    (Ok((result, phase)), s.take_runtime())
                }
                Err(e) => (Err(e), None),
            }
        };
        drop(runtime);

        match outcome {
            Ok((result, phase)) => {
                let label = if phase == SessionPhase::TimedOut {
                    "timed_out"
                } else {
                    "submitted"
                };
                SESSIONS_TOTAL.with_label_values(&[label]).inc();
                tracing::info!("Session {} finished as {:?}", session_id, phase);
                self.state.host.navigate(Route::Results {
                    session_id: session_id.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                SESSIONS_TOTAL.with_label_values(&["submit_failed"]).inc();
                tracing::warn!("Submission of session {} failed: {}", session_id, e);
                Err(CoordinatorError::Submission(e))
            }
        }
    }
}

/// Coordinates one proctored attempt in one tab.
///
/// Owns the session identity, the timers, the anti-cheat counters and the
/// staged answers. Dropping the coordinator tears down anything still running.
pub struct SessionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SessionCoordinator {
    pub fn new(state: AppState, assessment: AssessmentConfig) -> Result<Self, CoordinatorError> {
        assessment.validate()?;

        let monitor = SecurityMonitor::new(assessment.anti_cheat.clone());
        let answers = AnswerSheet::new(
            assessment.question_ids.clone(),
            assessment.allow_back_navigation,
        );
        let (timer_events, _) = broadcast::channel(TIMER_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                state,
                session: Mutex::new(SessionState {
                    phase: SessionPhase::NotStarted,
                    session: None,
                    started_instant: None,
                    timer: TimerState::new(assessment.time_limit_seconds),
                    time_expired: false,
                    submission_in_flight: false,
                    auto_submit_deferred: false,
                    monitor,
                    answers,
                    result: None,
                    runtime: None,
                }),
                assessment,
                timer_events,
                auto_submit_fired: AtomicBool::new(false),
                pending_reports: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Requests a session from the backend and moves to `InProgress`.
    ///
    /// With `require_fullscreen`, fullscreen is requested first; a denial sends
    /// the learner back to the assessment list and nothing is created server-side.
    pub async fn start_session(&self) -> Result<SessionHandle, CoordinatorError> {
        let inner = &self.inner;
        {
            let mut s = inner.lock();
            if s.phase != SessionPhase::NotStarted {
                return Err(CoordinatorError::InvalidState(s.phase));
            }
            s.phase = SessionPhase::Starting;
        }

        let assessment = &inner.assessment;
        let anti_cheat = &assessment.anti_cheat;
        let host = inner.state.host.clone();

        if anti_cheat.require_fullscreen {
            if let Err(reason) = host.request_fullscreen().await {
                tracing::warn!(
                    "Fullscreen denied for assessment {}: {}",
                    assessment.assessment_id,
                    reason
                );
                inner.lock().phase = SessionPhase::NotStarted;
                SESSIONS_TOTAL.with_label_values(&["fullscreen_denied"]).inc();
                host.navigate(Route::AssessmentList);
                return Err(CoordinatorError::FullscreenDenied(reason));
            }
        }

        let response = match inner
            .state
            .api
            .start_assessment(&assessment.assessment_id, anti_cheat)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    "Backend rejected session start for assessment {}: {}",
                    assessment.assessment_id,
                    e
                );
                if anti_cheat.require_fullscreen {
                    host.exit_fullscreen();
                }
                inner.lock().phase = SessionPhase::NotStarted;
                SESSIONS_TOTAL.with_label_values(&["start_rejected"]).inc();
                return Err(CoordinatorError::SessionStart(e));
            }
        };

        let started_at = Utc::now();
        let handle = SessionHandle {
            session_id: response.session_id.clone(),
            assessment_id: assessment.assessment_id.clone(),
            started_at,
        };

        {
            let mut s = inner.lock();
            let now = Instant::now();

            s.session = Some(AssessmentSession {
                session_id: response.session_id.clone(),
                assessment_id: assessment.assessment_id.clone(),
                started_at,
                status: SessionPhase::InProgress.status(),
            });
            s.started_instant = Some(now);
            s.timer = TimerState::new(assessment.time_limit_seconds);
            s.time_expired = false;
            s.auto_submit_deferred = false;
            s.monitor = SecurityMonitor::new(anti_cheat.clone());
            s.monitor.set_fullscreen_active(anti_cheat.require_fullscreen);
            s.answers = AnswerSheet::new(
                assessment.question_ids.clone(),
                assessment.allow_back_navigation,
            );
            s.set_phase(SessionPhase::InProgress);

            let listeners = ListenerTable::for_config(anti_cheat).register(host.clone());
            let tasks = vec![
                timer_service::spawn_ticker(Arc::downgrade(inner), inner.state.config.tick_interval()),
                timer_service::spawn_heartbeat(
                    Arc::downgrade(inner),
                    inner.state.config.heartbeat_interval(),
                ),
            ];
            s.runtime = Some(SessionRuntime::new(
                tasks,
                listeners,
                host,
                anti_cheat.require_fullscreen,
            ));
        }

        SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!(
            "Session {} started for assessment {} (time limit: {:?}s)",
            handle.session_id,
            handle.assessment_id,
            assessment.time_limit_seconds
        );

        Ok(handle)
    }

    /// Final submission. The learner must confirm; the timer path bypasses this.
    /// Only one submission may be in flight, and the session is not marked
    /// finished until the backend confirms.
    pub async fn submit_session(&self, confirm: bool) -> Result<SubmissionResult, CoordinatorError> {
        if !confirm {
            return Err(CoordinatorError::ConfirmationRequired);
        }
        let result = self.inner.submit(SubmitTrigger::Learner).await;
        // The deadline passed while this attempt was pending; submit on the timer's behalf.
        if result.is_err() && self.inner.take_deferred_auto_submit() {
            tracing::info!(
                "Resuming automatic submission for assessment {}",
                self.inner.assessment.assessment_id
            );
            tokio::spawn(Arc::clone(&self.inner).auto_submit());
        }
        result
    }

    /// The learner accepted the leave-page warning.
    pub fn confirm_leave(&self) {
        let runtime = {
            let mut s = self.inner.lock();
            if s.phase != SessionPhase::InProgress {
                return;
            }
            s.set_phase(SessionPhase::Abandoned);
            s.take_runtime()
        };
        drop(runtime);
        SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        tracing::warn!(
            "Learner left assessment {} before submitting",
            self.inner.assessment.assessment_id
        );
    }

    /// Feeds one browser signal through the listener table. Must be called
    /// from within a tokio runtime since reports are sent on spawned tasks.
    pub fn handle_event(&self, event: BrowserEvent) -> EventDisposition {
        let (outcome, session_id) = {
            let mut guard = self.inner.lock();
            let s = &mut *guard;
            if s.phase != SessionPhase::InProgress {
                return EventDisposition::Allow;
            }
            let (Some(runtime), Some(session_id)) = (s.runtime.as_ref(), s.session_id()) else {
                return EventDisposition::Allow;
            };
            let elapsed = s
                .started_instant
                .map(|start| elapsed_seconds(start, Instant::now()))
                .unwrap_or(0);
            (runtime.listeners.dispatch(&mut s.monitor, &event, elapsed), session_id)
        };

        if let Some(warning) = &outcome.warning {
            tracing::info!("Session {}: warning shown: {}", session_id, warning.message());
            self.inner.state.host.show_warning(warning);
        }
        if let Some(report) = outcome.report {
            self.inner.spawn_report(session_id, report);
        }

        outcome.disposition
    }

    /// Waits for security reports that are still being sent.
    pub async fn flush_security_reports(&self) {
        self.inner.flush_reports().await;
    }

    /// Stages an answer locally. Ignored once the time limit is reached, so a
    /// retried submission carries the answers as they stood at expiry.
    pub fn set_answer(&self, question_id: &str, value: AnswerValue) {
        let mut s = self.inner.lock();
        if s.time_expired {
            tracing::warn!("Ignoring answer for question {}: time limit reached", question_id);
            return;
        }
        s.answers.set_answer(question_id, value);
    }

    /// Sends one answer. On failure the staged value is kept for a retry.
    pub async fn submit_answer(
        &self,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<SubmitAnswerResponse, CoordinatorError> {
        let (session_id, request) = {
            let mut s = self.inner.lock();
            let session_id = s.require_in_progress()?;
            if s.time_expired {
                return Err(CoordinatorError::TimeExpired);
            }
            let request = s.answers.begin_submission(question_id, value, Instant::now())?;
            (session_id, request)
        };

        let api = self.inner.api();
        let retry = RetryConfig::answer_submission(self.inner.state.config.answer_retry_attempts);
        let result = retry_if(
            retry,
            || api.submit_answer(&session_id, &request),
            ApiError::is_transient,
        )
        .await;

        let mut s = self.inner.lock();
        match result {
            Ok(response) => {
                s.answers
                    .complete_submission(question_id, &response, Instant::now());
                ANSWERS_SUBMITTED_TOTAL.with_label_values(&["accepted"]).inc();
                tracing::debug!(
                    "Answer accepted: session={}, question={}, time_spent={}ms",
                    session_id,
                    question_id,
                    request.time_spent_ms
                );
                Ok(response)
            }
            Err(e) => {
                s.answers.fail_submission(question_id);
                ANSWERS_SUBMITTED_TOTAL.with_label_values(&["failed"]).inc();
                tracing::warn!(
                    "Answer submission failed: session={}, question={}: {}",
                    session_id,
                    question_id,
                    e
                );
                Err(CoordinatorError::AnswerSubmit {
                    question_id: question_id.to_string(),
                    source: e,
                })
            }
        }
    }

    pub fn next_question(&self) -> Option<String> {
        let mut s = self.inner.lock();
        s.answers.next(Instant::now()).map(str::to_string)
    }

    /// Rejected when the assessment disallows going back.
    pub fn previous_question(&self) -> Result<Option<String>, CoordinatorError> {
        let mut s = self.inner.lock();
        let current = s.answers.previous(Instant::now())?;
        Ok(current.map(str::to_string))
    }

    pub fn go_to_question(&self, question_id: &str) -> Result<(), CoordinatorError> {
        self.inner.lock().answers.go_to(question_id, Instant::now())
    }

    pub fn current_question(&self) -> Option<String> {
        self.inner
            .lock()
            .answers
            .current_question()
            .map(str::to_string)
    }

    pub fn answer(&self, question_id: &str) -> Option<AnswerValue> {
        self.inner.lock().answers.answer(question_id).cloned()
    }

    pub fn answers(&self) -> AnswerRecord {
        self.inner.lock().answers.answers().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    pub fn session(&self) -> Option<AssessmentSession> {
        self.inner.lock().session.clone()
    }

    pub fn result(&self) -> Option<SubmissionResult> {
        self.inner.lock().result.clone()
    }

    pub fn timer_state(&self) -> TimerState {
        self.inner.lock().timer
    }

    pub fn subscribe_timer(&self) -> broadcast::Receiver<TimerEvent> {
        self.inner.timer_events.subscribe()
    }

    pub fn security_counters(&self) -> SecurityCounters {
        self.inner.lock().monitor.counters().clone()
    }

    pub fn is_submission_in_flight(&self) -> bool {
        self.inner.lock().submission_in_flight
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        let runtime = self.inner.lock().take_runtime();
        drop(runtime);
    }
}
