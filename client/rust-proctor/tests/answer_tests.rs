mod common;

use std::time::Duration;

use assessment_proctor::models::answer::{AdaptiveAdjustment, SubmitAnswerResponse};
use assessment_proctor::models::anticheat::AntiCheatConfig;
use assessment_proctor::models::SessionPhase;
use assessment_proctor::{ApiError, CoordinatorError};
use common::{assessment, coordinator, FakeApi, FakeHost};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn test_staged_answer_visible_while_submission_pending() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    *api.answer_delay.lock().unwrap() = Some(Duration::from_secs(2));
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    let (result, ()) = tokio::join!(coordinator.submit_answer("q1", json!("A")), async {
        assert_eq!(coordinator.answer("q1"), Some(json!("A")));
        coordinator.set_answer("q1", json!("B"));
    });

    result.unwrap();
    // Last local edit wins over the value that was in flight.
    assert_eq!(coordinator.answer("q1"), Some(json!("B")));
    assert_eq!(api.answer_requests()[0].answer, json!("A"));
    assert_eq!(coordinator.current_question().as_deref(), Some("q2"));
}

#[tokio::test(start_paused = true)]
async fn test_time_spent_measured_on_current_question() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    coordinator.submit_answer("q1", json!(1)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;
    coordinator.submit_answer("q2", json!(2)).await.unwrap();

    let requests = api.answer_requests();
    assert_eq!(requests[0].time_spent_ms, 12_000);
    assert_eq!(requests[1].time_spent_ms, 4_000);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retry_with_same_idempotency_key() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    {
        let mut failures = api.answer_failures.lock().unwrap();
        failures.push_back(ApiError::Network("connection reset".to_string()));
        failures.push_back(ApiError::Timeout(10));
    }
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    coordinator.submit_answer("q1", json!("A")).await.unwrap();

    let requests = api.answer_requests();
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|r| r.idempotency_key == requests[0].idempotency_key));
    assert_eq!(coordinator.current_question().as_deref(), Some("q2"));
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_after_configured_attempts() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    {
        let mut failures = api.answer_failures.lock().unwrap();
        for _ in 0..5 {
            failures.push_back(ApiError::Rejected {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
    }
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    let err = coordinator.submit_answer("q1", json!("A")).await.unwrap_err();

    assert!(matches!(err, CoordinatorError::AnswerSubmit { ref question_id, .. } if question_id == "q1"));
    assert_eq!(api.answer_requests().len(), 3);
}

#[tokio::test]
async fn test_rejected_answer_is_kept_for_retry() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    api.answer_failures.lock().unwrap().push_back(ApiError::Rejected {
        status: 422,
        message: "answer format invalid".to_string(),
    });
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    let err = coordinator.submit_answer("q1", json!("A")).await.unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::AnswerSubmit {
            source: ApiError::Rejected { status: 422, .. },
            ..
        }
    ));
    assert_eq!(api.answer_requests().len(), 1);
    assert_eq!(coordinator.answer("q1"), Some(json!("A")));
    assert_eq!(coordinator.current_question().as_deref(), Some("q1"));
    assert_eq!(coordinator.phase(), SessionPhase::InProgress);

    coordinator.submit_answer("q1", json!("A")).await.unwrap();
    assert_eq!(coordinator.current_question().as_deref(), Some("q2"));
}

#[tokio::test(start_paused = true)]
async fn test_same_question_cannot_be_submitted_twice_concurrently() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    *api.answer_delay.lock().unwrap() = Some(Duration::from_secs(1));
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    let (first, second) = tokio::join!(
        coordinator.submit_answer("q1", json!("A")),
        coordinator.submit_answer("q1", json!("B"))
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(CoordinatorError::AnswerInFlight(q)) if q == "q1"));
    assert_eq!(api.answer_requests().len(), 1);
}

#[tokio::test]
async fn test_back_navigation_disabled() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    assert_eq!(coordinator.next_question().as_deref(), Some("q2"));
    assert!(matches!(
        coordinator.previous_question(),
        Err(CoordinatorError::BackNavigationDisabled)
    ));
    assert!(matches!(
        coordinator.go_to_question("q1"),
        Err(CoordinatorError::BackNavigationDisabled)
    ));
    assert!(matches!(
        coordinator.go_to_question("q9"),
        Err(CoordinatorError::UnknownQuestion(_))
    ));

    coordinator.go_to_question("q3").unwrap();
    assert_eq!(coordinator.current_question().as_deref(), Some("q3"));
    // Stays on the last question.
    assert_eq!(coordinator.next_question().as_deref(), Some("q3"));
}

#[tokio::test]
async fn test_back_navigation_allowed() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    let mut config = assessment(3, None, AntiCheatConfig::default());
    config.allow_back_navigation = true;
    let coordinator = coordinator(&api, &host, config);
    coordinator.start_session().await.unwrap();

    coordinator.go_to_question("q3").unwrap();
    assert_eq!(coordinator.previous_question().unwrap().as_deref(), Some("q2"));
    coordinator.go_to_question("q1").unwrap();
    assert_eq!(coordinator.previous_question().unwrap().as_deref(), Some("q1"));
}

#[tokio::test]
async fn test_adaptive_response_picks_next_question() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    {
        let mut responses = api.answer_responses.lock().unwrap();
        responses.push_back(SubmitAnswerResponse {
            next_question_id: Some("q3".to_string()),
            adaptive_adjustment: Some(AdaptiveAdjustment {
                difficulty: Some("hard".to_string()),
                reason: Some("streak".to_string()),
            }),
        });
        responses.push_back(SubmitAnswerResponse {
            next_question_id: Some("bonus-1".to_string()),
            adaptive_adjustment: None,
        });
    }
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    let response = coordinator.submit_answer("q1", json!("A")).await.unwrap();
    assert_eq!(
        response.adaptive_adjustment.and_then(|a| a.difficulty).as_deref(),
        Some("hard")
    );
    assert_eq!(coordinator.current_question().as_deref(), Some("q3"));

    coordinator.submit_answer("q3", json!("C")).await.unwrap();
    assert_eq!(coordinator.current_question().as_deref(), Some("bonus-1"));
}

#[tokio::test]
async fn test_late_acceptance_does_not_move_learner() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    let coordinator = coordinator(&api, &host, assessment(4, None, AntiCheatConfig::default()));
    coordinator.start_session().await.unwrap();

    coordinator.go_to_question("q3").unwrap();
    coordinator.submit_answer("q1", json!("A")).await.unwrap();

    assert_eq!(coordinator.current_question().as_deref(), Some("q3"));
    assert_eq!(api.answer_requests()[0].time_spent_ms, 0);
}

#[tokio::test]
async fn test_submit_answer_before_start_is_rejected() {
    let api = FakeApi::new();
    let host = FakeHost::new();
    let coordinator = coordinator(&api, &host, assessment(3, None, AntiCheatConfig::default()));

    let err = coordinator.submit_answer("q1", json!("A")).await.unwrap_err();

    assert!(matches!(err, CoordinatorError::InvalidState(SessionPhase::NotStarted)));
    assert!(api.answer_requests().is_empty());

    // Local staging is always allowed.
    coordinator.set_answer("q1", json!("A"));
    assert_eq!(coordinator.answer("q1"), Some(json!("A")));
}
