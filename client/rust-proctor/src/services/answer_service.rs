use std::collections::HashSet;
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::CoordinatorError;
use crate::models::answer::{AdaptiveAdjustment, SubmitAnswerRequest, SubmitAnswerResponse};
use crate::models::{AnswerRecord, AnswerValue};
use crate::utils::time::elapsed_millis;

/// Learner position and staged answers. Not authoritative; the backend
/// re-validates and scores everything.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    question_ids: Vec<String>,
    current: usize,
    answers: AnswerRecord,
    in_flight: HashSet<String>,
    accepted: HashSet<String>,
    question_entered_at: Instant,
    allow_back_navigation: bool,
    last_adjustment: Option<AdaptiveAdjustment>,
}

impl AnswerSheet {
    pub fn new(question_ids: Vec<String>, allow_back_navigation: bool) -> Self {
        Self {
            question_ids,
            current: 0,
            answers: AnswerRecord::new(),
            in_flight: HashSet::new(),
            accepted: HashSet::new(),
            question_entered_at: Instant::now(),
            allow_back_navigation,
            last_adjustment: None,
        }
    }

    pub fn current_question(&self) -> Option<&str> {
        self.question_ids.get(self.current).map(String::as_str)
    }

    pub fn question_ids(&self) -> &[String] {
        &self.question_ids
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn is_in_flight(&self, question_id: &str) -> bool {
        self.in_flight.contains(question_id)
    }

    pub fn is_accepted(&self, question_id: &str) -> bool {
        self.accepted.contains(question_id)
    }

    pub fn last_adjustment(&self) -> Option<&AdaptiveAdjustment> {
        self.last_adjustment.as_ref()
    }

    /// Stages `value` locally. Always allowed; the last edit wins.
    pub fn set_answer(&mut self, question_id: &str, value: AnswerValue) {
        self.answers.insert(question_id.to_string(), value);
    }

    /// Stages the answer and marks the question as in flight, producing the
    /// request to send. A question already in flight is rejected.
    pub fn begin_submission(
        &mut self,
        question_id: &str,
        value: AnswerValue,
        now: Instant,
    ) -> Result<SubmitAnswerRequest, CoordinatorError> {
        if self.in_flight.contains(question_id) {
            return Err(CoordinatorError::AnswerInFlight(question_id.to_string()));
        }

        self.set_answer(question_id, value.clone());
        self.in_flight.insert(question_id.to_string());

        let time_spent_ms = if self.current_question() == Some(question_id) {
            elapsed_millis(self.question_entered_at, now)
        } else {
            0
        };

        Ok(SubmitAnswerRequest {
            question_id: question_id.to_string(),
            answer: value,
            time_spent_ms,
            idempotency_key: Uuid::new_v4().to_string(),
        })
    }

    /// Applies the backend's response. Navigation only moves if the learner is
    /// still on the question that was submitted.
    pub fn complete_submission(
        &mut self,
        question_id: &str,
        response: &SubmitAnswerResponse,
        now: Instant,
    ) {
        self.in_flight.remove(question_id);
        self.accepted.insert(question_id.to_string());

        if let Some(adjustment) = &response.adaptive_adjustment {
            tracing::info!(
                "Adaptive adjustment after question {}: {:?}",
                question_id,
                adjustment
            );
            self.last_adjustment = Some(adjustment.clone());
        }

        if self.current_question() != Some(question_id) {
            return;
        }

        match &response.next_question_id {
            Some(next_id) => {
                let index = match self.question_ids.iter().position(|q| q == next_id) {
                    Some(index) => index,
                    None => {
                        // Adaptive ordering may serve a question outside the initial list.
                        self.question_ids.push(next_id.clone());
                        self.question_ids.len() - 1
                    }
                };
                self.move_to(index, now);
            }
            None => {
                if self.current + 1 < self.question_ids.len() {
                    self.move_to(self.current + 1, now);
                }
            }
        }
    }

    /// The staged answer is kept so the learner can retry.
    pub fn fail_submission(&mut self, question_id: &str) {
        self.in_flight.remove(question_id);
    }

    pub fn next(&mut self, now: Instant) -> Option<&str> {
        if self.current + 1 < self.question_ids.len() {
            self.move_to(self.current + 1, now);
        }
        self.current_question()
    }

    pub fn previous(&mut self, now: Instant) -> Result<Option<&str>, CoordinatorError> {
        if !self.allow_back_navigation {
            return Err(CoordinatorError::BackNavigationDisabled);
        }
        if self.current > 0 {
            self.move_to(self.current - 1, now);
        }
        Ok(self.current_question())
    }

    pub fn go_to(&mut self, question_id: &str, now: Instant) -> Result<(), CoordinatorError> {
        let index = self
            .question_ids
            .iter()
            .position(|q| q == question_id)
            .ok_or_else(|| CoordinatorError::UnknownQuestion(question_id.to_string()))?;

        if index < self.current && !self.allow_back_navigation {
            return Err(CoordinatorError::BackNavigationDisabled);
        }
        self.move_to(index, now);
        Ok(())
    }

    fn move_to(&mut self, index: usize, now: Instant) {
        if index != self.current {
            self.current = index;
            self.question_entered_at = now;
        }
    }
}
