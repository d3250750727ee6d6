use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimerTick {
    pub session_id: String,
    pub elapsed_seconds: u64,
    pub remaining_seconds: Option<u64>,
    pub total_seconds: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimeExpired {
    pub session_id: String,
    pub elapsed_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

impl TimerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::TimerTick(_) => "timer-tick",
            TimerEvent::TimeExpired(_) => "time-expired",
        }
    }
}

/// Elapsed time since session start. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerState {
    pub elapsed_seconds: u64,
    pub total_seconds: Option<u64>,
}

impl TimerState {
    pub fn new(total_seconds: Option<u64>) -> Self {
        Self {
            elapsed_seconds: 0,
            total_seconds,
        }
    }

    /// Records a new reading, ignoring anything older than what was already seen.
    pub fn advance_to(&mut self, elapsed_seconds: u64) {
        self.elapsed_seconds = self.elapsed_seconds.max(elapsed_seconds);
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.total_seconds
            .map(|total| total.saturating_sub(self.elapsed_seconds))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.total_seconds, Some(total) if self.elapsed_seconds >= total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_never_decreases() {
        let mut timer = TimerState::new(Some(60));
        timer.advance_to(10);
        timer.advance_to(7);
        assert_eq!(timer.elapsed_seconds, 10);
        assert_eq!(timer.remaining_seconds(), Some(50));
    }

    #[test]
    fn expires_at_limit_not_before() {
        let mut timer = TimerState::new(Some(600));
        timer.advance_to(599);
        assert!(!timer.is_expired());
        timer.advance_to(600);
        assert!(timer.is_expired());
        assert_eq!(timer.remaining_seconds(), Some(0));
    }

    #[test]
    fn untimed_session_never_expires() {
        let mut timer = TimerState::new(None);
        timer.advance_to(u64::MAX);
        assert!(!timer.is_expired());
        assert_eq!(timer.remaining_seconds(), None);
    }

    #[test]
    fn event_serializes_with_kebab_tag() {
        let event = TimerEvent::TimeExpired(TimeExpired {
            session_id: "s-1".to_string(),
            elapsed_seconds: 600,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "time-expired");
        assert_eq!(event.event_name(), "time-expired");
    }
}
