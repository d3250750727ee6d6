use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use validator::Validate;

/// Anti-cheat options attached to an assessment. Every monitored signal is
/// switched on or off independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct AntiCheatConfig {
    pub require_fullscreen: bool,
    pub detect_tab_switching: bool,
    #[validate(range(max = 1000))]
    pub max_tab_switches: u32,
    pub block_copy_paste: bool,
    pub block_right_click: bool,
    pub monitor_keystrokes: bool,
    pub monitor_mouse_movement: bool,
    pub auto_flag_high_risk: bool,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            require_fullscreen: false,
            detect_tab_switching: true,
            max_tab_switches: 3,
            block_copy_paste: false,
            block_right_click: false,
            monitor_keystrokes: false,
            monitor_mouse_movement: false,
            auto_flag_high_risk: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    TabSwitch,
    WindowBlur,
    CopyAttempt,
    PasteAttempt,
    CutAttempt,
    RightClick,
    SuspiciousKeyCombo,
    FullscreenExit,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::TabSwitch => "tab_switch",
            SecurityEventType::WindowBlur => "window_blur",
            SecurityEventType::CopyAttempt => "copy_attempt",
            SecurityEventType::PasteAttempt => "paste_attempt",
            SecurityEventType::CutAttempt => "cut_attempt",
            SecurityEventType::RightClick => "right_click",
            SecurityEventType::SuspiciousKeyCombo => "suspicious_key_combo",
            SecurityEventType::FullscreenExit => "fullscreen_exit",
        }
    }

    /// Event types that escalate the warning when `auto_flag_high_risk` is set.
    pub fn is_high_risk(&self) -> bool {
        matches!(
            self,
            SecurityEventType::CopyAttempt
                | SecurityEventType::PasteAttempt
                | SecurityEventType::CutAttempt
                | SecurityEventType::SuspiciousKeyCombo
        )
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation reported to the backend. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub timestamp: DateTime<Utc>,
    pub metadata: SecurityEventMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEventMetadata {
    /// Counter value for this event type at the moment of the observation.
    pub count: u32,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SecurityEventRequest<'a> {
    pub event_type: SecurityEventType,
    pub timestamp: DateTime<Utc>,
    pub metadata: &'a SecurityEventMetadata,
}

/// In-memory counters for one session.
#[derive(Debug, Clone, Default)]
pub struct SecurityCounters {
    by_type: HashMap<SecurityEventType, u32>,
    pub keystrokes: u64,
    pub mouse_movements: u64,
}

impl SecurityCounters {
    pub fn increment(&mut self, event_type: SecurityEventType) -> u32 {
        let count = self.by_type.entry(event_type).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, event_type: SecurityEventType) -> u32 {
        self.by_type.get(&event_type).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.by_type.values().sum()
    }
}

/// Advisory messages surfaced to the learner. None of them block the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    TabSwitchLimit { count: u32, max: u32 },
    HighRisk { event_type: SecurityEventType },
    FullscreenRequired,
    ActionBlocked { event_type: SecurityEventType },
}

impl Warning {
    pub fn message(&self) -> String {
        match self {
            Warning::TabSwitchLimit { count, max } => format!(
                "You have left the assessment tab {} times (limit {}). Further switches are recorded.",
                count, max
            ),
            Warning::HighRisk { event_type } => format!(
                "Suspicious activity ({}) was detected. This session may be flagged for review.",
                event_type
            ),
            Warning::FullscreenRequired => {
                "This assessment must be taken in fullscreen. Please re-enter fullscreen mode."
                    .to_string()
            }
            Warning::ActionBlocked { event_type } => {
                format!("This action is not allowed during the assessment ({}).", event_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_camel_case_with_defaults() {
        let config: AntiCheatConfig =
            serde_json::from_str(r#"{"requireFullscreen":true,"maxTabSwitches":5}"#).unwrap();
        assert!(config.require_fullscreen);
        assert_eq!(config.max_tab_switches, 5);
        assert!(config.detect_tab_switching);
        assert!(!config.block_copy_paste);
    }

    #[test]
    fn counters_are_per_type() {
        let mut counters = SecurityCounters::default();
        assert_eq!(counters.increment(SecurityEventType::TabSwitch), 1);
        assert_eq!(counters.increment(SecurityEventType::TabSwitch), 2);
        assert_eq!(counters.increment(SecurityEventType::CopyAttempt), 1);
        assert_eq!(counters.get(SecurityEventType::TabSwitch), 2);
        assert_eq!(counters.get(SecurityEventType::RightClick), 0);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn warning_messages_name_the_problem() {
        let limit = Warning::TabSwitchLimit { count: 4, max: 3 };
        assert!(limit.message().contains("4 times (limit 3)"));

        let blocked = Warning::ActionBlocked {
            event_type: SecurityEventType::CopyAttempt,
        };
        assert!(blocked.message().contains(&SecurityEventType::CopyAttempt.to_string()));
        assert!(Warning::FullscreenRequired.message().contains("fullscreen"));
    }

    #[test]
    fn high_risk_set() {
        assert!(SecurityEventType::CopyAttempt.is_high_risk());
        assert!(SecurityEventType::SuspiciousKeyCombo.is_high_risk());
        assert!(!SecurityEventType::TabSwitch.is_high_risk());
        assert!(!SecurityEventType::FullscreenExit.is_high_risk());
    }
}
