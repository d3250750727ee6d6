use chrono::Utc;

use crate::browser::{BrowserEvent, EventDisposition};
use crate::metrics::SECURITY_EVENTS_TOTAL;
use crate::models::answer::HeartbeatMetadata;
use crate::models::anticheat::{
    AntiCheatConfig, SecurityCounters, SecurityEvent, SecurityEventMetadata, SecurityEventType,
    Warning,
};

/// Signature shared by every entry in the listener table.
pub type Handler = fn(&mut SecurityMonitor, &BrowserEvent, u64) -> MonitorOutcome;

/// Result of feeding one browser event through the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOutcome {
    pub disposition: EventDisposition,
    pub report: Option<SecurityEvent>,
    pub warning: Option<Warning>,
}

impl MonitorOutcome {
    pub fn allow() -> Self {
        Self {
            disposition: EventDisposition::Allow,
            report: None,
            warning: None,
        }
    }

    fn prevent() -> Self {
        Self {
            disposition: EventDisposition::PreventDefault,
            ..Self::allow()
        }
    }
}

/// Session-scoped anti-cheat state. Created on session start and dropped with
/// the session, so counters never leak across attempts.
#[derive(Debug, Clone)]
pub struct SecurityMonitor {
    config: AntiCheatConfig,
    counters: SecurityCounters,
    page_visible: bool,
    window_focused: bool,
    fullscreen_active: bool,
}

impl SecurityMonitor {
    pub fn new(config: AntiCheatConfig) -> Self {
        Self {
            config,
            counters: SecurityCounters::default(),
            page_visible: true,
            window_focused: true,
            fullscreen_active: false,
        }
    }

    pub fn counters(&self) -> &SecurityCounters {
        &self.counters
    }

    /// Learner is looking at the assessment right now.
    pub fn is_active(&self) -> bool {
        self.page_visible && self.window_focused
    }

    pub fn set_fullscreen_active(&mut self, active: bool) {
        self.fullscreen_active = active;
    }

    pub fn is_fullscreen_active(&self) -> bool {
        self.fullscreen_active
    }

    pub fn heartbeat_metadata(
        &self,
        elapsed_seconds: u64,
        current_question_id: Option<String>,
    ) -> HeartbeatMetadata {
        HeartbeatMetadata {
            tab_switches: self.counters.get(SecurityEventType::TabSwitch),
            keystrokes: self.counters.keystrokes,
            mouse_movements: self.counters.mouse_movements,
            elapsed_seconds,
            current_question_id,
        }
    }

    /// Counts the event, snapshots the counter into a reportable event, and
    /// works out which warning (if any) applies.
    fn record(
        &mut self,
        event_type: SecurityEventType,
        elapsed_seconds: u64,
        detail: Option<String>,
    ) -> (SecurityEvent, Option<Warning>) {
        let count = self.counters.increment(event_type);
        SECURITY_EVENTS_TOTAL
            .with_label_values(&[event_type.as_str()])
            .inc();

        tracing::info!(
            "Security event observed: type={}, count={}, elapsed={}s",
            event_type,
            count,
            elapsed_seconds
        );

        let warning = if self.config.auto_flag_high_risk && event_type.is_high_risk() {
            Some(Warning::HighRisk { event_type })
        } else if event_type == SecurityEventType::TabSwitch && count > self.config.max_tab_switches
        {
            Some(Warning::TabSwitchLimit {
                count,
                max: self.config.max_tab_switches,
            })
        } else {
            None
        };

        let event = SecurityEvent {
            event_type,
            timestamp: Utc::now(),
            metadata: SecurityEventMetadata {
                count,
                elapsed_seconds,
                detail,
            },
        };

        (event, warning)
    }

    /// Same as `record`, but for signals whose default action is blocked.
    fn record_blocked(
        &mut self,
        event_type: SecurityEventType,
        elapsed_seconds: u64,
        detail: Option<String>,
    ) -> MonitorOutcome {
        let (event, warning) = self.record(event_type, elapsed_seconds, detail);
        MonitorOutcome {
            disposition: EventDisposition::PreventDefault,
            report: Some(event),
            warning: warning.or(Some(Warning::ActionBlocked { event_type })),
        }
    }
}

pub fn on_visibility_change(
    monitor: &mut SecurityMonitor,
    event: &BrowserEvent,
    elapsed_seconds: u64,
) -> MonitorOutcome {
    let BrowserEvent::VisibilityChange { hidden } = event else {
        return MonitorOutcome::allow();
    };

    // Only the visible -> hidden edge counts as a switch.
    if !*hidden {
        monitor.page_visible = true;
        return MonitorOutcome::allow();
    }
    if !monitor.page_visible {
        return MonitorOutcome::allow();
    }
    monitor.page_visible = false;

    let (report, warning) = monitor.record(SecurityEventType::TabSwitch, elapsed_seconds, None);
    MonitorOutcome {
        disposition: EventDisposition::Allow,
        report: Some(report),
        warning,
    }
}

pub fn on_blur(
    monitor: &mut SecurityMonitor,
    _event: &BrowserEvent,
    elapsed_seconds: u64,
) -> MonitorOutcome {
    if !monitor.window_focused {
        return MonitorOutcome::allow();
    }
    monitor.window_focused = false;

    let (report, warning) = monitor.record(SecurityEventType::WindowBlur, elapsed_seconds, None);
    MonitorOutcome {
        disposition: EventDisposition::Allow,
        report: Some(report),
        warning,
    }
}

pub fn on_focus(
    monitor: &mut SecurityMonitor,
    _event: &BrowserEvent,
    _elapsed_seconds: u64,
) -> MonitorOutcome {
    monitor.window_focused = true;
    MonitorOutcome::allow()
}

pub fn on_clipboard(
    monitor: &mut SecurityMonitor,
    event: &BrowserEvent,
    elapsed_seconds: u64,
) -> MonitorOutcome {
    let event_type = match event {
        BrowserEvent::Copy => SecurityEventType::CopyAttempt,
        BrowserEvent::Paste => SecurityEventType::PasteAttempt,
        BrowserEvent::Cut => SecurityEventType::CutAttempt,
        _ => return MonitorOutcome::allow(),
    };
    monitor.record_blocked(event_type, elapsed_seconds, None)
}

pub fn on_context_menu(
    monitor: &mut SecurityMonitor,
    _event: &BrowserEvent,
    elapsed_seconds: u64,
) -> MonitorOutcome {
    monitor.record_blocked(SecurityEventType::RightClick, elapsed_seconds, None)
}

pub fn on_key_down(
    monitor: &mut SecurityMonitor,
    event: &BrowserEvent,
    elapsed_seconds: u64,
) -> MonitorOutcome {
    let BrowserEvent::KeyDown(combo) = event else {
        return MonitorOutcome::allow();
    };

    monitor.counters.keystrokes += 1;

    if combo.is_devtools_shortcut() {
        return monitor.record_blocked(
            SecurityEventType::SuspiciousKeyCombo,
            elapsed_seconds,
            Some(combo.describe()),
        );
    }

    MonitorOutcome::allow()
}

pub fn on_mouse_move(
    monitor: &mut SecurityMonitor,
    _event: &BrowserEvent,
    _elapsed_seconds: u64,
) -> MonitorOutcome {
    monitor.counters.mouse_movements += 1;
    MonitorOutcome::allow()
}

pub fn on_fullscreen_change(
    monitor: &mut SecurityMonitor,
    event: &BrowserEvent,
    elapsed_seconds: u64,
) -> MonitorOutcome {
    let BrowserEvent::FullscreenChange { active } = event else {
        return MonitorOutcome::allow();
    };

    let was_active = monitor.fullscreen_active;
    monitor.fullscreen_active = *active;

    if *active || !was_active {
        return MonitorOutcome::allow();
    }

    // Exiting fullscreen is reported and the learner is asked to go back; the
    // session carries on.
    let (report, _) = monitor.record(SecurityEventType::FullscreenExit, elapsed_seconds, None);
    MonitorOutcome {
        disposition: EventDisposition::Allow,
        report: Some(report),
        warning: Some(Warning::FullscreenRequired),
    }
}

pub fn on_before_unload(
    _monitor: &mut SecurityMonitor,
    _event: &BrowserEvent,
    _elapsed_seconds: u64,
) -> MonitorOutcome {
    MonitorOutcome::prevent()
}
