use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BrowserEvent, BrowserHost, EventKind};
use crate::models::anticheat::AntiCheatConfig;
use crate::services::anticheat_service::{self as monitor, Handler, MonitorOutcome, SecurityMonitor};

/// Event kind to handler mapping for one session.
///
/// Kinds whose option is switched off have no entry, so the host never
/// listens for them and stray events fall through as `Allow`.
#[derive(Clone)]
pub struct ListenerTable {
    handlers: BTreeMap<EventKind, Handler>,
}

impl ListenerTable {
    pub fn for_config(config: &AntiCheatConfig) -> Self {
        let mut handlers: BTreeMap<EventKind, Handler> = BTreeMap::new();

        handlers.insert(EventKind::BeforeUnload, monitor::on_before_unload);

        if config.detect_tab_switching {
            handlers.insert(EventKind::VisibilityChange, monitor::on_visibility_change);
            handlers.insert(EventKind::Blur, monitor::on_blur);
            handlers.insert(EventKind::Focus, monitor::on_focus);
        }
        if config.block_copy_paste {
            handlers.insert(EventKind::Copy, monitor::on_clipboard);
            handlers.insert(EventKind::Paste, monitor::on_clipboard);
            handlers.insert(EventKind::Cut, monitor::on_clipboard);
        }
        if config.block_right_click {
            handlers.insert(EventKind::ContextMenu, monitor::on_context_menu);
        }
        if config.monitor_keystrokes {
            handlers.insert(EventKind::KeyDown, monitor::on_key_down);
        }
        if config.monitor_mouse_movement {
            handlers.insert(EventKind::MouseMove, monitor::on_mouse_move);
        }
        if config.require_fullscreen {
            handlers.insert(EventKind::FullscreenChange, monitor::on_fullscreen_change);
        }

        Self { handlers }
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Attaches every listener in one call. The returned guard detaches the
    /// same set when dropped.
    pub fn register(self, host: Arc<dyn BrowserHost>) -> ListenerRegistration {
        let kinds = self.kinds();
        host.attach_listeners(&kinds);
        tracing::debug!(
            "Attached {} browser listeners: {}",
            kinds.len(),
            dom_names(&kinds).join(", ")
        );
        ListenerRegistration {
            table: self,
            kinds,
            host,
        }
    }
}

fn dom_names(kinds: &[EventKind]) -> Vec<&'static str> {
    kinds.iter().map(EventKind::dom_name).collect()
}

pub struct ListenerRegistration {
    table: ListenerTable,
    kinds: Vec<EventKind>,
    host: Arc<dyn BrowserHost>,
}

impl ListenerRegistration {
    pub fn dispatch(
        &self,
        monitor: &mut SecurityMonitor,
        event: &BrowserEvent,
        elapsed_seconds: u64,
    ) -> MonitorOutcome {
        match self.table.handlers.get(&event.kind()) {
            Some(handler) => handler(monitor, event, elapsed_seconds),
            None => MonitorOutcome::allow(),
        }
    }

    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.host.detach_listeners(&self.kinds);
        tracing::debug!("Detached {} browser listeners", self.kinds.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_follows_config() {
        let table = ListenerTable::for_config(&AntiCheatConfig {
            detect_tab_switching: false,
            ..AntiCheatConfig::default()
        });
        assert_eq!(table.kinds(), vec![EventKind::BeforeUnload]);

        let table = ListenerTable::for_config(&AntiCheatConfig {
            require_fullscreen: true,
            detect_tab_switching: true,
            block_copy_paste: true,
            block_right_click: true,
            monitor_keystrokes: true,
            monitor_mouse_movement: true,
            ..AntiCheatConfig::default()
        });
        assert_eq!(table.kinds().len(), 11);
        assert!(table.handles(EventKind::ContextMenu));
        assert!(table.handles(EventKind::FullscreenChange));
    }

    #[test]
    fn dom_names_match_browser_events() {
        let table = ListenerTable::for_config(&AntiCheatConfig {
            require_fullscreen: true,
            block_right_click: true,
            ..AntiCheatConfig::default()
        });
        assert_eq!(
            dom_names(&table.kinds()),
            vec![
                "visibilitychange",
                "blur",
                "focus",
                "contextmenu",
                "fullscreenchange",
                "beforeunload"
            ]
        );
    }
}
