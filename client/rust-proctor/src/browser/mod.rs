//! Browser-level surface the coordinator depends on.
//!
//! The host UI owns the real DOM listeners. It forwards each signal to
//! [`SessionCoordinator::handle_event`](crate::services::session_service::SessionCoordinator::handle_event)
//! and honours the returned [`EventDisposition`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::anticheat::Warning;
use crate::models::Route;

pub mod listeners;

pub use listeners::{ListenerRegistration, ListenerTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    VisibilityChange,
    Blur,
    Focus,
    Copy,
    Paste,
    Cut,
    ContextMenu,
    KeyDown,
    MouseMove,
    FullscreenChange,
    BeforeUnload,
}

impl EventKind {
    /// DOM event name the host should listen for.
    pub fn dom_name(&self) -> &'static str {
        match self {
            EventKind::VisibilityChange => "visibilitychange",
            EventKind::Blur => "blur",
            EventKind::Focus => "focus",
            EventKind::Copy => "copy",
            EventKind::Paste => "paste",
            EventKind::Cut => "cut",
            EventKind::ContextMenu => "contextmenu",
            EventKind::KeyDown => "keydown",
            EventKind::MouseMove => "mousemove",
            EventKind::FullscreenChange => "fullscreenchange",
            EventKind::BeforeUnload => "beforeunload",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyCombo {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            shift: true,
            ..Self::default()
        }
    }

    /// Shortcuts that open or drive the developer tools.
    pub fn is_devtools_shortcut(&self) -> bool {
        let key = self.key.to_ascii_uppercase();
        if key == "F12" {
            return true;
        }
        let inspector_key = matches!(key.as_str(), "I" | "J" | "C");
        (self.ctrl && self.shift && inspector_key)
            || (self.meta && self.alt && inspector_key)
            || ((self.ctrl || self.meta) && !self.shift && !self.alt && key == "U")
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.meta {
            parts.push("Meta");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(&self.key);
        parts.join("+")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    VisibilityChange { hidden: bool },
    Blur,
    Focus,
    Copy,
    Paste,
    Cut,
    ContextMenu,
    KeyDown(KeyCombo),
    MouseMove,
    FullscreenChange { active: bool },
    BeforeUnload,
}

impl BrowserEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BrowserEvent::VisibilityChange { .. } => EventKind::VisibilityChange,
            BrowserEvent::Blur => EventKind::Blur,
            BrowserEvent::Focus => EventKind::Focus,
            BrowserEvent::Copy => EventKind::Copy,
            BrowserEvent::Paste => EventKind::Paste,
            BrowserEvent::Cut => EventKind::Cut,
            BrowserEvent::ContextMenu => EventKind::ContextMenu,
            BrowserEvent::KeyDown(_) => EventKind::KeyDown,
            BrowserEvent::MouseMove => EventKind::MouseMove,
            BrowserEvent::FullscreenChange { .. } => EventKind::FullscreenChange,
            BrowserEvent::BeforeUnload => EventKind::BeforeUnload,
        }
    }
}

/// What the host should do with the native event after the coordinator saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Allow,
    /// Call `preventDefault()`; for `beforeunload` this shows the leave-page prompt.
    PreventDefault,
}

#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Ask the browser to enter fullscreen. `Err` carries the denial reason.
    async fn request_fullscreen(&self) -> Result<(), String>;

    fn exit_fullscreen(&self);

    /// Install DOM listeners for every kind in `kinds`.
    fn attach_listeners(&self, kinds: &[EventKind]);

    /// Remove DOM listeners for every kind in `kinds`.
    fn detach_listeners(&self, kinds: &[EventKind]);

    fn show_warning(&self, warning: &Warning);

    fn navigate(&self, route: Route);
}
