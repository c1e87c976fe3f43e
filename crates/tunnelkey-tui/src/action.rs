//! All possible UI actions. Actions are the sole mechanism for state mutation.

use tunnelkey_core::{RenderState, ScreenEvent};

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

#[allow(dead_code)]
impl Notification {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Warning,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }
}

/// Every state transition in the TUI is expressed as an Action.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Key screen intents ────────────────────────────────────────
    RequestGenerate,
    RequestVerify,
    /// Enter — whatever the action button currently offers.
    PrimaryAction,

    // ── Controller plumbing ───────────────────────────────────────
    /// Forwarded controller event, applied on the action loop.
    Screen(ScreenEvent),
    /// Fresh render descriptor pushed by the controller.
    KeyViewUpdated(RenderState),

    // ── Daemon link status ────────────────────────────────────────
    Connected,
    Disconnected(String),

    // ── Notifications ─────────────────────────────────────────────
    Notify(Notification),
    DismissNotification,

    // ── Help ──────────────────────────────────────────────────────
    ToggleHelp,
}
