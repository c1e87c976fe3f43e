//! Palette and semantic styling for the TUI.

use ratatui::style::{Color, Modifier, Style};

// ── Core Palette ──────────────────────────────────────────────────────

pub const PURPLE: Color = Color::Rgb(189, 147, 249); // #bd93f9
pub const CYAN: Color = Color::Rgb(139, 233, 253); // #8be9fd
pub const YELLOW: Color = Color::Rgb(241, 250, 140); // #f1fa8c
pub const GREEN: Color = Color::Rgb(80, 250, 123); // #50fa7b
pub const RED: Color = Color::Rgb(255, 85, 85); // #ff5555

// ── Extended Palette ──────────────────────────────────────────────────

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_DARK: Color = Color::Rgb(30, 31, 41); // #1e1f29

// ── Semantic Styles ───────────────────────────────────────────────────

/// Title text for blocks/panels.
pub fn title_style() -> Style {
    Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
}

/// Border for a focused panel.
pub fn border_focused() -> Style {
    Style::default().fg(PURPLE)
}

/// Border for an unfocused panel.
pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// The public key line.
pub fn key_text() -> Style {
    Style::default().fg(CYAN)
}

/// Success status message.
pub fn message_success() -> Style {
    Style::default().fg(GREEN)
}

/// Error status message.
pub fn message_error() -> Style {
    Style::default().fg(RED)
}

/// Neutral status message.
pub fn message_info() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// The action button.
pub fn button() -> Style {
    Style::default().fg(PURPLE).add_modifier(Modifier::BOLD)
}

/// Disabled (dimmed) content in the blocked tunnel state.
pub fn disabled() -> Style {
    Style::default().fg(BORDER_GRAY).add_modifier(Modifier::DIM)
}

/// Key hint text (e.g., "q quit  ? help").
pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Key hint key character.
pub fn key_hint_key() -> Style {
    Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
}
