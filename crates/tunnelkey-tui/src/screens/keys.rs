//! Device key screen — public key display, generate/verify actions.
//!
//! Owns the [`KeyScreenController`] and holds the last render descriptor it
//! pushed. All controller events arrive as [`Action::Screen`] via the
//! bridge, so state mutation stays on the action loop.

use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use tokio::sync::mpsc::UnboundedSender;

use tunnelkey_core::{ActionButton, KeyManager, KeyScreenController, RenderState, Tone};

use crate::action::Action;
use crate::bridge::{ActionNotificationSink, ActionRenderSink, spawn_screen_bridge};
use crate::component::Component;
use crate::theme;
use crate::widgets::marquee::Marquee;

/// Device key management screen.
pub struct KeysScreen {
    manager: KeyManager,
    account_url: String,
    controller: Option<KeyScreenController>,
    view: RenderState,
    marquee: Marquee,
    throbber_state: throbber_widgets_tui::ThrobberState,
    focused: bool,
}

impl KeysScreen {
    pub fn new(manager: KeyManager, account_url: String) -> Self {
        Self {
            manager,
            account_url,
            controller: None,
            view: RenderState::default(),
            marquee: Marquee::new(74),
            throbber_state: throbber_widgets_tui::ThrobberState::default(),
            focused: false,
        }
    }

    /// Deactivate the controller. Called when the app loop ends.
    pub fn shutdown(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.deactivate();
        }
    }

    fn apply_view(&mut self, state: &RenderState) {
        let key_text = state.public_key.as_deref().unwrap_or("");
        self.marquee.set_text(key_text, Instant::now());
        self.view = state.clone();
    }

    // ── Rendering ────────────────────────────────────────────────

    fn message_line(&self) -> Line<'_> {
        let Some(kind) = self.view.message else {
            return Line::default();
        };
        let style = match kind.tone() {
            Tone::Success => theme::message_success(),
            Tone::Error => theme::message_error(),
            Tone::Info => theme::message_info(),
        };
        Line::from(Span::styled(kind.text(), style))
    }

    fn key_line(&self) -> Line<'_> {
        if self.view.public_key.is_some() {
            let style = if self.view.dimmed {
                theme::disabled()
            } else {
                theme::key_text()
            };
            Line::from(Span::styled(self.marquee.visible(), style))
        } else {
            Line::from(Span::styled("No key on this device", theme::message_info()))
        }
    }

    fn render_action_row(&self, frame: &mut Frame, area: Rect) {
        if self.view.spinner {
            let throbber = throbber_widgets_tui::Throbber::default()
                .label("Working\u{2026}")
                .throbber_style(Style::default().fg(theme::PURPLE));
            frame.render_stateful_widget(throbber, area, &mut self.throbber_state.clone());
            return;
        }

        let Some(button) = self.view.button else {
            return;
        };
        let (label, hint) = match button {
            ActionButton::Generate => ("[ Generate key ]", "g"),
            ActionButton::Verify => ("[ Verify key ]", "v"),
        };
        let (button_style, hint_style) = if self.view.button_enabled {
            (theme::button(), theme::key_hint())
        } else {
            (theme::disabled(), theme::disabled())
        };
        let line = Line::from(vec![
            Span::styled(label, button_style),
            Span::styled(format!("  ({hint} or Enter)"), hint_style),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn link_line(&self) -> Line<'_> {
        let style = if self.view.link_enabled {
            theme::key_hint()
        } else {
            theme::disabled()
        };
        Line::from(Span::styled(
            format!("Manage keys: {}", self.account_url),
            style,
        ))
    }
}

impl Component for KeysScreen {
    fn init(&mut self, action_tx: UnboundedSender<Action>) -> Result<()> {
        let mut controller = KeyScreenController::new(
            self.manager.clone(),
            Arc::new(ActionRenderSink(action_tx.clone())),
            Arc::new(ActionNotificationSink(action_tx.clone())),
        );
        let events = controller.activate();
        spawn_screen_bridge(events, action_tx);
        self.controller = Some(controller);
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Char('g') => Some(Action::RequestGenerate),
            KeyCode::Char('v') => Some(Action::RequestVerify),
            KeyCode::Enter => Some(Action::PrimaryAction),
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::Screen(event) => {
                if let Some(controller) = self.controller.as_mut() {
                    controller.handle_event(event.clone());
                }
            }

            Action::KeyViewUpdated(state) => {
                self.apply_view(state);
            }

            Action::RequestGenerate => {
                if self.view.button_enabled {
                    if let Some(controller) = self.controller.as_mut() {
                        controller.request_generate();
                    }
                }
            }

            Action::RequestVerify => {
                if self.view.button_enabled && self.view.button == Some(ActionButton::Verify) {
                    if let Some(controller) = self.controller.as_mut() {
                        controller.request_verify();
                    }
                }
            }

            Action::PrimaryAction => {
                return Ok(match self.view.button {
                    Some(ActionButton::Generate) => Some(Action::RequestGenerate),
                    Some(ActionButton::Verify) => Some(Action::RequestVerify),
                    None => None,
                });
            }

            Action::Tick => {
                if self.view.spinner {
                    self.throbber_state.calc_next();
                }
            }

            Action::Render => {
                self.marquee.advance(Instant::now());
            }

            Action::Resize(width, _) => {
                let content_width = usize::from(width.saturating_sub(6));
                self.marquee.set_width(content_width, Instant::now());
            }

            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let border = if self.focused {
            theme::border_focused()
        } else {
            theme::border_default()
        };
        let block = Block::default()
            .title(" Device Key ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::vertical([
            Constraint::Length(1), // spacer
            Constraint::Length(1), // key label
            Constraint::Length(1), // public key
            Constraint::Length(1), // spacer
            Constraint::Length(1), // status message
            Constraint::Length(1), // spacer
            Constraint::Length(1), // action button / spinner
            Constraint::Length(1), // spacer
            Constraint::Length(1), // account link
            Constraint::Min(0),
        ])
        .horizontal_margin(2)
        .split(inner);

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled("Public key", theme::message_info()))),
            rows[1],
        );
        frame.render_widget(Paragraph::new(self.key_line()), rows[2]);
        frame.render_widget(Paragraph::new(self.message_line()), rows[4]);
        self.render_action_row(frame, rows[6]);
        frame.render_widget(Paragraph::new(self.link_line()), rows[8]);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn id(&self) -> &str {
        "keys"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tunnelkey_core::{KeyStatus, PublicKey, TunnelState, derive_render};

    fn screen() -> KeysScreen {
        let service = Arc::new(NullService);
        KeysScreen::new(KeyManager::new(service), "https://example.net/account".into())
    }

    struct NullService;

    #[async_trait::async_trait]
    impl tunnelkey_core::KeyService for NullService {
        async fn generate_key(&self) -> Result<(), tunnelkey_core::CoreError> {
            Ok(())
        }
        async fn verify_key(&self) -> Result<(), tunnelkey_core::CoreError> {
            Ok(())
        }
        async fn key_status(&self) -> Result<KeyStatus, tunnelkey_core::CoreError> {
            Ok(KeyStatus::Absent)
        }
        async fn tunnel_state(&self) -> Result<TunnelState, tunnelkey_core::CoreError> {
            Ok(TunnelState::Disconnected)
        }
    }

    fn present_view() -> RenderState {
        derive_render(
            &KeyStatus::Present {
                public_key: PublicKey::from_bytes([1u8; 32]),
                verified: None,
            },
            TunnelState::Connected,
            None,
        )
    }

    #[test]
    fn primary_action_follows_the_offered_button() {
        let mut screen = screen();
        screen.apply_view(&present_view());

        let follow_up = screen.update(&Action::PrimaryAction).unwrap();
        assert!(matches!(follow_up, Some(Action::RequestVerify)));
    }

    #[test]
    fn primary_action_with_generate_button_requests_generate() {
        let mut screen = screen();
        let view = derive_render(&KeyStatus::Absent, TunnelState::Connected, None);
        screen.apply_view(&view);

        let follow_up = screen.update(&Action::PrimaryAction).unwrap();
        assert!(matches!(follow_up, Some(Action::RequestGenerate)));
    }

    #[test]
    fn applying_a_view_feeds_the_marquee() {
        let mut screen = screen();
        screen.apply_view(&present_view());
        let expected = PublicKey::from_bytes([1u8; 32]).to_base64();
        assert_eq!(screen.marquee.text(), expected);
    }
}
