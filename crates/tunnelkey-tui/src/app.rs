//! Application core — event loop, action dispatch, overlays.

use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tunnelkey_core::{KeyManager, ScreenEvent, TunnelState};

use crate::action::{Action, Notification, NotificationLevel};
use crate::component::Component;
use crate::event::{Event, EventReader};
use crate::screens::keys::KeysScreen;
use crate::theme;
use crate::tui::Tui;

/// Daemon link status as seen by the TUI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

/// Top-level application state and event loop.
pub struct App {
    /// The single key management screen.
    screen: KeysScreen,
    /// Whether the app should keep running.
    running: bool,
    /// Daemon link indicator.
    link_status: LinkStatus,
    /// Latest tunnel state, for the status bar.
    tunnel_state: TunnelState,
    /// Help overlay visibility.
    help_visible: bool,
    /// Terminal size for responsive layout.
    terminal_size: (u16, u16),
    /// Action sender — components can dispatch actions through this.
    action_tx: mpsc::UnboundedSender<Action>,
    /// Action receiver — main loop drains this.
    action_rx: mpsc::UnboundedReceiver<Action>,
    /// Key manager, used for the initial refresh.
    manager: KeyManager,
    /// Active notification toast with display timestamp.
    notification: Option<(Notification, Instant)>,
}

impl App {
    pub fn new(manager: KeyManager, account_url: String) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let screen = KeysScreen::new(manager.clone(), account_url);

        Self {
            screen,
            running: true,
            link_status: LinkStatus::default(),
            tunnel_state: TunnelState::Disconnected,
            help_visible: false,
            terminal_size: (0, 0),
            action_tx,
            action_rx,
            manager,
            notification: None,
        }
    }

    /// Run the main event loop. This is the heart of the TUI.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        self.terminal_size = tui.size().unwrap_or((80, 24));

        self.screen.init(self.action_tx.clone())?;
        self.screen.set_focused(true);
        self.action_tx
            .send(Action::Resize(self.terminal_size.0, self.terminal_size.1))?;

        // Pull initial snapshots so the screen has data before the first
        // daemon push.
        let manager = self.manager.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            match manager.refresh().await {
                Ok(()) => {
                    let _ = tx.send(Action::Connected);
                }
                Err(e) => {
                    warn!(error = %e, "initial refresh failed");
                    let _ = tx.send(Action::Disconnected(e.to_string()));
                    let _ = tx.send(Action::Notify(Notification::error(format!(
                        "Daemon unavailable: {e}"
                    ))));
                }
            }
        });

        let mut events = EventReader::new(
            Duration::from_millis(250), // 4 Hz tick
            Duration::from_millis(33),  // ~30 FPS render
        );

        info!("TUI event loop started");

        while self.running {
            // 1. Wait for the next event
            let Some(event) = events.next().await else {
                break;
            };

            // 2. Map event → action(s)
            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => {
                    self.action_tx.send(Action::Resize(w, h))?;
                }
                Event::Tick => {
                    self.action_tx.send(Action::Tick)?;
                }
                Event::Render => {
                    self.action_tx.send(Action::Render)?;
                }
            }

            // 3. Drain and process all queued actions
            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        self.screen.shutdown();
        info!("TUI event loop ended");
        Ok(())
    }

    /// Map a key event to an action. Global keys are handled here;
    /// everything else is delegated to the key screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.help_visible {
            // In help mode, Esc or ? closes help
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (KeyModifiers::NONE, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),

            (KeyModifiers::NONE, KeyCode::Char('?')) => return Ok(Some(Action::ToggleHelp)),

            _ => {}
        }

        self.screen.handle_key_event(key)
    }

    /// Process a single action — update app state and propagate to the screen.
    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.running = false;
            }

            Action::Resize(w, h) => {
                self.terminal_size = (*w, *h);
                self.forward_to_screen(action)?;
            }

            Action::ToggleHelp => {
                self.help_visible = !self.help_visible;
            }

            Action::Connected => {
                self.link_status = LinkStatus::Connected;
            }

            Action::Disconnected(reason) => {
                warn!(%reason, "daemon link lost");
                self.link_status = LinkStatus::Disconnected;
            }

            Action::Notify(n) => {
                self.notification = Some((n.clone(), Instant::now()));
            }

            Action::DismissNotification => {
                self.notification = None;
            }

            Action::Tick => {
                // Auto-dismiss notifications after 3 seconds
                if let Some((_, created)) = &self.notification {
                    if created.elapsed() > Duration::from_secs(3) {
                        self.notification = None;
                    }
                }
                self.forward_to_screen(action)?;
            }

            Action::Screen(event) => {
                // Keep the status bar in sync with the tunnel.
                if let ScreenEvent::TunnelState(state) = event {
                    self.tunnel_state = *state;
                }
                self.forward_to_screen(action)?;
            }

            // Everything else belongs to the key screen
            other => {
                self.forward_to_screen(other)?;
            }
        }

        Ok(())
    }

    fn forward_to_screen(&mut self, action: &Action) -> Result<()> {
        if let Some(follow_up) = self.screen.update(action)? {
            self.action_tx.send(follow_up)?;
        }
        Ok(())
    }

    // ── Rendering ────────────────────────────────────────────────

    /// Render the full application frame.
    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        // Layout: [screen content] [status bar]
        let layout = Layout::vertical([
            Constraint::Min(1),    // Screen content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

        self.screen.render(frame, layout[0]);
        self.render_status_bar(frame, layout[1]);

        // Overlays on top (order matters: last = topmost)
        if let Some((ref notif, _)) = self.notification {
            self.render_notification(frame, area, notif);
        }

        if self.help_visible {
            self.render_help_overlay(frame, area);
        }
    }

    /// Render the bottom status bar with tunnel state and key hints.
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let tunnel_indicator = match self.tunnel_state {
            TunnelState::Connected => {
                Span::styled("● connected", Style::default().fg(theme::GREEN))
            }
            TunnelState::Connecting => {
                Span::styled("◐ connecting", Style::default().fg(theme::YELLOW))
            }
            TunnelState::Disconnecting => {
                Span::styled("◐ disconnecting", Style::default().fg(theme::YELLOW))
            }
            TunnelState::Disconnected => {
                Span::styled("○ disconnected", Style::default().fg(theme::DIM_WHITE))
            }
            TunnelState::Blocked => Span::styled("● blocked", Style::default().fg(theme::RED)),
        };

        let link = match self.link_status {
            LinkStatus::Connected => Span::styled(" │ daemon up", theme::key_hint()),
            LinkStatus::Connecting => Span::styled(" │ daemon…", theme::key_hint()),
            LinkStatus::Disconnected => {
                Span::styled(" │ daemon down", Style::default().fg(theme::RED))
            }
        };

        let hints = Span::styled("  ? help  q quit", theme::key_hint());

        let line = Line::from(vec![Span::raw(" "), tunnel_indicator, link, hints]);
        frame.render_widget(Paragraph::new(line), area);
    }

    /// Render the help overlay centered on screen.
    #[allow(clippy::unused_self)]
    fn render_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let help_width = 46u16.min(area.width.saturating_sub(4));
        let help_height = 12u16.min(area.height.saturating_sub(4));

        let x = (area.width.saturating_sub(help_width)) / 2;
        let y = (area.height.saturating_sub(help_height)) / 2;
        let help_area = Rect::new(area.x + x, area.y + y, help_width, help_height);

        // Clear the background
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            help_area,
        );

        let block = Block::default()
            .title(" Keyboard Shortcuts ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());

        let inner = block.inner(help_area);
        frame.render_widget(block, help_area);

        let help_text = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled("  g         ", theme::key_hint_key()),
                Span::styled("Generate a new key", theme::key_hint()),
            ]),
            Line::from(vec![
                Span::styled("  v         ", theme::key_hint_key()),
                Span::styled("Verify the current key", theme::key_hint()),
            ]),
            Line::from(vec![
                Span::styled("  Enter     ", theme::key_hint_key()),
                Span::styled("Offered action", theme::key_hint()),
            ]),
            Line::from(vec![
                Span::styled("  ?         ", theme::key_hint_key()),
                Span::styled("This help", theme::key_hint()),
            ]),
            Line::from(vec![
                Span::styled("  q         ", theme::key_hint_key()),
                Span::styled("Quit", theme::key_hint()),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "              Esc or ? to close",
                theme::key_hint(),
            )),
        ];

        frame.render_widget(Paragraph::new(help_text), inner);
    }

    /// Render a notification toast in the bottom-right corner.
    #[allow(clippy::unused_self)]
    fn render_notification(&self, frame: &mut Frame, area: Rect, notif: &Notification) {
        let msg_len = notif.message.len() as u16;
        let width = (msg_len + 6).clamp(20, 60);
        let height = 3u16;

        let x = area.width.saturating_sub(width + 1);
        let y = area.height.saturating_sub(height + 2); // above status bar
        let toast_area = Rect::new(area.x + x, area.y + y, width, height);

        let (border_color, icon) = match notif.level {
            NotificationLevel::Success => (theme::GREEN, "✓"),
            NotificationLevel::Error => (theme::RED, "✗"),
            NotificationLevel::Warning => (theme::YELLOW, "!"),
            NotificationLevel::Info => (theme::CYAN, "·"),
        };

        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            toast_area,
        );

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color));

        let inner = block.inner(toast_area);
        frame.render_widget(block, toast_area);

        let line = Line::from(vec![
            Span::styled(format!(" {icon} "), Style::default().fg(border_color)),
            Span::styled(&notif.message, Style::default().fg(theme::DIM_WHITE)),
        ]);
        frame.render_widget(Paragraph::new(line), inner);
    }
}
