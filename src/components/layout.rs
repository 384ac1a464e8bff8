// ABOUTME: Main layout component stacking the terminal pane, completion hints and status bar
// Overlays (login dialog, help) are drawn last on top of the terminal

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
    style::{Color, Style},
};

use crate::app::AppState;
use crate::terminal::ControllerState;
use super::{HelpComponent, LoginDialogComponent, TerminalPaneComponent};

pub struct LayoutComponent {
    terminal_pane: TerminalPaneComponent,
    login_dialog: LoginDialogComponent,
    help: HelpComponent,
}

impl LayoutComponent {
    pub fn new() -> Self {
        Self {
            terminal_pane: TerminalPaneComponent::new(),
            login_dialog: LoginDialogComponent::new(),
            help: HelpComponent::new(),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, state: &AppState) {
        let hints_height = if state.completions.is_empty() { 0 } else { 1 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),               // Terminal
                Constraint::Length(hints_height), // Completion candidates
                Constraint::Length(3),            // Status bar
            ])
            .split(frame.size());

        self.terminal_pane.render(frame, chunks[0], state);

        if !state.completions.is_empty() {
            let hints = Paragraph::new(state.completions.join("  "))
                .style(Style::default().fg(Color::Green));
            frame.render_widget(hints, chunks[1]);
        }

        self.render_status_bar(frame, chunks[2], state);

        if state.login.is_some() {
            self.login_dialog.render(frame, frame.size(), state);
        }

        if state.help_visible {
            self.help.render(frame, frame.size());
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let state_color = match state.controller_state {
            ControllerState::Interactive => Color::Green,
            ControllerState::Ready => Color::Yellow,
            ControllerState::PartiallyBound | ControllerState::Exiting => Color::Magenta,
            ControllerState::Unbound => Color::Red,
        };
        let stream = if state.stream_open { "connected" } else { "disconnected" };

        let status = Line::from(vec![
            Span::styled(
                format!(" {} ", state.controller_state),
                Style::default().fg(state_color),
            ),
            Span::raw("| stream "),
            Span::styled(
                stream,
                Style::default().fg(if state.stream_open { Color::Green } else { Color::Red }),
            ),
            Span::raw(" | [Tab]complete [F1]help [Ctrl+C]quit"),
        ]);

        let bar = Paragraph::new(status)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
            )
            .alignment(Alignment::Center);

        frame.render_widget(bar, area);
    }
}

impl Default for LayoutComponent {
    fn default() -> Self {
        Self::new()
    }
}
