// ABOUTME: Login dialog overlay collecting user name and password before the shell goes interactive

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::help::centered_rect;
use crate::app::{AppState, LoginField, LoginForm};

pub struct LoginDialogComponent;

fn field_style(form: &LoginForm, field: LoginField) -> Style {
    if form.focus == field {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

impl LoginDialogComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let Some(form) = &state.login else {
            return;
        };

        let popup_area = centered_rect(50, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Login - Tab to switch, Enter to submit, Esc to quit")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // User
                Constraint::Length(3), // Password
                Constraint::Min(0),
            ])
            .split(inner);

        let masked = "*".repeat(form.password.chars().count());
        let user = Paragraph::new(form.user.as_str()).block(
            Block::default()
                .title("User")
                .borders(Borders::ALL)
                .border_style(field_style(form, LoginField::User)),
        );
        let password = Paragraph::new(masked.as_str()).block(
            Block::default()
                .title("Password")
                .borders(Borders::ALL)
                .border_style(field_style(form, LoginField::Password)),
        );
        frame.render_widget(user, rows[0]);
        frame.render_widget(password, rows[1]);

        let (row, column) = match form.focus {
            LoginField::User => (rows[0], form.user.chars().count()),
            LoginField::Password => (rows[1], masked.chars().count()),
        };
        let x = (row.x + 1).saturating_add(u16::try_from(column).unwrap_or(u16::MAX));
        if x < row.right().saturating_sub(1) {
            frame.set_cursor(x, row.y + 1);
        }
    }
}

impl Default for LoginDialogComponent {
    fn default() -> Self {
        Self::new()
    }
}
