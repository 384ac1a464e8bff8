// ABOUTME: Help overlay component displaying keyboard shortcuts and built-in commands

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem},
    style::{Color, Modifier, Style},
};

pub struct HelpComponent;

impl HelpComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(60, 70, area);

        frame.render_widget(Clear, popup_area);

        let heading = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let help_items = vec![
            ListItem::new("Command line:").style(heading),
            ListItem::new("  Enter      Run the command"),
            ListItem::new("  Tab        Complete command or argument"),
            ListItem::new("  ↑/↓        Browse history"),
            ListItem::new("  ←/→        Move cursor"),
            ListItem::new("  PgUp/PgDn  Scroll output"),
            ListItem::new("  Ctrl+L     Clear the screen"),
            ListItem::new(""),
            ListItem::new("Login:").style(heading),
            ListItem::new("  Tab        Switch between user and password"),
            ListItem::new("  Enter      Log in"),
            ListItem::new(""),
            ListItem::new("Commands:").style(heading),
            ListItem::new("  exit       Log out and leave"),
            ListItem::new("  help       Remote command list"),
            ListItem::new(""),
            ListItem::new("General:").style(heading),
            ListItem::new("  F1         Toggle this help"),
            ListItem::new("  Ctrl+C     Quit"),
        ];

        let help_list = List::new(help_items)
            .block(
                Block::default()
                    .title("Help - Press F1 or Esc to close")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
            );

        frame.render_widget(help_list, popup_area);
    }
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

impl Default for HelpComponent {
    fn default() -> Self {
        Self::new()
    }
}
