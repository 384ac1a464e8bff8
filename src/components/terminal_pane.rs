// ABOUTME: Terminal pane rendering the scrollback and the prompt line with ANSI colors
// Server output keeps its escape sequences; they are turned into styled spans on render

use ansi_to_tui::IntoText;
use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::{AppState, LineKind, OutputLine};

pub struct TerminalPaneComponent;

/// Styled lines for `text`, falling back to raw text on bad escape sequences
fn ansi_lines(text: &str) -> Vec<Line<'static>> {
    text.into_text()
        .unwrap_or_else(|_| Text::raw(text.to_string()))
        .lines
}

fn styled(line: &OutputLine) -> Vec<Line<'static>> {
    let mut lines = ansi_lines(&line.text);
    if lines.is_empty() {
        lines.push(Line::default());
    }
    let style = match line.kind {
        LineKind::Output | LineKind::Input => return lines,
        LineKind::Error => Style::default().fg(Color::Red),
        LineKind::System => Style::default().fg(Color::Cyan),
    };
    // Explicit ANSI colors win over the line kind
    for line in &mut lines {
        for span in &mut line.spans {
            span.style = style.patch(span.style);
        }
    }
    lines
}

impl TerminalPaneComponent {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let mut lines: Vec<Line> = state.scrollback.iter().flat_map(styled).collect();

        // The prompt only shows once the terminal takes commands
        let prompt_visible = state.is_interactive() && state.login.is_none();
        let prompt_width = if prompt_visible {
            let mut prompt_line = ansi_lines(&state.prompt).pop().unwrap_or_default();
            let width = prompt_line.width();
            prompt_line.spans.push(Span::raw(state.input.clone()));
            lines.push(prompt_line);
            Some(width)
        } else {
            None
        };

        let total = lines.len();
        let inner_height = area.height.saturating_sub(2) as usize;
        let bottom = total.saturating_sub(inner_height);
        let top = bottom.saturating_sub(state.scroll_offset);

        let title = if state.scroll_offset > 0 {
            format!("Shell [scrolled {} lines]", state.scroll_offset)
        } else {
            "Shell".to_string()
        };

        let paragraph = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .scroll((u16::try_from(top).unwrap_or(u16::MAX), 0));

        frame.render_widget(paragraph, area);

        if let Some(width) = prompt_width {
            if state.scroll_offset == 0 {
                let row = total.saturating_sub(1).saturating_sub(top);
                let column = width + state.cursor;
                let x = (area.x + 1).saturating_add(u16::try_from(column).unwrap_or(u16::MAX));
                let y = (area.y + 1).saturating_add(u16::try_from(row).unwrap_or(u16::MAX));
                if x < area.right().saturating_sub(1) && y < area.bottom().saturating_sub(1) {
                    frame.set_cursor(x, y);
                }
            }
        }
    }
}

impl Default for TerminalPaneComponent {
    fn default() -> Self {
        Self::new()
    }
}
