// ABOUTME: Application state for the shell TUI: scrollback, input line, history and login form
// Terminal events from the controller are folded into this state on each tick

use crate::config::Settings;
use crate::terminal::{ControllerState, TerminalEvent};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Output,
    Error,
    Input,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub kind: LineKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    User,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub user: String,
    pub password: String,
    pub focus: LoginField,
}

impl LoginForm {
    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::User => &mut self.user,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn switch_field(&mut self) {
        self.focus = match self.focus {
            LoginField::User => LoginField::Password,
            LoginField::Password => LoginField::User,
        };
    }
}

/// Work the event handler cannot do synchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Submit(String),
    Login { user: String, password: String },
    Complete(String),
}

#[derive(Debug)]
pub struct AppState {
    pub scrollback: VecDeque<OutputLine>,
    pub scrollback_limit: usize,
    /// Lines scrolled up from the bottom
    pub scroll_offset: usize,
    pub input: String,
    /// Cursor position in characters
    pub cursor: usize,
    pub history: Vec<String>,
    pub history_index: Option<usize>,
    pub prompt: String,
    pub login: Option<LoginForm>,
    pub completions: Vec<String>,
    pub controller_state: ControllerState,
    pub stream_open: bool,
    pub help_visible: bool,
    pub should_quit: bool,
    pub pending_action: Option<PendingAction>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let mut state = Self {
            scrollback: VecDeque::new(),
            scrollback_limit: settings.scrollback.max(1),
            scroll_offset: 0,
            input: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_index: None,
            prompt: "> ".to_string(),
            login: None,
            completions: Vec::new(),
            controller_state: ControllerState::Unbound,
            stream_open: false,
            help_visible: false,
            should_quit: false,
            pending_action: None,
        };
        if !settings.greetings.is_empty() {
            state.push_line(LineKind::System, &settings.greetings);
        }
        state
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn toggle_help(&mut self) {
        self.help_visible = !self.help_visible;
    }

    pub fn is_interactive(&self) -> bool {
        self.controller_state == ControllerState::Interactive
    }

    /// Appends text, one scrollback line per embedded newline
    pub fn push_line(&mut self, kind: LineKind, text: &str) {
        for line in text.split('\n') {
            self.scrollback.push_back(OutputLine {
                kind,
                text: line.trim_end_matches('\r').to_string(),
            });
        }
        while self.scrollback.len() > self.scrollback_limit {
            self.scrollback.pop_front();
        }
        self.scroll_offset = 0;
    }

    pub fn push_output(&mut self, text: &str) {
        self.push_line(LineKind::Output, text);
    }

    pub fn push_error(&mut self, text: &str) {
        self.push_line(LineKind::Error, text);
    }

    pub fn clear_screen(&mut self) {
        self.scrollback.clear();
        self.scroll_offset = 0;
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map_or(self.input.len(), |(index, _)| index)
    }

    pub fn insert_char(&mut self, ch: char) {
        let index = self.byte_index();
        self.input.insert(index, ch);
        self.cursor += 1;
        self.completions.clear();
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let index = self.byte_index();
        self.input.remove(index);
        self.completions.clear();
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    fn set_input(&mut self, input: String) {
        self.cursor = input.chars().count();
        self.input = input;
    }

    /// Takes the input line, echoes it with the prompt and records it in the history
    pub fn take_input(&mut self) -> String {
        let line = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.history_index = None;
        self.completions.clear();

        let echoed = format!("{}{}", self.prompt, line);
        self.push_line(LineKind::Input, &echoed);
        if !line.trim().is_empty() && self.history.last() != Some(&line) {
            self.history.push(line.clone());
        }
        line
    }

    pub fn history_previous(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let index = match self.history_index {
            None => self.history.len() - 1,
            Some(index) => index.saturating_sub(1),
        };
        self.history_index = Some(index);
        self.set_input(self.history[index].clone());
    }

    pub fn history_next(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_index = Some(index + 1);
            self.set_input(self.history[index + 1].clone());
        } else {
            self.history_index = None;
            self.set_input(String::new());
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = (self.scroll_offset + lines).min(self.scrollback.len());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Replaces the token being typed with the single candidate, or lists the candidates
    pub fn apply_completions(&mut self, candidates: Option<Vec<String>>) {
        let mut candidates = candidates.unwrap_or_default();
        if candidates.len() != 1 {
            self.completions = candidates;
            return;
        }

        let only = candidates.remove(0);
        let head = match self.input.rfind(' ') {
            Some(index) => &self.input[..=index],
            None => "",
        };
        let completed = format!("{head}{only} ");
        self.set_input(completed);
        self.completions.clear();
    }

    pub fn apply_terminal_event(&mut self, event: TerminalEvent) {
        debug!("Terminal event: {:?}", event);
        match event {
            TerminalEvent::Echo(text) => self.push_output(&text),
            TerminalEvent::Error(text) => self.push_error(&text),
            TerminalEvent::Prompt(prompt) => self.prompt = prompt,
            TerminalEvent::LoginRequired => {
                let user = self.login.take().map(|form| form.user).unwrap_or_default();
                self.login = Some(LoginForm {
                    focus: if user.is_empty() {
                        LoginField::User
                    } else {
                        LoginField::Password
                    },
                    user,
                    password: String::new(),
                });
            }
            TerminalEvent::StateChanged(state) => {
                self.controller_state = state;
                if state != ControllerState::Ready {
                    self.login = None;
                }
            }
            TerminalEvent::StreamOpened => self.stream_open = true,
            TerminalEvent::StreamClosed => self.stream_open = false,
            TerminalEvent::Exited => self.quit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn quiet() -> AppState {
        AppState::new(&Settings {
            greetings: String::new(),
            prompt_host: "server".to_string(),
            scrollback: 3,
        })
    }

    #[test]
    fn test_greetings_open_the_scrollback() {
        let state = AppState::default();
        assert_eq!(state.scrollback.len(), 1);
        assert_eq!(state.scrollback[0].kind, LineKind::System);
    }

    #[test]
    fn test_scrollback_is_capped() {
        let mut state = quiet();
        state.push_output("a\nb\nc\nd");
        let texts: Vec<_> = state.scrollback.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_editing_handles_multibyte_characters() {
        let mut state = quiet();
        for ch in "héllo".chars() {
            state.insert_char(ch);
        }
        state.cursor_left();
        state.cursor_left();
        state.cursor_left();
        state.backspace();
        assert_eq!(state.input, "hllo");
        assert_eq!(state.cursor, 1);
    }

    #[test]
    fn test_history_walks_back_and_forth() {
        let mut state = quiet();
        for line in ["ls", "help", "help"] {
            for ch in line.chars() {
                state.insert_char(ch);
            }
            state.take_input();
        }
        assert_eq!(state.history, vec!["ls".to_string(), "help".to_string()]);

        state.history_previous();
        assert_eq!(state.input, "help");
        state.history_previous();
        assert_eq!(state.input, "ls");
        state.history_previous();
        assert_eq!(state.input, "ls");
        state.history_next();
        assert_eq!(state.input, "help");
        state.history_next();
        assert_eq!(state.input, "");
    }

    #[test]
    fn test_single_completion_replaces_last_token() {
        let mut state = quiet();
        state.set_input("help ver".to_string());
        state.apply_completions(Some(vec!["version".to_string()]));
        assert_eq!(state.input, "help version ");
        assert_eq!(state.cursor, 13);
    }

    #[test]
    fn test_multiple_completions_are_listed() {
        let mut state = quiet();
        state.set_input("h".to_string());
        state.apply_completions(Some(vec!["help".to_string(), "halt".to_string()]));
        assert_eq!(state.input, "h");
        assert_eq!(state.completions.len(), 2);

        state.apply_completions(None);
        assert!(state.completions.is_empty());
    }

    #[test]
    fn test_login_required_keeps_user_name() {
        let mut state = quiet();
        state.apply_terminal_event(TerminalEvent::LoginRequired);
        state.login.as_mut().unwrap().user = "admin".to_string();
        state.login.as_mut().unwrap().password = "wrong".to_string();

        state.apply_terminal_event(TerminalEvent::LoginRequired);
        let form = state.login.as_ref().unwrap();
        assert_eq!(form.user, "admin");
        assert!(form.password.is_empty());
        assert_eq!(form.focus, LoginField::Password);

        state.apply_terminal_event(TerminalEvent::StateChanged(ControllerState::Interactive));
        assert!(state.login.is_none());
    }

    #[test]
    fn test_exited_quits() {
        let mut state = quiet();
        state.apply_terminal_event(TerminalEvent::Exited);
        assert!(state.should_quit);
    }
}
