// ABOUTME: Event handling system mapping keyboard input to shell actions
// Keys go to the login dialog while it is open, otherwise to the command line

use crate::app::state::{AppState, PendingAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const PAGE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Quit,
    ToggleHelp,
    ClearScreen,
    // Command line
    InputChar(char),
    Backspace,
    CursorLeft,
    CursorRight,
    Submit,
    Complete,
    HistoryPrevious,
    HistoryNext,
    ScrollUp,
    ScrollDown,
    // Login dialog
    LoginInputChar(char),
    LoginBackspace,
    LoginSwitchField,
    LoginSubmit,
}

pub struct EventHandler;

impl EventHandler {
    pub fn handle_key_event(key_event: KeyEvent, state: &AppState) -> Option<AppEvent> {
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);

        // Ctrl+C leaves from anywhere
        if ctrl && key_event.code == KeyCode::Char('c') {
            return Some(AppEvent::Quit);
        }

        if state.help_visible {
            return match key_event.code {
                KeyCode::F(1) | KeyCode::Esc => Some(AppEvent::ToggleHelp),
                _ => None,
            };
        }

        if key_event.code == KeyCode::F(1) {
            return Some(AppEvent::ToggleHelp);
        }

        if state.login.is_some() {
            return Self::handle_login_keys(key_event);
        }

        match key_event.code {
            KeyCode::Char('l') if ctrl => Some(AppEvent::ClearScreen),
            KeyCode::Char(ch) if !ctrl => Some(AppEvent::InputChar(ch)),
            KeyCode::Enter => Some(AppEvent::Submit),
            KeyCode::Tab => Some(AppEvent::Complete),
            KeyCode::Backspace => Some(AppEvent::Backspace),
            KeyCode::Left => Some(AppEvent::CursorLeft),
            KeyCode::Right => Some(AppEvent::CursorRight),
            KeyCode::Up => Some(AppEvent::HistoryPrevious),
            KeyCode::Down => Some(AppEvent::HistoryNext),
            KeyCode::PageUp => Some(AppEvent::ScrollUp),
            KeyCode::PageDown => Some(AppEvent::ScrollDown),
            _ => None,
        }
    }

    fn handle_login_keys(key_event: KeyEvent) -> Option<AppEvent> {
        match key_event.code {
            KeyCode::Esc => Some(AppEvent::Quit),
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => Some(AppEvent::LoginSwitchField),
            KeyCode::Enter => Some(AppEvent::LoginSubmit),
            KeyCode::Backspace => Some(AppEvent::LoginBackspace),
            KeyCode::Char(ch) => Some(AppEvent::LoginInputChar(ch)),
            _ => None,
        }
    }

    pub fn process_event(event: AppEvent, state: &mut AppState) {
        match event {
            AppEvent::Quit => state.quit(),
            AppEvent::ToggleHelp => state.toggle_help(),
            AppEvent::ClearScreen => state.clear_screen(),
            AppEvent::InputChar(ch) => state.insert_char(ch),
            AppEvent::Backspace => state.backspace(),
            AppEvent::CursorLeft => state.cursor_left(),
            AppEvent::CursorRight => state.cursor_right(),
            AppEvent::Submit => {
                let line = state.take_input();
                state.pending_action = Some(PendingAction::Submit(line));
            }
            AppEvent::Complete => {
                // Completion is only meaningful once the command catalog is reachable
                if state.is_interactive() {
                    state.pending_action = Some(PendingAction::Complete(state.input.clone()));
                }
            }
            AppEvent::HistoryPrevious => state.history_previous(),
            AppEvent::HistoryNext => state.history_next(),
            AppEvent::ScrollUp => state.scroll_up(PAGE),
            AppEvent::ScrollDown => state.scroll_down(PAGE),
            AppEvent::LoginInputChar(ch) => {
                if let Some(ref mut form) = state.login {
                    form.focused_mut().push(ch);
                }
            }
            AppEvent::LoginBackspace => {
                if let Some(ref mut form) = state.login {
                    form.focused_mut().pop();
                }
            }
            AppEvent::LoginSwitchField => {
                if let Some(ref mut form) = state.login {
                    form.switch_field();
                }
            }
            AppEvent::LoginSubmit => {
                if let Some(ref mut form) = state.login {
                    if form.user.is_empty() {
                        return;
                    }
                    state.pending_action = Some(PendingAction::Login {
                        user: form.user.clone(),
                        password: std::mem::take(&mut form.password),
                    });
                }
            }
        }
    }
}
