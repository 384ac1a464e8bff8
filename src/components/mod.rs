// ABOUTME: UI components for the shell TUI: terminal pane, login dialog, help overlay and layout

pub mod help;
pub mod layout;
pub mod login_dialog;
pub mod terminal_pane;

pub use help::HelpComponent;
pub use layout::LayoutComponent;
pub use login_dialog::LoginDialogComponent;
pub use terminal_pane::TerminalPaneComponent;
