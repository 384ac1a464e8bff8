// ABOUTME: HTTP and WebSocket backed implementations of the capability contracts
// Each provider validates its configuration, registers itself on the hub and unregisters on stop

pub mod auth;
pub mod shell;
pub mod stream;

pub use auth::{AuthConfig, AuthProvider};
pub use shell::{ShellConfig, ShellProvider};
pub use stream::{ReconnectPolicy, StreamConfig, StreamProvider};

/// Joins the server base URL with an absolute path
pub(crate) fn endpoint(server: &str, path: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), path)
}
