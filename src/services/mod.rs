// ABOUTME: Capability contracts the terminal depends on: authentication, command execution, result streaming
// Each trait object type is a hub contract; providers implement exactly one of them

use crate::error::Result;
use crate::hub::{Contract, Topic};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Outcome of a login attempt; failures are values, never errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated { token: String },
    Rejected { status: Option<u16>, error: String },
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticates against the configured endpoint
    async fn login(&self, user: &str, password: &str) -> LoginOutcome;

    /// Ends the session; the session is considered logged out whatever the server answers
    async fn logout(&self);

    fn is_logged(&self) -> bool;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShellService: Send + Sync {
    /// Command catalog, `None` until fetched and after stop
    fn commands(&self) -> Option<Vec<String>>;

    /// Runs `command` remotely; any result is published on [`ShellService::topic`]
    async fn exec(&self, command: &str, args: &str);

    /// Completion candidates for a partial command line, `None` when there are none to offer
    fn auto_complete(&self, line: &str) -> Option<Vec<String>>;

    fn topic(&self) -> Topic;
}

/// Invoked once when the stream connection opens or ends
pub type StreamCallback = Box<dyn FnOnce() + Send>;

#[cfg_attr(test, automock)]
pub trait StreamService: Send + Sync {
    /// Opens the duplex connection; fails with `AlreadyOpen` when one exists
    fn open(&self, on_open: StreamCallback, on_close: StreamCallback) -> Result<()>;

    /// Closes the connection if any
    fn close(&self);

    fn is_open(&self) -> bool;

    fn topic(&self) -> Topic;
}

impl Contract for dyn AuthService {
    const NAME: &'static str = "AuthService";
}

impl Contract for dyn ShellService {
    const NAME: &'static str = "ShellService";
}

impl Contract for dyn StreamService {
    const NAME: &'static str = "StreamService";
}
