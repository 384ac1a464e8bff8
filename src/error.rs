// ABOUTME: Error types shared by the hub, the providers and the terminal controller
// Only configuration and contract violations surface as errors; transport failures are logged

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("The property {field} must be a valid path string, got '{value}'")]
    InvalidPath { field: &'static str, value: String },

    #[error("A stream connection is already open")]
    AlreadyOpen,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ShellError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
