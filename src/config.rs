// ABOUTME: Application configuration loaded from ~/.hubshell/config.toml with command line overrides
// Produces the per-provider and terminal configurations used to wire the hub

use crate::error::{Result, ShellError};
use crate::hub::{RootPath, Topic};
use crate::providers::{AuthConfig, ReconnectPolicy, ShellConfig, StreamConfig};
use crate::terminal::TerminalConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_GREETINGS: &str = "Welcome to the remote shell. Type 'help' to list commands.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub greetings: String,
    pub prompt_host: String,
    /// Number of output lines kept on screen
    pub scrollback: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            greetings: DEFAULT_GREETINGS.to_string(),
            prompt_host: "server".to_string(),
            scrollback: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the remote server, scheme included
    pub server: String,
    pub root: String,
    pub topic: String,
    pub completions: Option<String>,
    /// `true` requires authentication, `false` skips the auth provider entirely
    pub auth: Option<bool>,
    pub settings: Settings,
    pub reconnect: ReconnectPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:9000".to_string(),
            root: "/monitor/terminal".to_string(),
            topic: "/monitor/terminal/stream".to_string(),
            completions: Some("/monitor/ipojo.json".to_string()),
            auth: None,
            settings: Settings::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Values given on the command line, applied over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub root: Option<String>,
    pub topic: Option<String>,
    pub auth: Option<bool>,
}

impl AppConfig {
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hubshell")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Reads `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ShellError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)
            .map_err(|e| ShellError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ShellError::Config(e.to_string()))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(server) = overrides.server {
            self.server = server;
        }
        if let Some(root) = overrides.root {
            self.root = root;
        }
        if let Some(topic) = overrides.topic {
            self.topic = topic;
        }
        if overrides.auth.is_some() {
            self.auth = overrides.auth;
        }
    }

    /// Checks paths and the server URL before anything registers on the hub
    pub fn validate(&self) -> Result<()> {
        RootPath::parse(&self.root)?;
        Topic::parse(&self.topic)?;
        reqwest::Url::parse(&self.server)
            .map_err(|e| ShellError::Config(format!("invalid server url '{}': {}", self.server, e)))?;
        if self.settings.scrollback == 0 {
            return Err(ShellError::Config("scrollback must be positive".to_string()));
        }
        Ok(())
    }

    /// Whether an auth provider should be started at all
    pub fn auth_enabled(&self) -> bool {
        self.auth != Some(false)
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            server: self.server.clone(),
            root: self.root.clone(),
        }
    }

    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            server: self.server.clone(),
            root: self.root.clone(),
            topic: self.topic.clone(),
            completions: self.completions.clone(),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            server: self.server.clone(),
            root: self.root.clone(),
            topic: self.topic.clone(),
            reconnect: self.reconnect,
        }
    }

    pub fn terminal_config(&self) -> TerminalConfig {
        TerminalConfig {
            topic: self.topic.clone(),
            auth: self.auth,
            prompt: "> ".to_string(),
            prompt_host: self.settings.prompt_host.clone(),
        }
    }
}
