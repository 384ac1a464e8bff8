// ABOUTME: Shell provider fetching the remote command catalog and executing commands over HTTP
// Command results are republished on the hub topic; completions come from the catalog and a cache

use super::endpoint;
use crate::error::Result;
use crate::hub::{ComponentId, Hub, Message, Properties, RootPath, Topic};
use crate::services::ShellService;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub server: String,
    pub root: String,
    pub topic: String,
    /// Path of the component listing used to fill the completion cache
    pub completions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComponentListing {
    #[serde(default)]
    instances: Vec<InstanceEntry>,
    #[serde(default)]
    factories: Vec<FactoryEntry>,
}

#[derive(Debug, Deserialize)]
struct InstanceEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FactoryEntry {
    name: String,
    #[serde(default)]
    handler: bool,
}

pub struct ShellProvider {
    component: ComponentId,
    hub: Hub,
    client: Client,
    server: String,
    root: RootPath,
    topic: Topic,
    completions_url: Option<String>,
    catalog: RwLock<Option<Vec<String>>>,
    completion_cache: RwLock<HashMap<String, Vec<String>>>,
}

/// Case-insensitive prefix filter keeping the list order
fn starting_with(list: &[String], prefix: &str) -> Vec<String> {
    let prefix = prefix.to_lowercase();
    list.iter()
        .filter(|entry| entry.to_lowercase().starts_with(&prefix))
        .cloned()
        .collect()
}

impl ShellProvider {
    pub const NAME: &'static str = "ShellProvider";

    pub fn configure(hub: &Hub, config: &ShellConfig) -> Result<Arc<Self>> {
        let root = RootPath::parse(&config.root)?;
        let topic = Topic::parse(&config.topic)?;
        let provider = Arc::new(Self {
            component: ComponentId::new(Self::NAME),
            hub: hub.clone(),
            client: Client::new(),
            server: config.server.clone(),
            root,
            topic,
            completions_url: config
                .completions
                .as_deref()
                .map(|path| endpoint(&config.server, path)),
            catalog: RwLock::new(None),
            completion_cache: RwLock::new(HashMap::new()),
        });

        let mut properties = Properties::new();
        properties.insert("root".to_string(), json!(provider.root.as_str()));
        properties.insert("topic".to_string(), json!(provider.topic.as_str()));
        hub.provide_service::<dyn ShellService>(
            &provider.component,
            Arc::clone(&provider) as Arc<dyn ShellService>,
            properties,
        );

        Ok(provider)
    }

    /// Fetches the command catalog and fills the completion cache
    pub async fn start(&self) {
        match self.fetch_commands().await {
            Ok(commands) => {
                info!("[{}] {} commands available", Self::NAME, commands.len());
                *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Some(commands);
            }
            Err(e) => warn!("[{}] Cannot retrieve commands: {}", Self::NAME, e),
        }

        if let Some(url) = &self.completions_url {
            match self.fetch_listing(url).await {
                Ok(listing) => {
                    self.insert_completions(
                        "instance",
                        listing.instances.into_iter().map(|i| i.name).collect(),
                    );
                    self.insert_completions(
                        "factory",
                        listing
                            .factories
                            .into_iter()
                            .filter(|f| !f.handler)
                            .map(|f| f.name)
                            .collect(),
                    );
                }
                Err(e) => warn!("[{}] Cannot retrieve {}: {}", Self::NAME, url, e),
            }
        }
    }

    /// Drops the catalog and the completion cache and leaves the hub
    pub fn stop(&self) {
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.completion_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.hub.unregister(&self.component);
    }

    /// Registers second-token completions for `command`
    pub fn insert_completions(&self, command: &str, values: Vec<String>) {
        debug!(
            "[{}] {} completions cached for '{}'",
            Self::NAME,
            values.len(),
            command
        );
        self.completion_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.to_string(), values);
    }

    async fn fetch_commands(&self) -> Result<Vec<String>> {
        let url = endpoint(&self.server, &self.root.join("/command"));
        let commands = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await?;
        Ok(commands)
    }

    async fn fetch_listing(&self, url: &str) -> Result<ComponentListing> {
        let listing = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<ComponentListing>()
            .await?;
        Ok(listing)
    }

    async fn request_exec(&self, command: &str, args: &str) -> Result<String> {
        let url = endpoint(&self.server, &self.root.join(&format!("/command/{command}")));
        let body = self
            .client
            .post(url)
            .json(&args)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl ShellService for ShellProvider {
    fn commands(&self) -> Option<Vec<String>> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn exec(&self, command: &str, args: &str) {
        match self.request_exec(command, args).await {
            Ok(body) => {
                let payload = body.trim();
                if payload.is_empty() || payload == "null" {
                    debug!("[{}] '{}' returned no result", Self::NAME, command);
                    return;
                }
                self.hub
                    .publish(&self.component, &self.topic, Message::new(body));
            }
            Err(e) => warn!("[{}] Cannot exec command '{}': {}", Self::NAME, command, e),
        }
    }

    fn auto_complete(&self, line: &str) -> Option<Vec<String>> {
        let tokens: Vec<&str> = if line.is_empty() {
            Vec::new()
        } else {
            line.split(' ').collect()
        };

        match tokens.as_slice() {
            [] => self.commands(),
            [prefix] => self
                .catalog
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_deref()
                .map(|commands| starting_with(commands, prefix)),
            [command, prefix] => self
                .completion_cache
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(*command)
                .map(|values| starting_with(values, prefix)),
            _ => None,
        }
    }

    fn topic(&self) -> Topic {
        self.topic.clone()
    }
}
