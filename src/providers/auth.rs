// ABOUTME: Authentication provider issuing login/logout requests against the shell server
// Tracks whether the session is logged in and allows a single login request in flight

use super::endpoint;
use crate::error::Result;
use crate::hub::{ComponentId, Hub, Properties, RootPath};
use crate::services::{AuthService, LoginOutcome};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the server, e.g. `http://localhost:9000`
    pub server: String,
    pub root: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    user: &'a str,
    pass: &'a str,
}

pub struct AuthProvider {
    component: ComponentId,
    hub: Hub,
    client: Client,
    root: RootPath,
    login_url: String,
    logout_url: String,
    logged: AtomicBool,
    login_in_flight: AtomicBool,
}

impl AuthProvider {
    pub const NAME: &'static str = "AuthProvider";

    /// Validates the configuration and registers the provider on the hub
    pub fn configure(hub: &Hub, config: &AuthConfig) -> Result<Arc<Self>> {
        let root = RootPath::parse(&config.root)?;
        let provider = Arc::new(Self {
            component: ComponentId::new(Self::NAME),
            hub: hub.clone(),
            client: Client::new(),
            login_url: endpoint(&config.server, &root.join("/login")),
            logout_url: endpoint(&config.server, &root.join("/logout")),
            root,
            logged: AtomicBool::new(false),
            login_in_flight: AtomicBool::new(false),
        });

        let mut properties = Properties::new();
        properties.insert("root".to_string(), json!(provider.root.as_str()));
        hub.provide_service::<dyn AuthService>(
            &provider.component,
            Arc::clone(&provider) as Arc<dyn AuthService>,
            properties,
        );

        Ok(provider)
    }

    /// Forgets the session and withdraws the provider from the hub
    pub fn stop(&self) {
        if self.logged.swap(false, Ordering::SeqCst) {
            info!("[{}] Session dropped on stop", Self::NAME);
        }
        self.hub.unregister(&self.component);
    }

    async fn request_login(&self, user: &str, password: &str) -> LoginOutcome {
        let response = match self
            .client
            .post(&self.login_url)
            .json(&Credentials {
                user,
                pass: password,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("[{}] Cannot reach {}: {}", Self::NAME, self.login_url, e);
                return LoginOutcome::Rejected {
                    status: None,
                    error: e.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("[{}] Cannot read login response: {}", Self::NAME, e);
                return LoginOutcome::Rejected {
                    status: Some(status.as_u16()),
                    error: e.to_string(),
                };
            }
        };

        // Only a plain 200 carries a token
        if status == StatusCode::OK {
            LoginOutcome::Authenticated { token: body }
        } else {
            let error = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("authentication failed").to_string()
            } else {
                body
            };
            LoginOutcome::Rejected {
                status: Some(status.as_u16()),
                error,
            }
        }
    }
}

#[async_trait]
impl AuthService for AuthProvider {
    async fn login(&self, user: &str, password: &str) -> LoginOutcome {
        if self.login_in_flight.swap(true, Ordering::SeqCst) {
            debug!("[{}] Login ignored, another one is in flight", Self::NAME);
            return LoginOutcome::Rejected {
                status: None,
                error: "a login request is already in flight".to_string(),
            };
        }

        let outcome = self.request_login(user, password).await;
        self.login_in_flight.store(false, Ordering::SeqCst);

        if outcome.is_authenticated() {
            self.logged.store(true, Ordering::SeqCst);
            info!("[{}] {} logged in", Self::NAME, user);
        } else {
            info!("[{}] Login rejected for {}", Self::NAME, user);
        }
        outcome
    }

    async fn logout(&self) {
        if let Err(e) = self
            .client
            .get(&self.logout_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            warn!("[{}] Logout request failed: {}", Self::NAME, e);
        }
        self.logged.store(false, Ordering::SeqCst);
        info!("[{}] Logged out", Self::NAME);
    }

    fn is_logged(&self) -> bool {
        self.logged.load(Ordering::SeqCst)
    }
}
