// ABOUTME: Main application structure wiring the hub, the providers and the terminal controller
// The tick drains controller events into the UI state and runs the pending async action

pub mod events;
pub mod guard;
pub mod state;

pub use events::{AppEvent, EventHandler};
pub use guard::TerminalGuard;
pub use state::{AppState, LineKind, LoginField, LoginForm, OutputLine, PendingAction};

use crate::config::AppConfig;
use crate::error::ShellError;
use crate::hub::Hub;
use crate::providers::{AuthProvider, ShellProvider, StreamProvider};
use crate::terminal::{ControllerState, Dispatch, TerminalController, TerminalEvent};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

pub struct App {
    pub state: AppState,
    config: AppConfig,
    hub: Hub,
    controller: Arc<TerminalController>,
    auth: Option<Arc<AuthProvider>>,
    shell: Arc<ShellProvider>,
    stream: Option<Arc<StreamProvider>>,
    events: UnboundedReceiver<TerminalEvent>,
}

impl App {
    /// Registers the controller, then auth and shell; the stream provider is added by `init`
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let hub = Hub::new();
        let (tx, events) = mpsc::unbounded_channel();
        let controller = TerminalController::configure(&hub, &config.terminal_config(), tx)
            .context("cannot configure the terminal")?;

        // Auth must be bound before the last required service arrives
        let auth = if config.auth_enabled() {
            Some(AuthProvider::configure(&hub, &config.auth_config()).context("cannot configure auth")?)
        } else {
            info!("Authentication disabled");
            None
        };
        let shell = ShellProvider::configure(&hub, &config.shell_config())
            .context("cannot configure the shell")?;

        let mut state = AppState::new(&config.settings);
        state.controller_state = controller.state();

        Ok(Self {
            state,
            config,
            hub,
            controller,
            auth,
            shell,
            stream: None,
            events,
        })
    }

    /// Fetches the command catalog, then registers the stream which completes the terminal
    pub async fn init(&mut self) -> Result<()> {
        self.shell.start().await;
        let stream = StreamProvider::configure(&self.hub, &self.config.stream_config())
            .context("cannot configure the stream")?;
        info!("Streaming results from {}", stream.endpoint());
        self.stream = Some(stream);
        self.drain_events();
        Ok(())
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn controller(&self) -> &Arc<TerminalController> {
        &self.controller
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.state.apply_terminal_event(event);
        }
    }

    pub async fn tick(&mut self) -> Result<()> {
        self.drain_events();

        if let Some(action) = self.state.pending_action.take() {
            self.run_action(action).await;
            self.drain_events();
        }
        Ok(())
    }

    async fn run_action(&mut self, action: PendingAction) {
        match action {
            PendingAction::Submit(line) => match self.controller.interpret(&line).await {
                Ok(Dispatch::Exited) => info!("Exit requested"),
                Ok(_) => {}
                Err(ShellError::NotAuthenticated) => {
                    self.state.push_error("Please log in first");
                }
                Err(e) => self.state.push_error(&e.to_string()),
            },
            PendingAction::Login { user, password } => {
                if let Err(e) = self.controller.login(&user, &password).await {
                    warn!("Login not attempted: {}", e);
                    self.state.push_error(&e.to_string());
                }
            }
            PendingAction::Complete(line) => {
                let candidates = self.controller.complete(&line);
                self.state.apply_completions(candidates);
            }
        }
    }

    /// Leaves the hub cleanly: controller first, then the providers
    pub async fn shutdown(&mut self) {
        if self.controller.state() != ControllerState::Unbound {
            self.controller.exit().await;
        }
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.shell.stop();
        if let Some(auth) = self.auth.take() {
            auth.stop();
        }
        self.drain_events();
        info!("Shut down");
    }
}
