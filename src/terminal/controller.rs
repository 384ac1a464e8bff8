// ABOUTME: Terminal controller binding the auth, shell and stream services through the hub
// Drives the readiness state machine, interprets command lines and formats streamed results

use super::frame::{decode_frame, Frame};
use super::readiness::{ControllerState, Readiness};
use crate::error::{Result, ShellError};
use crate::hub::{
    ComponentId, Contract, Dependency, Hub, Message, RegistrationId, ServiceReference, Topic,
};
use crate::services::{AuthService, LoginOutcome, ShellService, StreamService};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

const CONNECTED_BANNER: &str = "\u{1b}[32;1mYou have been properly connected!\u{1b}[0m";
const CONNECTION_LOST: &str = "The connection with the server has been lost...";

#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Topic carrying command results
    pub topic: String,
    /// `Some(true)` makes authentication mandatory, anything else makes it optional
    pub auth: Option<bool>,
    /// Prompt shown when nobody logged in
    pub prompt: String,
    /// Host part of the `user@host ~>` prompt
    pub prompt_host: String,
}

/// Output of the controller towards the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Echo(String),
    Error(String),
    Prompt(String),
    LoginRequired,
    StateChanged(ControllerState),
    StreamOpened,
    StreamClosed,
    Exited,
}

/// What the interpreter did with an input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Empty,
    Exited,
    Unknown(String),
    Executed { command: String, args: String },
}

struct Bound<C: ?Sized> {
    id: RegistrationId,
    service: Arc<C>,
}

type SlotFn<C> = fn(&mut ControllerInner) -> &mut Option<Bound<C>>;

struct ControllerInner {
    state: ControllerState,
    readiness: Readiness,
    auth: Option<Bound<dyn AuthService>>,
    shell: Option<Bound<dyn ShellService>>,
    stream: Option<Bound<dyn StreamService>>,
    user: Option<String>,
    /// Bumped on every stream open; callbacks of older sessions are ignored
    session: u64,
}

/// What losing a binding did to the terminal
enum Departure {
    Unchanged,
    Suspended,
    LoginWithdrawn,
}

fn auth_slot(inner: &mut ControllerInner) -> &mut Option<Bound<dyn AuthService>> {
    &mut inner.auth
}

fn shell_slot(inner: &mut ControllerInner) -> &mut Option<Bound<dyn ShellService>> {
    &mut inner.shell
}

fn stream_slot(inner: &mut ControllerInner) -> &mut Option<Bound<dyn StreamService>> {
    &mut inner.stream
}

pub struct TerminalController {
    component: ComponentId,
    hub: Hub,
    topic: Topic,
    prompt: String,
    prompt_host: String,
    events: UnboundedSender<TerminalEvent>,
    inner: Mutex<ControllerInner>,
}

impl TerminalController {
    pub const NAME: &'static str = "TerminalController";

    /// Validates the configuration, subscribes to the result topic and declares
    /// the service dependencies. Bindings may fire, and the terminal may start,
    /// before this returns.
    pub fn configure(
        hub: &Hub,
        config: &TerminalConfig,
        events: UnboundedSender<TerminalEvent>,
    ) -> Result<Arc<Self>> {
        let topic = Topic::parse(&config.topic)?;
        let auth_dependency = if config.auth == Some(true) {
            Dependency::required()
        } else {
            Dependency::optional()
        };

        let mut required = vec![
            <dyn ShellService as Contract>::NAME,
            <dyn StreamService as Contract>::NAME,
        ];
        if auth_dependency.is_required() {
            required.push(<dyn AuthService as Contract>::NAME);
        }

        let controller = Arc::new(Self {
            component: ComponentId::new(Self::NAME),
            hub: hub.clone(),
            topic: topic.clone(),
            prompt: config.prompt.clone(),
            prompt_host: config.prompt_host.clone(),
            events,
            inner: Mutex::new(ControllerInner {
                state: ControllerState::PartiallyBound,
                readiness: Readiness::new(required),
                auth: None,
                shell: None,
                stream: None,
                user: None,
                session: 0,
            }),
        });

        let subscriber = Arc::downgrade(&controller);
        hub.subscribe(&controller.component, &topic, move |message| {
            if let Some(controller) = subscriber.upgrade() {
                controller.receive_result(message);
            }
        });

        // Auth first: it must be known by the time the last required service binds
        Self::require::<dyn AuthService>(&controller, auth_dependency, auth_slot);
        Self::require::<dyn ShellService>(&controller, Dependency::required(), shell_slot);
        Self::require::<dyn StreamService>(&controller, Dependency::required(), stream_slot);

        Ok(controller)
    }

    fn require<C: Contract + ?Sized>(this: &Arc<Self>, dependency: Dependency, slot: SlotFn<C>) {
        let on_bind = Arc::downgrade(this);
        let on_unbind = Arc::downgrade(this);
        this.hub.require_service::<C, _, _>(
            &this.component,
            dependency,
            move |reference| {
                if let Some(controller) = on_bind.upgrade() {
                    controller.bind(reference, slot);
                }
            },
            move |reference| {
                if let Some(controller) = on_unbind.upgrade() {
                    controller.unbind(reference, slot);
                }
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TerminalEvent) {
        if self.events.send(event).is_err() {
            debug!("[{}] UI is gone, event dropped", Self::NAME);
        }
    }

    pub fn state(&self) -> ControllerState {
        self.lock().state
    }

    pub fn user(&self) -> Option<String> {
        self.lock().user.clone()
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    fn bind<C: Contract + ?Sized>(self: &Arc<Self>, reference: ServiceReference<C>, slot: SlotFn<C>) {
        let id = reference.id;
        let ready = {
            let mut inner = self.lock();
            *slot(&mut inner) = Some(Bound {
                id,
                service: reference.service,
            });
            if inner.readiness.bind(C::NAME) && inner.state == ControllerState::PartiallyBound {
                inner.state = ControllerState::Ready;
                true
            } else {
                false
            }
        };

        debug!("[{}] {} bound ({:?})", Self::NAME, C::NAME, id);
        if ready {
            info!("[{}] All required services bound", Self::NAME);
            self.emit(TerminalEvent::StateChanged(ControllerState::Ready));
            self.start();
        }
    }

    fn unbind<C: Contract + ?Sized>(&self, reference: ServiceReference<C>, slot: SlotFn<C>) {
        let (departure, stream) = {
            let mut inner = self.lock();
            if slot(&mut inner).as_ref().map(|bound| bound.id) != Some(reference.id) {
                return;
            }
            // Taken before the slot is cleared, which may be the stream slot itself
            let stream = inner.stream.as_ref().map(|bound| Arc::clone(&bound.service));
            *slot(&mut inner) = None;

            let was_ready = inner.readiness.unbind(C::NAME);
            let departure = if was_ready && inner.state.is_active() {
                inner.state = ControllerState::PartiallyBound;
                Departure::Suspended
            } else if C::NAME == <dyn AuthService as Contract>::NAME
                && inner.state == ControllerState::Ready
            {
                Departure::LoginWithdrawn
            } else {
                Departure::Unchanged
            };
            (departure, stream)
        };

        debug!("[{}] {} unbound ({:?})", Self::NAME, C::NAME, reference.id);
        match departure {
            Departure::Suspended => {
                warn!("[{}] {} went away, terminal suspended", Self::NAME, C::NAME);
                if let Some(stream) = stream {
                    stream.close();
                }
                self.emit(TerminalEvent::StateChanged(ControllerState::PartiallyBound));
            }
            Departure::LoginWithdrawn => {
                info!("[{}] Authentication went away, continuing without login", Self::NAME);
                self.enter_interactive(None);
            }
            Departure::Unchanged => {}
        }
    }

    fn auth(&self) -> Option<Arc<dyn AuthService>> {
        self.lock().auth.as_ref().map(|bound| Arc::clone(&bound.service))
    }

    fn shell(&self) -> Option<Arc<dyn ShellService>> {
        self.lock().shell.as_ref().map(|bound| Arc::clone(&bound.service))
    }

    /// Opens the stream, then either asks for credentials or goes interactive
    fn start(self: &Arc<Self>) {
        let (stream, session) = {
            let mut inner = self.lock();
            inner.session += 1;
            (
                inner.stream.as_ref().map(|bound| Arc::clone(&bound.service)),
                inner.session,
            )
        };

        if let Some(stream) = stream {
            let opened = Arc::downgrade(self);
            let closed = Arc::downgrade(self);
            let result = stream.open(
                Box::new(move || {
                    if let Some(controller) = opened.upgrade() {
                        controller.stream_opened(session);
                    }
                }),
                Box::new(move || {
                    if let Some(controller) = closed.upgrade() {
                        controller.stream_closed(session);
                    }
                }),
            );
            if let Err(e) = result {
                warn!("[{}] Cannot open the result stream: {}", Self::NAME, e);
            }
        }

        if self.auth().is_some() {
            self.emit(TerminalEvent::LoginRequired);
        } else {
            self.enter_interactive(None);
        }
    }

    fn is_current_session(&self, session: u64) -> bool {
        let current = self.lock().session;
        if current != session {
            debug!(
                "[{}] Ignoring stream callback of session {} (current {})",
                Self::NAME,
                session,
                current
            );
        }
        current == session
    }

    fn stream_opened(&self, session: u64) {
        if !self.is_current_session(session) {
            return;
        }
        info!("[{}] Result stream open", Self::NAME);
        self.emit(TerminalEvent::StreamOpened);
        self.emit(TerminalEvent::Echo(CONNECTED_BANNER.to_string()));
        self.emit(TerminalEvent::Echo(String::new()));
    }

    fn stream_closed(&self, session: u64) {
        if !self.is_current_session(session) {
            return;
        }
        info!("[{}] Result stream closed", Self::NAME);
        let active = self.state().is_active();
        self.emit(TerminalEvent::StreamClosed);
        if active {
            self.emit(TerminalEvent::Error(CONNECTION_LOST.to_string()));
        }
    }

    fn prompt_for(&self, user: Option<&str>) -> String {
        match user {
            Some(user) => format!("\u{1b}[33m{}@{}\u{1b}[0m ~> ", user, self.prompt_host),
            None => self.prompt.clone(),
        }
    }

    fn enter_interactive(&self, user: Option<&str>) {
        {
            let mut inner = self.lock();
            if inner.state != ControllerState::Ready {
                debug!("[{}] Not entering interactive mode from {}", Self::NAME, inner.state);
                return;
            }
            inner.state = ControllerState::Interactive;
            inner.user = user.map(ToString::to_string);
        }
        self.emit(TerminalEvent::StateChanged(ControllerState::Interactive));
        self.emit(TerminalEvent::Prompt(self.prompt_for(user)));
    }

    /// Logs in through the bound auth service
    pub async fn login(&self, user: &str, password: &str) -> Result<LoginOutcome> {
        let state = self.state();
        if state != ControllerState::Ready {
            return Err(ShellError::Unreachable(format!("cannot log in while {state}")));
        }
        let Some(auth) = self.auth() else {
            return Err(ShellError::Unreachable(
                "no authentication service bound".to_string(),
            ));
        };

        let outcome = auth.login(user, password).await;

        // The terminal may have been suspended while the request was in flight
        if self.state() != ControllerState::Ready {
            debug!("[{}] Login answered after leaving the ready state", Self::NAME);
            return Ok(outcome);
        }

        match &outcome {
            LoginOutcome::Authenticated { .. } => self.enter_interactive(Some(user)),
            LoginOutcome::Rejected { status, error } => {
                warn!("[{}] Login rejected ({:?}): {}", Self::NAME, status, error);
                self.emit(TerminalEvent::Error(format!("Authentication failed: {error}")));
                self.emit(TerminalEvent::LoginRequired);
            }
        }
        Ok(outcome)
    }

    /// Interprets one input line
    pub async fn interpret(&self, line: &str) -> Result<Dispatch> {
        let line = line.trim();
        let mut tokens = line.split(' ');
        let head = tokens.next().unwrap_or_default();
        if head.is_empty() {
            return Ok(Dispatch::Empty);
        }

        let shell = {
            let inner = self.lock();
            match inner.state {
                ControllerState::Interactive => inner.shell.as_ref().map(|b| Arc::clone(&b.service)),
                ControllerState::Ready if inner.auth.is_some() => {
                    return Err(ShellError::NotAuthenticated)
                }
                state => {
                    return Err(ShellError::Unreachable(format!("terminal is {state}")))
                }
            }
        };
        let Some(shell) = shell else {
            return Err(ShellError::Unreachable("no shell service bound".to_string()));
        };

        if head == "exit" {
            self.exit().await;
            return Ok(Dispatch::Exited);
        }

        let known = shell
            .commands()
            .is_some_and(|commands| commands.iter().any(|command| command == head));
        if !known {
            self.emit(TerminalEvent::Error(format!("unknown command '{line}'")));
            return Ok(Dispatch::Unknown(head.to_string()));
        }

        let args = tokens.collect::<Vec<_>>().join(" ");
        debug!("[{}] exec {} {}", Self::NAME, head, args);
        shell.exec(head, &args).await;
        Ok(Dispatch::Executed {
            command: head.to_string(),
            args,
        })
    }

    /// Closes the stream, logs out when logged in, then leaves the hub
    pub async fn exit(&self) {
        let (stream, auth) = {
            let mut inner = self.lock();
            if inner.state == ControllerState::Unbound {
                return;
            }
            inner.state = ControllerState::Exiting;
            (
                inner.stream.as_ref().map(|b| Arc::clone(&b.service)),
                inner.auth.as_ref().map(|b| Arc::clone(&b.service)),
            )
        };
        self.emit(TerminalEvent::StateChanged(ControllerState::Exiting));

        if let Some(stream) = stream {
            stream.close();
        }
        if let Some(auth) = auth {
            if auth.is_logged() {
                auth.logout().await;
            }
        }

        self.hub.unregister(&self.component);
        {
            let mut inner = self.lock();
            inner.state = ControllerState::Unbound;
            inner.readiness.clear();
            inner.auth = None;
            inner.shell = None;
            inner.stream = None;
            inner.user = None;
        }
        info!("[{}] Exited", Self::NAME);
        self.emit(TerminalEvent::StateChanged(ControllerState::Unbound));
        self.emit(TerminalEvent::Exited);
    }

    /// Completion candidates for the current input line
    pub fn complete(&self, line: &str) -> Option<Vec<String>> {
        self.shell()?.auto_complete(line)
    }

    fn receive_result(&self, message: &Message) {
        match decode_frame(&message.data) {
            Frame::Result(text) => self.emit(TerminalEvent::Echo(text)),
            Frame::Error(text) => self.emit(TerminalEvent::Error(text)),
            Frame::Unrecognized => {
                debug!("[{}] Ignoring unrecognized frame", Self::NAME);
            }
        }
    }
}
