// ABOUTME: Stream provider owning the single WebSocket connection that carries asynchronous command results
// Inbound frames are republished verbatim on the hub topic; interpretation is left to the terminal

use crate::error::{Result, ShellError};
use crate::hub::{ComponentId, Hub, Message, Properties, RootPath, Topic};
use crate::services::{StreamCallback, StreamService};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Slot = Arc<Mutex<Option<StreamHandle>>>;

/// What to do when the connection drops without being closed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    #[default]
    Never,
    Backoff {
        max_attempts: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based), `None` to give up
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Backoff {
                max_attempts,
                initial_delay_ms,
                max_delay_ms,
            } => (attempt < max_attempts).then(|| {
                let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                Duration::from_millis(initial_delay_ms.saturating_mul(factor).min(max_delay_ms))
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub server: String,
    pub root: String,
    pub topic: String,
    pub reconnect: ReconnectPolicy,
}

struct StreamHandle {
    generation: u64,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Requested,
    Lost,
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<StreamHandle>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Derives `ws(s)://host[:port]{root}/stream` from the server base URL
fn stream_endpoint(server: &str, root: &RootPath) -> Result<String> {
    let mut url = Url::parse(server)
        .map_err(|e| ShellError::Config(format!("invalid server url '{server}': {e}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|()| ShellError::Config(format!("cannot derive a stream url from '{server}'")))?;
    url.set_path(&root.join("/stream"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Everything the connection task needs, detached from the provider
struct StreamSession {
    endpoint: String,
    hub: Hub,
    component: ComponentId,
    topic: Topic,
    reconnect: ReconnectPolicy,
    slot: Slot,
    generation: u64,
}

impl StreamSession {
    async fn run(
        self,
        mut shutdown: oneshot::Receiver<()>,
        on_open: StreamCallback,
        on_close: StreamCallback,
    ) {
        let mut on_open = Some(on_open);
        let mut attempt = 0u32;

        loop {
            let connecting = tokio::select! {
                _ = &mut shutdown => None,
                result = connect_async(self.endpoint.as_str()) => Some(result),
            };

            let end = match connecting {
                None => ConnectionEnd::Requested,
                Some(Ok((socket, response))) => {
                    info!(
                        "[{}] Stream open on {} ({})",
                        StreamProvider::NAME,
                        self.endpoint,
                        response.status()
                    );
                    attempt = 0;
                    if let Some(callback) = on_open.take() {
                        callback();
                    }
                    self.pump(socket, &mut shutdown).await
                }
                Some(Err(e)) => {
                    warn!(
                        "[{}] Cannot open stream on {}: {}",
                        StreamProvider::NAME,
                        self.endpoint,
                        e
                    );
                    ConnectionEnd::Lost
                }
            };

            if end == ConnectionEnd::Requested {
                break;
            }

            let Some(delay) = self.reconnect.delay_for(attempt) else {
                break;
            };
            attempt += 1;
            info!(
                "[{}] Reconnecting in {:?} (attempt {})",
                StreamProvider::NAME,
                delay,
                attempt
            );
            tokio::select! {
                _ = &mut shutdown => break,
                () = sleep(delay) => {}
            }
        }

        self.release();
        info!("[{}] Stream closed", StreamProvider::NAME);
        on_close();
    }

    async fn pump(&self, socket: Socket, shutdown: &mut oneshot::Receiver<()>) -> ConnectionEnd {
        let (mut sink, mut frames) = socket.split();

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    if let Err(e) = sink.send(tungstenite::Message::Close(None)).await {
                        debug!("[{}] Close frame not sent: {}", StreamProvider::NAME, e);
                    }
                    return ConnectionEnd::Requested;
                }
                frame = frames.next() => match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => self.republish(text),
                    Some(Ok(tungstenite::Message::Binary(bytes))) => {
                        self.republish(String::from_utf8_lossy(&bytes).into_owned());
                    }
                    Some(Ok(tungstenite::Message::Close(_))) | None => {
                        info!("[{}] Stream closed by the server", StreamProvider::NAME);
                        return ConnectionEnd::Lost;
                    }
                    // Ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("[{}] Stream error: {}", StreamProvider::NAME, e);
                        return ConnectionEnd::Lost;
                    }
                }
            }
        }
    }

    fn republish(&self, frame: String) {
        self.hub
            .publish(&self.component, &self.topic, Message::new(frame));
    }

    fn release(&self) {
        let mut slot = lock(&self.slot);
        if slot
            .as_ref()
            .is_some_and(|handle| handle.generation == self.generation)
        {
            *slot = None;
        }
    }
}

pub struct StreamProvider {
    component: ComponentId,
    hub: Hub,
    topic: Topic,
    endpoint: String,
    reconnect: ReconnectPolicy,
    slot: Slot,
    generation: AtomicU64,
}

impl StreamProvider {
    pub const NAME: &'static str = "StreamProvider";

    pub fn configure(hub: &Hub, config: &StreamConfig) -> Result<Arc<Self>> {
        let root = RootPath::parse(&config.root)?;
        let topic = Topic::parse(&config.topic)?;
        let endpoint = stream_endpoint(&config.server, &root)?;

        let provider = Arc::new(Self {
            component: ComponentId::new(Self::NAME),
            hub: hub.clone(),
            topic,
            endpoint,
            reconnect: config.reconnect,
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        });

        let mut properties = Properties::new();
        properties.insert("root".to_string(), json!(root.as_str()));
        properties.insert("endpoint".to_string(), json!(provider.endpoint));
        hub.provide_service::<dyn StreamService>(
            &provider.component,
            Arc::clone(&provider) as Arc<dyn StreamService>,
            properties,
        );

        Ok(provider)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Closes any connection and withdraws the provider from the hub
    pub fn stop(&self) {
        self.close();
        self.hub.unregister(&self.component);
    }
}

impl StreamService for StreamProvider {
    fn open(&self, on_open: StreamCallback, on_close: StreamCallback) -> Result<()> {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return Err(ShellError::AlreadyOpen);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ShellError::Unreachable(format!("no runtime to drive the stream: {e}")))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown, shutdown_rx) = oneshot::channel();
        let session = StreamSession {
            endpoint: self.endpoint.clone(),
            hub: self.hub.clone(),
            component: self.component.clone(),
            topic: self.topic.clone(),
            reconnect: self.reconnect,
            slot: Arc::clone(&self.slot),
            generation,
        };

        debug!("[{}] Opening {}", Self::NAME, self.endpoint);
        let task = runtime.spawn(session.run(shutdown_rx, on_open, on_close));
        *slot = Some(StreamHandle {
            generation,
            shutdown,
            task,
        });
        Ok(())
    }

    fn close(&self) {
        let Some(handle) = lock(&self.slot).take() else {
            debug!("[{}] No stream to close", Self::NAME);
            return;
        };
        if handle.shutdown.send(()).is_err() {
            debug!("[{}] Stream task already finished", Self::NAME);
        }
        info!("[{}] Closing stream {}", Self::NAME, self.endpoint);
    }

    fn is_open(&self) -> bool {
        lock(&self.slot).is_some()
    }

    fn topic(&self) -> Topic {
        self.topic.clone()
    }
}

impl Drop for StreamProvider {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.slot).take() {
            handle.task.abort();
        }
    }
}
