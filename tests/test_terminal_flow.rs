// ABOUTME: End-to-end tests wiring real providers and the terminal controller through one hub
// HTTP endpoints come from wiremock, the result stream from a local WebSocket server

use futures_util::{SinkExt, StreamExt};
use hubshell::error::ShellError;
use hubshell::hub::Hub;
use hubshell::providers::{
    AuthConfig, AuthProvider, ReconnectPolicy, ShellConfig, ShellProvider, StreamConfig,
    StreamProvider,
};
use hubshell::terminal::{ControllerState, Dispatch, TerminalConfig, TerminalController, TerminalEvent};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "/monitor/terminal";
const TOPIC: &str = "/monitor/terminal/stream";
const WAIT: Duration = Duration::from_secs(5);

async fn ws_server(frames: Vec<&'static str>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });
    format!("http://{address}")
}

async fn http_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/monitor/terminal/command"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["help", "ls"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/command/ls"))
        .respond_with(ResponseTemplate::new(200).set_body_string("res:bundle1 bundle2"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("token"))
        .mount(&server)
        .await;
    server
}

/// Waits for the next event matching `wanted`, skipping the others
async fn wait_for(
    rx: &mut UnboundedReceiver<TerminalEvent>,
    wanted: impl Fn(&TerminalEvent) -> bool,
) -> TerminalEvent {
    loop {
        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        if wanted(&event) {
            return event;
        }
    }
}

fn terminal_config(auth: Option<bool>) -> TerminalConfig {
    TerminalConfig {
        topic: TOPIC.to_string(),
        auth,
        prompt: "> ".to_string(),
        prompt_host: "server".to_string(),
    }
}

fn stream_config(server: String) -> StreamConfig {
    StreamConfig {
        server,
        root: ROOT.to_string(),
        topic: TOPIC.to_string(),
        reconnect: ReconnectPolicy::Never,
    }
}

#[tokio::test]
async fn test_command_results_reach_the_terminal() {
    let http = http_server().await;
    let ws = ws_server(vec!["res:streamed \u{1b}[32;0m"]).await;

    let hub = Hub::new();
    let (tx, mut events) = mpsc::unbounded_channel();
    let controller = TerminalController::configure(&hub, &terminal_config(Some(false)), tx).unwrap();

    let shell = ShellProvider::configure(
        &hub,
        &ShellConfig {
            server: http.uri(),
            root: ROOT.to_string(),
            topic: TOPIC.to_string(),
            completions: None,
        },
    )
    .unwrap();
    shell.start().await;
    let stream = StreamProvider::configure(&hub, &stream_config(ws)).unwrap();

    assert_eq!(controller.state(), ControllerState::Interactive);
    wait_for(&mut events, |e| *e == TerminalEvent::StreamOpened).await;
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, TerminalEvent::Echo(text) if text.starts_with("streamed"))).await,
        TerminalEvent::Echo("streamed \u{1b}[0m".to_string())
    );

    assert_eq!(
        controller.interpret("ls -l").await,
        Ok(Dispatch::Executed {
            command: "ls".to_string(),
            args: "-l".to_string()
        })
    );
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, TerminalEvent::Echo(_))).await,
        TerminalEvent::Echo("bundle1 bundle2".to_string())
    );

    assert_eq!(
        controller.interpret("nope").await,
        Ok(Dispatch::Unknown("nope".to_string()))
    );
    assert_eq!(controller.complete("h"), Some(vec!["help".to_string()]));

    stream.stop();
    assert_eq!(controller.state(), ControllerState::PartiallyBound);
    assert!(matches!(
        controller.interpret("ls").await,
        Err(ShellError::Unreachable(_))
    ));
}

#[tokio::test]
async fn test_login_then_exit_logs_out() {
    let http = http_server().await;
    Mock::given(method("GET"))
        .and(path("/monitor/terminal/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&http)
        .await;
    let ws = ws_server(vec![]).await;

    let hub = Hub::new();
    let (tx, mut events) = mpsc::unbounded_channel();
    let controller = TerminalController::configure(&hub, &terminal_config(Some(true)), tx).unwrap();

    let _auth = AuthProvider::configure(
        &hub,
        &AuthConfig {
            server: http.uri(),
            root: ROOT.to_string(),
        },
    )
    .unwrap();
    let shell = ShellProvider::configure(
        &hub,
        &ShellConfig {
            server: http.uri(),
            root: ROOT.to_string(),
            topic: TOPIC.to_string(),
            completions: None,
        },
    )
    .unwrap();
    shell.start().await;
    let _stream = StreamProvider::configure(&hub, &stream_config(ws)).unwrap();

    wait_for(&mut events, |e| *e == TerminalEvent::LoginRequired).await;
    assert_eq!(controller.interpret("ls").await, Err(ShellError::NotAuthenticated));

    let outcome = controller.login("admin", "secret").await.unwrap();
    assert!(outcome.is_authenticated());
    assert_eq!(controller.state(), ControllerState::Interactive);
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, TerminalEvent::Prompt(_))).await,
        TerminalEvent::Prompt("\u{1b}[33madmin@server\u{1b}[0m ~> ".to_string())
    );

    assert_eq!(controller.interpret("exit").await, Ok(Dispatch::Exited));
    assert_eq!(controller.state(), ControllerState::Unbound);
    wait_for(&mut events, |e| *e == TerminalEvent::Exited).await;
}
