// ABOUTME: Integration tests for the shell provider: catalog fetch, remote exec and completions

use hubshell::hub::{ComponentId, Hub, Topic};
use hubshell::providers::{ShellConfig, ShellProvider};
use hubshell::services::ShellService;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOPIC: &str = "/monitor/terminal/stream";

fn config(server: &MockServer, completions: Option<&str>) -> ShellConfig {
    ShellConfig {
        server: server.uri(),
        root: "/monitor/terminal".to_string(),
        topic: TOPIC.to_string(),
        completions: completions.map(ToString::to_string),
    }
}

/// Collects every message published on the result topic
fn listen(hub: &Hub) -> Arc<Mutex<Vec<String>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    hub.subscribe(
        &ComponentId::new("listener"),
        &Topic::parse(TOPIC).unwrap(),
        move |message| sink.lock().unwrap().push(message.data.clone()),
    );
    received
}

async fn mount_catalog(server: &MockServer, commands: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/monitor/terminal/command"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(commands)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_start_fetches_catalog_and_completions() {
    let server = MockServer::start().await;
    mount_catalog(&server, &["help", "instance", "factory"]).await;
    Mock::given(method("GET"))
        .and(path("/monitor/ipojo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instances": [{"name": "logger"}, {"name": "Listener"}],
            "factories": [
                {"name": "LoggerFactory", "handler": false},
                {"name": "HandlerFactory", "handler": true}
            ]
        })))
        .mount(&server)
        .await;

    let hub = Hub::new();
    let shell = ShellProvider::configure(&hub, &config(&server, Some("/monitor/ipojo.json"))).unwrap();
    assert_eq!(shell.commands(), None);

    shell.start().await;

    assert_eq!(
        shell.commands(),
        Some(vec![
            "help".to_string(),
            "instance".to_string(),
            "factory".to_string()
        ])
    );
    assert_eq!(
        shell.auto_complete("instance l"),
        Some(vec!["logger".to_string(), "Listener".to_string()])
    );
    assert_eq!(
        shell.auto_complete("factory "),
        Some(vec!["LoggerFactory".to_string()])
    );
}

#[tokio::test]
async fn test_failed_catalog_leaves_commands_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/monitor/terminal/command"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let hub = Hub::new();
    let shell = ShellProvider::configure(&hub, &config(&server, None)).unwrap();
    shell.start().await;

    assert_eq!(shell.commands(), None);
    assert_eq!(shell.auto_complete("he"), None);
}

#[tokio::test]
async fn test_exec_posts_args_and_publishes_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/command/ls"))
        .and(body_json(json!("-a -l")))
        .respond_with(ResponseTemplate::new(200).set_body_string("res:file1 file2"))
        .expect(1)
        .mount(&server)
        .await;

    let hub = Hub::new();
    let received = listen(&hub);
    let shell = ShellProvider::configure(&hub, &config(&server, None)).unwrap();

    shell.exec("ls", "-a -l").await;

    assert_eq!(*received.lock().unwrap(), vec!["res:file1 file2".to_string()]);
}

#[tokio::test]
async fn test_exec_without_result_publishes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/command/start"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/command/stop"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let hub = Hub::new();
    let received = listen(&hub);
    let shell = ShellProvider::configure(&hub, &config(&server, None)).unwrap();

    shell.exec("start", "").await;
    shell.exec("stop", "").await;

    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_exec_failure_is_logged_not_published() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/command/crash"))
        .respond_with(ResponseTemplate::new(500).set_body_string("err:internal"))
        .expect(1)
        .mount(&server)
        .await;

    let hub = Hub::new();
    let received = listen(&hub);
    let shell = ShellProvider::configure(&hub, &config(&server, None)).unwrap();

    shell.exec("crash", "").await;

    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_structured_result_is_republished_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitor/terminal/command/help"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "usage"})))
        .mount(&server)
        .await;

    let hub = Hub::new();
    let received = listen(&hub);
    let shell = ShellProvider::configure(&hub, &config(&server, None)).unwrap();

    shell.exec("help", "").await;

    assert_eq!(*received.lock().unwrap(), vec![r#"{"result":"usage"}"#.to_string()]);
}

#[test]
fn test_registration_carries_root_and_topic() {
    let hub = Hub::new();
    let _shell = ShellProvider::configure(
        &hub,
        &ShellConfig {
            server: "http://localhost:9000".to_string(),
            root: "/monitor/terminal".to_string(),
            topic: TOPIC.to_string(),
            completions: None,
        },
    )
    .unwrap();

    let reference = hub.get_service::<dyn ShellService>().unwrap();
    assert_eq!(reference.properties["topic"], json!(TOPIC));
    assert_eq!(reference.service.topic().as_str(), TOPIC);
}
