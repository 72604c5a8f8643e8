//! Instances started against real listeners.

use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use bucketing_proxy::client::{ClientEvent, PushEvent};
use bucketing_proxy::config::{ProxyConfig, ProxyInstance};
use bucketing_proxy::lifecycle::{close_all, start_all};
use bucketing_proxy::net::ListenerError;
use bucketing_proxy::{Instance, InstanceError};

mod common;
use common::{MockClient, MockFactory};

fn http_instance(port: u16) -> ProxyInstance {
    let mut instance = common::instance();
    instance.http_enabled = true;
    instance.http_port = port;
    instance
}

fn socket_instance(dir: &tempfile::TempDir, permissions: &str) -> ProxyInstance {
    let mut instance = common::instance();
    instance.unix_socket_enabled = true;
    instance.unix_socket_path = dir.path().join("proxy.sock").display().to_string();
    instance.unix_socket_permissions = permissions.to_string();
    instance
}

#[tokio::test]
async fn http_instance_answers_health_checks() {
    let factory = MockFactory::new(MockClient::default());
    let port = common::free_port();
    let instance = Instance::start(http_instance(port), &factory).await.unwrap();
    assert_eq!(instance.http_addr().unwrap().port(), port);

    let response = common::http_client()
        .get(format!("http://127.0.0.1:{port}/healthz"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.bytes().await.unwrap().is_empty());

    instance.close().await;
    assert!(factory.client.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unix_socket_instance_applies_permissions_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockFactory::new(MockClient::default());
    let instance = Instance::start(socket_instance(&dir, "0700"), &factory)
        .await
        .unwrap();
    let path = instance.socket_path().unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream
        .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200 OK"));

    close_all(vec![instance]).await;
    assert!(!path.exists());
}

#[tokio::test]
async fn existing_socket_path_fails_before_client_is_built() {
    let dir = tempfile::tempdir().unwrap();
    let config = socket_instance(&dir, "0755");
    std::fs::write(&config.unix_socket_path, b"").unwrap();

    let factory = MockFactory::new(MockClient::default());
    let err = Instance::start(config, &factory).await.err().unwrap();
    assert!(matches!(
        err,
        InstanceError::Listener(ListenerError::SocketExists(_))
    ));
    assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn client_construction_failure_is_reported() {
    let factory = MockFactory::failing();
    let err = Instance::start(http_instance(common::free_port()), &factory).await.err().unwrap();
    assert!(matches!(err, InstanceError::Client(_)));
    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_instance_rolls_back_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let broken = socket_instance(&dir, "0755");
    std::fs::write(&broken.unix_socket_path, b"").unwrap();

    let port = common::free_port();
    let config = ProxyConfig {
        instances: vec![http_instance(port), broken],
    };
    let factory = MockFactory::new(MockClient::default());
    assert!(start_all(config, &factory).await.is_err());

    assert!(factory.client.closed.load(Ordering::SeqCst));
    let rebound = tokio::net::TcpListener::bind(("0.0.0.0", port)).await;
    assert!(rebound.is_ok());
}

#[tokio::test]
async fn instance_log_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("instance.log");
    let mut config = http_instance(common::free_port());
    config.log_file = log_path.display().to_string();

    let factory = MockFactory::new(MockClient::default());
    let instance = Instance::start(config, &factory).await.unwrap();
    assert!(log_path.exists());
    instance.close().await;
}

#[tokio::test]
async fn realtime_updates_reach_stream_subscribers() {
    let port = common::free_port();
    let mut config = http_instance(port);
    config.sse_enabled = true;
    let factory = MockFactory::new(MockClient::default());
    let instance = Instance::start(config, &factory).await.unwrap();

    let mut response = common::http_client()
        .get(format!("http://127.0.0.1:{port}/event-stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let sink = factory.client.sink().unwrap();
    sink.send(ClientEvent::ConfigUpdated {
        etag: "\"e2\"".to_string(),
    })
    .await
    .unwrap();
    sink.send(ClientEvent::RealtimeUpdate(PushEvent::message(
        r#"{"type":"refetchConfig"}"#,
    )))
    .await
    .unwrap();

    let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&chunk),
        "data: {\"type\":\"refetchConfig\"}\n\n"
    );

    drop(sink);
    instance.close().await;
}
