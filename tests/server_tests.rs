//! Live-server tests: bind on an ephemeral port and drive the API over real
//! HTTP with reqwest.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_test::assert_ok;

use snapshot_debugger::web::Server;
use snapshot_debugger::{AppState, Config};

async fn spawn_server(max_body_bytes: usize) -> (TempDir, SocketAddr) {
    let dir = TempDir::new().unwrap();
    let config = Config {
        port: 0,
        storage_dir: dir.path().join("snaps"),
        max_body_bytes,
        ..Config::default()
    };
    let state = Arc::new(AppState::new(config).unwrap());
    let server = Server::bind(state).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (dir, addr)
}

#[tokio::test]
async fn test_landing_page() {
    let (_dir, addr) = spawn_server(1 << 20).await;
    let resp = assert_ok!(reqwest::get(format!("http://{addr}/")).await);
    assert_eq!(resp.status().as_u16(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("<title>Snapshot Debugger</title>"));
}

#[tokio::test]
async fn test_capture_records_client_details() {
    let (_dir, addr) = spawn_server(1 << 20).await;
    let client = reqwest::Client::new();

    let resp = assert_ok!(
        client
            .post(format!("http://{addr}/snapshot?source=cli"))
            .header("User-Agent", "snapshot-tests/1.0")
            .header("Cookie", "session=abc")
            .json(&json!({"label": "live", "tags": ["e2e"], "memory": {"queue": 2}}))
            .send()
            .await
    );
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Snapshot created");
    let id = body["snapshot_id"].as_str().unwrap().to_string();

    let snap: Value = client
        .get(format!("http://{addr}/snapshot/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snap["label"], "live");
    assert_eq!(snap["tags"], json!(["e2e"]));
    assert_eq!(snap["memory"], json!({"queue": 2}));
    assert_eq!(snap["request"]["args"]["source"], "cli");
    assert_eq!(snap["request"]["user_agent"], "snapshot-tests/1.0");
    assert_eq!(snap["request"]["ip"], "127.0.0.1");
    assert_eq!(snap["request"]["json"]["label"], "live");

    let headers = snap["request"]["headers"].as_object().unwrap();
    let cookie = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("cookie"))
        .map(|(_, v)| v.clone());
    assert_eq!(cookie, Some(json!("[REDACTED]")));
}

#[tokio::test]
async fn test_manual_snapshot_replay_over_http() {
    let (_dir, addr) = spawn_server(1 << 20).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(format!("http://{addr}/snapshot/manual"))
        .json(&json!({"path": "/api/pay", "json": {"amount": 10, "user_id": "u9"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["snapshot_id"].as_str().unwrap();

    let expected = json!({"amount": 10, "user_id": "u9", "status": "replayed"});
    let resp = assert_ok!(
        client
            .post(format!("http://{addr}/snapshot/{id}/expected"))
            .json(&json!({"expected_output": expected}))
            .send()
            .await
    );
    assert_eq!(resp.status().as_u16(), 200);

    let replay: Value = client
        .post(format!("http://{addr}/snapshot/{id}/replay"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replay["match"], true);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let (_dir, addr) = spawn_server(64).await;
    let resp = assert_ok!(
        reqwest::Client::new()
            .post(format!("http://{addr}/snapshot/manual"))
            .json(&json!({"json": {"blob": "x".repeat(256)}}))
            .send()
            .await
    );
    assert_eq!(resp.status().as_u16(), 413);

    let errors: Value = reqwest::get(format!("http://{addr}/debug/errors"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(errors["errors"][0]["error_type"], "PayloadTooLarge");
}

#[tokio::test]
async fn test_concurrent_tagging_keeps_every_tag() {
    let (_dir, addr) = spawn_server(1 << 20).await;
    let client = reqwest::Client::new();
    let created: Value = client
        .post(format!("http://{addr}/snapshot/manual"))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["snapshot_id"].as_str().unwrap().to_string();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        let url = format!("http://{addr}/snapshot/{id}/tag");
        tasks.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({"tags": [format!("t{i}")]}))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 200);
    }

    let snap: Value = client
        .get(format!("http://{addr}/snapshot/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snap["tags"].as_array().unwrap().len(), 8);
}
