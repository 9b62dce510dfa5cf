use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::Value;
use serial_test::serial;
use testkit::{UpstreamBehavior, free_port, spawn_fake_devto};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_newsmirror")
}

fn spawn_server(port: u16, devto_url: &str) -> Child {
    let mongo_port = free_port();
    Command::new(bin())
        .arg("serve")
        .arg("--bind-addr")
        .arg(format!("127.0.0.1:{port}"))
        .env("ENV_FILE", "/nonexistent/newsmirror.env")
        .env(
            "MONGO_URI",
            format!("mongodb://127.0.0.1:{mongo_port}/?serverSelectionTimeoutMS=300"),
        )
        .env("DEVTO_API_URL", devto_url)
        .env("LOG_LEVEL", "WARNING")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

async fn wait_ready(port: u16, child: &mut Child) {
    let client = reqwest::Client::new();
    let mut ready = false;
    for _ in 0..100 {
        assert!(child.try_wait().unwrap().is_none(), "newsmirror exited early");
        if client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await
            .is_ok()
        {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ready, "http endpoint not ready");
}

#[tokio::test]
#[serial]
async fn e2e_serves_without_telemetry_database() {
    let fake = spawn_fake_devto(UpstreamBehavior::Articles(7))
        .await
        .unwrap();
    let port = free_port();
    let mut child = spawn_server(port, &fake.url());
    wait_ready(port, &mut child).await;

    let client = reqwest::Client::new();
    let health = client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status().as_u16(), 200);
    let body: Value = health.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let news = client
        .get(format!("http://127.0.0.1:{port}/news?tag=rust&per_page=4"))
        .send()
        .await
        .unwrap();
    assert_eq!(news.status().as_u16(), 200);
    let body: Value = news.json().await.unwrap();
    assert_eq!(body["source"], "DEV.to");
    assert_eq!(body["tag"], "rust");
    assert_eq!(body["count"], 4);
    assert_eq!(body["articles"].as_array().unwrap().len(), 4);
    assert_eq!(fake.hits(), 1);

    let _ = child.kill();
    let _ = child.wait();
}

#[tokio::test]
#[serial]
async fn e2e_rejects_bad_page_size_and_relays_upstream_errors() {
    let fake = spawn_fake_devto(UpstreamBehavior::Status(503))
        .await
        .unwrap();
    let port = free_port();
    let mut child = spawn_server(port, &fake.url());
    wait_ready(port, &mut child).await;

    let client = reqwest::Client::new();
    let rejected = client
        .get(format!("http://127.0.0.1:{port}/news?per_page=31"))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status().as_u16(), 422);
    assert_eq!(fake.hits(), 0);

    let relayed = client
        .get(format!("http://127.0.0.1:{port}/news"))
        .send()
        .await
        .unwrap();
    assert_eq!(relayed.status().as_u16(), 503);
    let body: Value = relayed.json().await.unwrap();
    assert_eq!(body["detail"], "Upstream error from DEV.to API");

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
#[serial]
fn check_fails_when_database_unreachable() {
    let mongo_port = free_port();
    let output = Command::new(bin())
        .arg("check")
        .env("ENV_FILE", "/nonexistent/newsmirror.env")
        .env(
            "MONGO_URI",
            format!("mongodb://127.0.0.1:{mongo_port}/?serverSelectionTimeoutMS=300"),
        )
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("status=ok"));
}
