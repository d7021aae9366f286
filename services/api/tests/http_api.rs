mod common;

use callbridge_core::{provision::ProvisionError, webhook};
use common::*;
use serde_json::{Value, json};

const EVENT: &str = r#"{"message":{"type":"status-update","status":"ended"}}"#;

#[tokio::test]
async fn test_health() {
    let addr = spawn_app(test_config(), unused_provisioner()).await;
    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_ws_entry_defaults() {
    let addr = spawn_app(test_config(), unused_provisioner()).await;
    let body: Value = reqwest::get(format!("http://{addr}/ws-entry"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["action"], "Stream");
    assert_eq!(body["chunk_size"], 1000);
    assert_eq!(
        body["ws_url"],
        format!("wss://{addr}/frejun?fmt=json&mode=bridge&vapiSr=16000&frejunSr=8000&frejunFmt=pcm")
    );
}

#[tokio::test]
async fn test_ws_entry_echoes_negotiated_format_on_public_host() {
    let config = callbridge_api::config::Config {
        public_host: Some("bridge.example.com".to_string()),
        ..test_config()
    };
    let addr = spawn_app(config, unused_provisioner()).await;
    let body: Value = reqwest::Client::new()
        .post(format!(
            "http://{addr}/ws-entry?fmt=bin&mode=tone&frejunSr=16000&vapiSr=999999&frejunFmt=mulaw"
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        body["ws_url"],
        "wss://bridge.example.com/frejun?fmt=bin&mode=tone&vapiSr=16000&frejunSr=16000&frejunFmt=mulaw"
    );
}

#[tokio::test]
async fn test_stream_endpoint_upstream_failure_is_bad_gateway() {
    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_provision()
        .times(1)
        .returning(|_, _| Err(ProvisionError::MissingAddress));
    let addr = spawn_app(test_config(), provisioner).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/exotel/stream-endpoint"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_stream_endpoint_passes_assistant_and_rate() {
    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_provision()
        .withf(|assistant_id, rate| assistant_id == "asst-test" && *rate == 24000)
        .times(1)
        .returning(|_, _| Ok("ws://127.0.0.1:9/media".to_string()));
    let addr = spawn_app(test_config(), provisioner).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/exotel/stream-endpoint?vapiSr=24000"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap();
    let token = url.rsplit("/ws/").next().unwrap();
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_webhook_without_secret_accepts_anything() {
    let addr = spawn_app(test_config(), unused_provisioner()).await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/webhook"))
        .body(EVENT)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "received": true }));
}

#[tokio::test]
async fn test_webhook_signature_checked_when_secret_set() {
    let config = callbridge_api::config::Config {
        webhook_secret: Some("shh".to_string()),
        ..test_config()
    };
    let addr = spawn_app(config, unused_provisioner()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/webhook");
    let signature = webhook::sign("shh", EVENT.as_bytes());

    let accepted = client
        .post(&url)
        .header(webhook::SIGNATURE_HEADER, &signature)
        .body(EVENT)
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), 200);

    let tampered = client
        .post(&url)
        .header(webhook::SIGNATURE_HEADER, &signature)
        .body(EVENT.replace("ended", "started"))
        .send()
        .await
        .unwrap();
    assert_eq!(tampered.status(), 401);

    let unsigned = client.post(&url).body(EVENT).send().await.unwrap();
    assert_eq!(unsigned.status(), 401);
}
