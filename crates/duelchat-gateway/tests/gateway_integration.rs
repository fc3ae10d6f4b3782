#![allow(clippy::unwrap_used, clippy::expect_used)]

use duelchat_core::PersonaCatalog;
use duelchat_engine::ScriptedBackend;
use duelchat_gateway::{GatewayServer, HealthRegistry, ServingStatus};
use duelchat_session::{SessionStore, StoreConfig};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Helper: build a test server on a random port over a scripted backend.
async fn start_test_server() -> (String, Arc<ScriptedBackend>, Arc<HealthRegistry>) {
    let backend = Arc::new(ScriptedBackend::new());
    let store = SessionStore::new(
        Arc::new(PersonaCatalog::builtin()),
        backend.clone(),
        StoreConfig {
            session_timeout: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
            shutdown_grace: Duration::from_millis(500),
        },
    );
    let health = Arc::new(HealthRegistry::new());
    let app = GatewayServer::build(store, health.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let addr_str = format!("127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Small yield to let the server task start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr_str, backend, health)
}

async fn create_session(client: &reqwest::Client, addr: &str) -> String {
    let resp = client
        .post(format!("http://{addr}/v1/sessions"))
        .json(&serde_json::json!({
            "character_role": "Vargon",
            "opponent_role": "Kagetsu",
            "language": "english"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_session_scenario_create_chat_end() {
    let (addr, _backend, _health) = start_test_server().await;
    let client = reqwest::Client::new();

    let session_id = create_session(&client, &addr).await;

    // Chat yields a non-empty structured reply.
    let resp = client
        .post(format!("http://{addr}/v1/sessions/{session_id}/chat"))
        .json(&serde_json::json!({"user_message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_ne!(body["speech"], "");
    assert_ne!(body["emotion"], "");

    // End the session.
    let resp = client
        .delete(format!("http://{addr}/v1/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Chat on the ended session fails with 404.
    let resp = client
        .post(format!("http://{addr}/v1/sessions/{session_id}/chat"))
        .json(&serde_json::json!({"user_message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_duplicate_session_id_is_rejected() {
    let (addr, _backend, _health) = start_test_server().await;
    let client = reqwest::Client::new();

    let request = serde_json::json!({
        "session_id": "duel-1",
        "character_role": "Vargon",
        "opponent_role": "Naktis"
    });
    let resp = client
        .post(format!("http://{addr}/v1/sessions"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("http://{addr}/v1/sessions"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error_message"].as_str().unwrap().contains("duel-1"));
}

#[tokio::test]
async fn test_unknown_persona_is_rejected() {
    let (addr, _backend, _health) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/v1/sessions"))
        .json(&serde_json::json!({
            "character_role": "Nobody",
            "opponent_role": "Kagetsu"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_analysis_on_unknown_session_is_404() {
    let (addr, _backend, _health) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/v1/sessions/missing/analysis"))
        .json(&serde_json::json!({"opponent_actions": "charging"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_list_sessions_and_session_info() {
    let (addr, _backend, _health) = start_test_server().await;
    let client = reqwest::Client::new();

    let session_id = create_session(&client, &addr).await;

    let resp = client
        .get(format!("http://{addr}/v1/sessions"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let ids: Vec<&str> = body["session_ids"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(ids, vec![session_id.as_str()]);

    let resp = client
        .get(format!("http://{addr}/v1/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let info: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(info["character_role"], "Vargon");
    assert_eq!(info["opponent_role"], "Kagetsu");
    assert_eq!(info["turn_count"], 0);
}

#[tokio::test]
async fn test_stream_chat_answers_in_input_order() {
    let (addr, backend, _health) = start_test_server().await;
    let client = reqwest::Client::new();

    let session_id = create_session(&client, &addr).await;

    // Two init calls, then one structured reply per streamed message.
    backend.push_replies([
        "ack".to_string(),
        "reaction".to_string(),
        r#"{"speech": "A", "emotion": "calm"}"#.to_string(),
        r#"{"speech": "B", "emotion": "calm"}"#.to_string(),
        r#"{"speech": "C", "emotion": "calm"}"#.to_string(),
    ]);

    let url = format!("ws://{addr}/v1/chat/stream");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    for message in ["a", "b", "c"] {
        let frame = serde_json::json!({
            "session_id": session_id,
            "user_message": message
        });
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
    }

    let mut speeches = Vec::new();
    for _ in 0..3 {
        let msg = ws.next().await.unwrap().unwrap();
        let body: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
        assert_eq!(body["success"], true);
        speeches.push(body["speech"].as_str().unwrap().to_string());
    }
    assert_eq!(speeches, vec!["A", "B", "C"]);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_stream_chat_reports_unknown_session_per_frame() {
    let (addr, _backend, _health) = start_test_server().await;

    let url = format!("ws://{addr}/v1/chat/stream");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let frame = serde_json::json!({"session_id": "missing", "user_message": "hi"});
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error_message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_health_check_and_aggregate() {
    let (addr, _backend, health) = start_test_server().await;
    let client = reqwest::Client::new();

    // Unknown service.
    let resp = client
        .get(format!("http://{addr}/health/check?service=nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "SERVICE_UNKNOWN");

    health.set_status("duelchat.CharacterChat", ServingStatus::Serving);
    let resp = client
        .get(format!(
            "http://{addr}/health/check?service=duelchat.CharacterChat"
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "SERVING");

    // Empty service name aggregates across every tracked service.
    health.set_status("other", ServingStatus::NotServing);
    let resp = client
        .get(format!("http://{addr}/health/check"))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "NOT_SERVING");
}

#[tokio::test]
async fn test_health_watch_observes_a_late_registration() {
    let (addr, _backend, health) = start_test_server().await;

    // Watch a service that has not registered yet.
    let url = format!("ws://{addr}/health/watch?service=late.service");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
    assert_eq!(body["status"], "SERVICE_UNKNOWN");

    health.set_status("late.service", ServingStatus::Serving);
    let msg = ws.next().await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
    assert_eq!(body["status"], "SERVING");

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_health_watch_emits_current_then_changes() {
    let (addr, _backend, health) = start_test_server().await;
    health.set_status("duelchat.CharacterChat", ServingStatus::Unknown);

    let url = format!("ws://{addr}/health/watch?service=duelchat.CharacterChat");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let msg = ws.next().await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
    assert_eq!(body["status"], "UNKNOWN");

    health.set_status("duelchat.CharacterChat", ServingStatus::Serving);
    let msg = ws.next().await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_str(&msg.into_text().unwrap()).unwrap();
    assert_eq!(body["status"], "SERVING");

    ws.close(None).await.unwrap();
}
