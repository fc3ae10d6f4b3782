//! HTTP contract tests for the Gemini backend against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use duelchat_core::{DuelchatError, Turn};
use duelchat_engine::{BackendProvider, GeminiBackend, GenerationBackend, ModelConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(base_url: &str) -> ModelConfig {
    ModelConfig {
        provider: BackendProvider::Gemini,
        model_id: "gemini-pro".to_string(),
        api_key: "test-key".to_string(),
        api_base_url: Some(base_url.to_string()),
        temperature: 0.7,
        top_p: 0.95,
        max_output_tokens: 256,
    }
}

#[tokio::test]
async fn generate_posts_turns_and_returns_candidate_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "Greetings, human."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server.uri()));
    let reply = backend
        .generate(&[Turn::system("stay in character", 0), Turn::user("hello", 1)])
        .await
        .unwrap();
    assert_eq!(reply, "Greetings, human.");
}

#[tokio::test]
async fn non_success_status_maps_to_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "quota exceeded"}
        })))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server.uri()));
    let err = backend.generate(&[Turn::user("hello", 0)]).await.unwrap_err();
    assert!(matches!(err, DuelchatError::Http(_)));
}

#[tokio::test]
async fn body_without_candidates_maps_to_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(config(&server.uri()));
    let err = backend.generate(&[Turn::user("hello", 0)]).await.unwrap_err();
    assert!(matches!(err, DuelchatError::Backend(_)));
}
