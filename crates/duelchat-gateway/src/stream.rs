use crate::routes::{deadline_from, ChatResponse};
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One inbound StreamChat frame.
#[derive(Debug, Deserialize)]
pub struct StreamChatFrame {
    pub session_id: String,
    pub user_message: String,
    /// Per-backend-call deadline, with the same semantics as
    /// [`crate::routes::ChatRequest::timeout_ms`].
    pub timeout_ms: Option<u64>,
}

/// WebSocket StreamChat: each inbound frame yields exactly one Chat result
/// frame, in input order; the stream ends when the client closes.
pub async fn stream_chat(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(mut socket: WebSocket, state: Arc<AppState>) {
    info!("stream chat connected");

    while let Some(Ok(msg)) = socket.next().await {
        match msg {
            Message::Text(text) => {
                // Frames are handled one at a time; output order is input
                // order by construction.
                let response = match serde_json::from_str::<StreamChatFrame>(&text) {
                    Ok(frame) => chat_once(&state, frame).await,
                    Err(err) => ChatResponse {
                        speech: String::new(),
                        emotion: String::new(),
                        success: false,
                        error_message: format!("malformed frame: {err}"),
                    },
                };

                let Ok(json) = serde_json::to_string(&response) else {
                    continue;
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("stream chat disconnected");
}

async fn chat_once(state: &AppState, frame: StreamChatFrame) -> ChatResponse {
    let result = match state.store.get(&frame.session_id) {
        Ok(handle) => {
            handle
                .chat(&frame.user_message, deadline_from(frame.timeout_ms))
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(reply) => ChatResponse {
            speech: reply.speech,
            emotion: reply.emotion,
            success: true,
            error_message: String::new(),
        },
        Err(err) => {
            warn!(session_id = %frame.session_id, error = %err, "stream chat turn failed");
            ChatResponse {
                speech: String::new(),
                emotion: String::new(),
                success: false,
                error_message: err.to_string(),
            }
        }
    }
}

/// WebSocket health Watch: emits the service's current status immediately
/// (`SERVICE_UNKNOWN` for a service not yet registered), then every
/// subsequent change, until the client disconnects.
pub async fn health_watch(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<crate::routes::HealthQuery>,
) -> impl IntoResponse {
    let receiver = state.health.watch(&query.service);
    let service = query.service.clone();
    ws.on_upgrade(move |socket| handle_watch(socket, service, receiver))
}

async fn handle_watch(
    mut socket: WebSocket,
    service: String,
    mut rx: watch::Receiver<crate::health::ServingStatus>,
) {
    let current = *rx.borrow_and_update();
    if socket
        .send(Message::Text(status_frame(&service, current).into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *rx.borrow_and_update();
                if socket
                    .send(Message::Text(status_frame(&service, status).into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    debug!(service, "health watcher disconnected");
}

fn status_frame(service: &str, status: crate::health::ServingStatus) -> String {
    serde_json::json!({"service": service, "status": status}).to_string()
}
