use crate::health::HealthRegistry;
use crate::routes;
use crate::stream;
use axum::routing::{delete, get, post};
use axum::Router;
use duelchat_session::SessionStore;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub health: Arc<HealthRegistry>,
}

/// The service facade: translates HTTP/WebSocket requests into session
/// store calls and back into wire responses.
pub struct GatewayServer;

impl GatewayServer {
    /// Builds the router over a session store and a health registry.
    pub fn build(store: Arc<SessionStore>, health: Arc<HealthRegistry>) -> Router {
        let state = Arc::new(AppState { store, health });

        Router::new()
            .route("/v1/sessions", post(routes::init_session))
            .route("/v1/sessions", get(routes::list_sessions))
            .route("/v1/sessions/{id}", get(routes::session_info))
            .route("/v1/sessions/{id}", delete(routes::end_session))
            .route("/v1/sessions/{id}/chat", post(routes::chat))
            .route("/v1/sessions/{id}/analysis", post(routes::analyze_game_state))
            .route("/v1/chat/stream", get(stream::stream_chat))
            .route("/health/check", get(routes::health_check))
            .route("/health/watch", get(stream::health_watch))
            .with_state(state)
    }
}
