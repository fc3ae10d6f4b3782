use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use duelchat_core::DuelchatError;
use duelchat_session::SessionInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub struct InitSessionRequest {
    pub session_id: Option<String>,
    pub character_role: String,
    pub opponent_role: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "english".to_string()
}

#[derive(Debug, Serialize)]
pub struct InitSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    /// Optional deadline, applied to each generation backend call
    /// individually. A first action also runs the two initialization calls,
    /// so it may take up to three times this budget.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub speech: String,
    pub emotion: String,
    pub success: bool,
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub opponent_actions: String,
    /// Per-backend-call deadline, with the same semantics as
    /// [`ChatRequest::timeout_ms`].
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
    pub success: bool,
    pub error_message: String,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub success: bool,
    pub error_message: String,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub session_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    #[serde(default)]
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: crate::health::ServingStatus,
}

/// Maps an error to the HTTP status its kind deserves. Bodies always carry
/// the operation's `{success: false, error_message}` shape as well.
pub(crate) fn status_for(err: &DuelchatError) -> StatusCode {
    match err {
        DuelchatError::DuplicateSessionId(_) | DuelchatError::UnknownPersona(_) => {
            StatusCode::BAD_REQUEST
        }
        DuelchatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        DuelchatError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn deadline_from(timeout_ms: Option<u64>) -> Option<Duration> {
    timeout_ms.map(Duration::from_millis)
}

// --- Handlers ---

pub async fn init_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitSessionRequest>,
) -> impl IntoResponse {
    match state.store.create(
        req.session_id,
        &req.character_role,
        &req.opponent_role,
        &req.language,
    ) {
        Ok(session_id) => (
            StatusCode::OK,
            Json(InitSessionResponse {
                success: true,
                session_id,
                error_message: String::new(),
            }),
        ),
        Err(err) => {
            warn!(error = %err, "session initialization rejected");
            (
                status_for(&err),
                Json(InitSessionResponse {
                    success: false,
                    session_id: String::new(),
                    error_message: err.to_string(),
                }),
            )
        }
    }
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let result = match state.store.get(&session_id) {
        Ok(handle) => {
            handle
                .chat(&req.user_message, deadline_from(req.timeout_ms))
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(reply) => (
            StatusCode::OK,
            Json(ChatResponse {
                speech: reply.speech,
                emotion: reply.emotion,
                success: true,
                error_message: String::new(),
            }),
        ),
        Err(err) => {
            warn!(session_id, error = %err, "chat failed");
            (
                status_for(&err),
                Json(ChatResponse {
                    speech: String::new(),
                    emotion: String::new(),
                    success: false,
                    error_message: err.to_string(),
                }),
            )
        }
    }
}

pub async fn analyze_game_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<AnalysisRequest>,
) -> impl IntoResponse {
    let result = match state.store.get(&session_id) {
        Ok(handle) => {
            handle
                .analyze(&req.opponent_actions, deadline_from(req.timeout_ms))
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(analysis) => (
            StatusCode::OK,
            Json(AnalysisResponse {
                analysis,
                success: true,
                error_message: String::new(),
            }),
        ),
        Err(err) => {
            warn!(session_id, error = %err, "game state analysis failed");
            (
                status_for(&err),
                Json(AnalysisResponse {
                    analysis: String::new(),
                    success: false,
                    error_message: err.to_string(),
                }),
            )
        }
    }
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    if state.store.remove(&session_id).await {
        (
            StatusCode::OK,
            Json(EndSessionResponse {
                success: true,
                error_message: String::new(),
            }),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(EndSessionResponse {
                success: false,
                error_message: format!("session '{session_id}' not found"),
            }),
        )
    }
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ListSessionsResponse {
        session_ids: state.store.list(),
    })
}

pub async fn session_info(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, StatusCode> {
    let handle = state
        .store
        .get(&session_id)
        .map_err(|e| status_for(&e))?;
    let info = handle.info().await.map_err(|e| status_for(&e))?;
    Ok(Json(info))
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HealthQuery>,
) -> impl IntoResponse {
    let status = state.health.check(&query.service);
    let code = match status {
        crate::health::ServingStatus::ServiceUnknown => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (code, Json(HealthCheckResponse { status }))
}
