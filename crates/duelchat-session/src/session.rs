use chrono::{DateTime, Utc};
use duelchat_core::{ChatReply, DuelchatError, DuelchatResult, Transcript};
use duelchat_engine::{ConversationEngine, GenerationBackend};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// One registered session: the engine behind its per-session lock plus the
/// bookkeeping the store needs for eviction.
pub(crate) struct SessionEntry {
    pub(crate) id: String,
    pub(crate) engine: Mutex<ConversationEngine>,
    last_activity: parking_lot::Mutex<Instant>,
    created_at: DateTime<Utc>,
}

impl SessionEntry {
    pub(crate) fn new(id: String, engine: ConversationEngine) -> Self {
        Self {
            id,
            engine: Mutex::new(engine),
            last_activity: parking_lot::Mutex::new(Instant::now()),
            created_at: Utc::now(),
        }
    }

    /// Stamps the current time as the session's last activity.
    pub(crate) fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// How long the session has been idle.
    pub(crate) fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

/// Read-only snapshot of a session's identity and progress.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub character_role: String,
    pub opponent_role: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub turn_count: usize,
}

/// A reference to one live session, handed out by the store.
///
/// Every transition acquires the session's lock first, so concurrent calls
/// on the same handle (or on other handles for the same id) serialize; the
/// resulting transcript order is the serialization order.
#[derive(Clone)]
pub struct SessionHandle {
    entry: Arc<SessionEntry>,
    backend: Arc<dyn GenerationBackend>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) fn new(entry: Arc<SessionEntry>, backend: Arc<dyn GenerationBackend>) -> Self {
        Self { entry, backend }
    }

    /// The session id this handle refers to.
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// One chat transition. Initializes the session on its first action.
    pub async fn chat(
        &self,
        user_message: &str,
        deadline: Option<Duration>,
    ) -> DuelchatResult<ChatReply> {
        let mut engine = self.entry.engine.lock().await;
        self.check_live(&engine)?;
        let reply = engine
            .chat(self.backend.as_ref(), user_message, deadline)
            .await?;
        self.entry.touch();
        Ok(reply)
    }

    /// One analysis transition.
    pub async fn analyze(
        &self,
        opponent_actions: &str,
        deadline: Option<Duration>,
    ) -> DuelchatResult<String> {
        let mut engine = self.entry.engine.lock().await;
        self.check_live(&engine)?;
        let analysis = engine
            .analyze(self.backend.as_ref(), opponent_actions, deadline)
            .await?;
        self.entry.touch();
        Ok(analysis)
    }

    /// Restarts the conversation: empty transcript, re-initialization before
    /// the next action, same session id and personas.
    pub async fn reset(&self) -> DuelchatResult<()> {
        let mut engine = self.entry.engine.lock().await;
        self.check_live(&engine)?;
        engine.reset();
        self.entry.touch();
        Ok(())
    }

    /// Snapshot of the session's identity and transcript length.
    pub async fn info(&self) -> DuelchatResult<SessionInfo> {
        let engine = self.entry.engine.lock().await;
        self.check_live(&engine)?;
        Ok(SessionInfo {
            session_id: self.entry.id.clone(),
            character_role: engine.persona().role.clone(),
            opponent_role: engine.opponent().role.clone(),
            language: engine.language().to_string(),
            created_at: self.entry.created_at,
            turn_count: engine.transcript().len(),
        })
    }

    /// A copy of the session's transcript as currently committed.
    pub async fn transcript(&self) -> Transcript {
        self.entry.engine.lock().await.transcript().clone()
    }

    /// A handle can outlive removal from the store; a terminated engine is
    /// indistinguishable from a missing session for callers.
    fn check_live(&self, engine: &ConversationEngine) -> DuelchatResult<()> {
        if engine.is_terminated() {
            return Err(DuelchatError::SessionNotFound(self.entry.id.clone()));
        }
        Ok(())
    }
}
