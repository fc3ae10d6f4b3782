use crate::session::{SessionEntry, SessionHandle};
use duelchat_core::{DuelchatError, DuelchatResult, PersonaCatalog};
use duelchat_engine::{ConversationEngine, GenerationBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Session store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Idle duration after which a session becomes eligible for eviction.
    pub session_timeout: Duration,
    /// Cadence of the background eviction sweep.
    pub sweep_interval: Duration,
    /// How long shutdown waits for an in-flight transition before abandoning
    /// its session.
    pub shutdown_grace: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(600),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Concurrent registry of sessions keyed by id.
///
/// The map lock is held only for bookkeeping (insert/lookup/remove/list),
/// never across a generation backend call; one session's slow backend call
/// cannot stall operations on unrelated sessions.
pub struct SessionStore {
    catalog: Arc<PersonaCatalog>,
    backend: Arc<dyn GenerationBackend>,
    sessions: Mutex<HashMap<String, Arc<SessionEntry>>>,
    config: StoreConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Creates the store and starts its eviction sweep task. The task holds
    /// only a weak reference, so dropping the store stops it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        catalog: Arc<PersonaCatalog>,
        backend: Arc<dyn GenerationBackend>,
        config: StoreConfig,
    ) -> Arc<Self> {
        let store = Arc::new(Self {
            catalog,
            backend,
            sessions: Mutex::new(HashMap::new()),
            config: config.clone(),
            sweeper: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&store);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; nothing can be expired yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else { break };
                store.sweep_expired().await;
            }
        });
        *store.sweeper.lock() = Some(task);

        store
    }

    /// Registers a new session and returns its id.
    ///
    /// Fails with `DuplicateSessionId` if an explicit id is already taken and
    /// `UnknownPersona` if either role is not in the catalog. No backend call
    /// happens here: initialization runs lazily on the session's first action.
    pub fn create(
        &self,
        session_id: Option<String>,
        character_role: &str,
        opponent_role: &str,
        language: &str,
    ) -> DuelchatResult<String> {
        let persona = self.catalog.get(character_role)?.clone();
        let opponent = self.catalog.get(opponent_role)?.clone();

        let id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let engine = ConversationEngine::new(persona, opponent, language);
        let entry = Arc::new(SessionEntry::new(id.clone(), engine));

        {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(&id) {
                return Err(DuelchatError::DuplicateSessionId(id));
            }
            sessions.insert(id.clone(), entry);
        }

        info!(
            session_id = %id,
            character = character_role,
            opponent = opponent_role,
            language,
            "session created"
        );
        Ok(id)
    }

    /// Resolves a session id to a handle, refreshing its activity timestamp.
    ///
    /// The refresh happens on every successful lookup, whether or not the
    /// transition invoked through the handle later succeeds.
    pub fn get(&self, session_id: &str) -> DuelchatResult<SessionHandle> {
        let entry = self
            .sessions
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| DuelchatError::SessionNotFound(session_id.to_string()))?;
        entry.touch();
        Ok(SessionHandle::new(entry, self.backend.clone()))
    }

    /// Removes a session. Returns false if the id was absent.
    ///
    /// Detaches the session from the map immediately, then waits for any
    /// in-flight transition before marking the engine terminated, so a stale
    /// handle can never act on a removed session.
    pub async fn remove(&self, session_id: &str) -> bool {
        let entry = self.sessions.lock().remove(session_id);
        match entry {
            Some(entry) => {
                entry.engine.lock().await.end();
                info!(session_id, "session removed");
                true
            }
            None => false,
        }
    }

    /// Ids of every registered session.
    pub fn list(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Whether a session id is currently registered.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// One eviction pass: removes every session idle longer than the
    /// configured timeout. Called periodically by the sweep task; exposed so
    /// tests (and operators) can force a pass.
    ///
    /// Eviction takes the same per-session lock as transitions: a session
    /// with a transition in flight is skipped, never removed mid-transition.
    pub async fn sweep_expired(&self) -> usize {
        let candidates: Vec<Arc<SessionEntry>> =
            self.sessions.lock().values().cloned().collect();

        let mut evicted = 0;
        for entry in candidates {
            if entry.idle_for() <= self.config.session_timeout {
                continue;
            }
            let Ok(mut engine) = entry.engine.try_lock() else {
                // A transition is in flight; it will refresh the timestamp.
                continue;
            };
            // Re-check under the lock: a transition may have finished (and
            // touched the session) between the scan and the lock.
            if entry.idle_for() <= self.config.session_timeout {
                continue;
            }
            // The id may have been removed and reused since the scan; only
            // evict the entry the scan actually saw.
            if !self.remove_if_current(&entry) {
                continue;
            }
            engine.end();
            evicted += 1;
            info!(session_id = %entry.id, "expired session evicted");
        }

        if evicted > 0 {
            info!(evicted, remaining = self.len(), "eviction sweep finished");
        }
        evicted
    }

    /// Removes the slot for `entry.id` only while it still holds `entry`
    /// itself. Returns whether the removal happened.
    fn remove_if_current(&self, entry: &Arc<SessionEntry>) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(&entry.id) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                sessions.remove(&entry.id);
                true
            }
            _ => false,
        }
    }

    /// Stops the sweep task, then terminates every session, giving each
    /// in-flight transition a bounded grace period to finish.
    pub async fn shutdown(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
        }

        let entries: Vec<Arc<SessionEntry>> =
            self.sessions.lock().drain().map(|(_, e)| e).collect();
        for entry in entries {
            match tokio::time::timeout(self.config.shutdown_grace, entry.engine.lock()).await {
                Ok(mut engine) => engine.end(),
                Err(_) => {
                    warn!(session_id = %entry.id, "transition still in flight at shutdown, abandoning session");
                }
            }
        }
        info!("session store shut down");
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
        }
    }
}
