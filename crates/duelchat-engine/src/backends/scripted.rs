use super::GenerationBackend;
use async_trait::async_trait;
use duelchat_core::{DuelchatError, DuelchatResult, Role, Turn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Deterministic in-process backend for tests and offline runs.
///
/// Pops queued replies in FIFO order; when the queue is empty it echoes the
/// last non-system turn as a structured `{speech, emotion}` reply. Can be
/// armed to fail every call or to delay before answering.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-loaded with canned replies.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        backend.push_replies(replies);
        backend
    }

    /// Queues more canned replies.
    pub fn push_replies<I, S>(&self, replies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue = self.replies.lock();
        queue.extend(replies.into_iter().map(Into::into));
    }

    /// When set, every subsequent call fails with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// When set, every subsequent call sleeps before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// How many times `generate` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn echo_reply(turns: &[Turn]) -> String {
        let last = turns
            .iter()
            .rev()
            .find(|t| t.role != Role::System)
            .map(|t| t.content.as_str())
            .unwrap_or("...");
        serde_json::json!({
            "speech": format!("I hear you: {last}"),
            "emotion": "neutral"
        })
        .to_string()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, turns: &[Turn]) -> DuelchatResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(DuelchatError::Backend(
                "scripted backend armed to fail".to_string(),
            ));
        }

        let queued = self.replies.lock().pop_front();
        Ok(queued.unwrap_or_else(|| Self::echo_reply(turns)))
    }
}
