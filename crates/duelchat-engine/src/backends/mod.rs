pub mod gemini;
pub mod scripted;

use crate::config::{BackendProvider, ModelConfig};
use async_trait::async_trait;
use duelchat_core::{DuelchatResult, Turn};
use std::sync::Arc;

/// An opaque text-generation capability.
///
/// Given a transcript (plus any per-call instruction turns the caller mixed
/// in), produce generated text. One attempt per call — retrying is the
/// caller's responsibility, and in practice nothing retries: the conversation
/// engine absorbs failures into fallback turns.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generates a completion for the given turns.
    async fn generate(&self, turns: &[Turn]) -> DuelchatResult<String>;
}

/// Builds the backend selected by configuration.
pub fn backend_from_config(config: ModelConfig) -> Arc<dyn GenerationBackend> {
    match config.provider {
        BackendProvider::Gemini => Arc::new(gemini::GeminiBackend::new(config)),
        BackendProvider::Scripted => Arc::new(scripted::ScriptedBackend::new()),
    }
}
