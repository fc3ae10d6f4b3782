//! The per-session conversation engine and its generation backends.
//!
//! [`ConversationEngine`] drives one session through its lifecycle
//! (initialization, chat turns, situational analyses) while delegating text
//! generation to a [`GenerationBackend`]. Two backends ship with the crate:
//! a live Gemini HTTP client and a deterministic scripted fake, selected by
//! configuration.

pub mod backends;
pub mod config;
pub mod engine;
pub mod parse;
pub mod prompt;

pub use backends::gemini::GeminiBackend;
pub use backends::scripted::ScriptedBackend;
pub use backends::{backend_from_config, GenerationBackend};
pub use config::{BackendProvider, ModelConfig};
pub use engine::{ConversationEngine, Lifecycle};
pub use parse::parse_reply;
