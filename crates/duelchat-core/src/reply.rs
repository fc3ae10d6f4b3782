use serde::{Deserialize, Serialize};

/// A character's reaction to one chat turn: a line of dialogue plus the
/// emotion behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The line the character delivers.
    pub speech: String,
    /// The emotion the character feels while delivering it.
    pub emotion: String,
}

impl ChatReply {
    /// Creates a reply from its parts.
    pub fn new(speech: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            speech: speech.into(),
            emotion: emotion.into(),
        }
    }

    /// The fixed degraded reply returned when the generation backend fails.
    pub fn fallback() -> Self {
        Self::new("I cannot come up with a response right now.", "confused")
    }

    /// The emotion assigned when a raw text reply carries no structured
    /// emotion field.
    pub const DEFAULT_EMOTION: &'static str = "neutral";
}
