use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of the participant that authored a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system-level instruction or prompt.
    System,
    /// The human (or game) side of the conversation.
    User,
    /// The character played by the generation backend.
    Assistant,
}

/// One role-tagged message unit within a session transcript.
///
/// Immutable once appended; the sequence position is assigned by the owning
/// [`Transcript`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier for this turn.
    pub id: Uuid,
    /// The role of the turn author.
    pub role: Role,
    /// The textual content of the turn.
    pub content: String,
    /// Zero-based position within the transcript.
    pub seq: u32,
    /// UTC timestamp of when the turn was created.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a new turn with the given role, content, and position.
    pub fn new(role: Role, content: impl Into<String>, seq: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            seq,
            timestamp: Utc::now(),
        }
    }

    /// Creates a new turn with [`Role::System`].
    pub fn system(content: impl Into<String>, seq: u32) -> Self {
        Self::new(Role::System, content, seq)
    }

    /// Creates a new turn with [`Role::User`].
    pub fn user(content: impl Into<String>, seq: u32) -> Self {
        Self::new(Role::User, content, seq)
    }

    /// Creates a new turn with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>, seq: u32) -> Self {
        Self::new(Role::Assistant, content, seq)
    }
}

/// Ordered, append-only sequence of turns belonging to one session.
///
/// The only non-append mutation is [`Transcript::reset`], which replaces the
/// log wholesale when a conversation is restarted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn with the next sequence number and returns a reference
    /// to it.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        let seq = self.turns.len() as u32;
        self.turns.push(Turn::new(role, content, seq));
        // Just pushed, so the vec is non-empty.
        &self.turns[self.turns.len() - 1]
    }

    /// All turns, in sequence order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns in the transcript.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recently appended turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Discards every turn, returning the transcript to its initial state.
    pub fn reset(&mut self) {
        self.turns.clear();
    }
}
