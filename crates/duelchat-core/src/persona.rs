use serde::{Deserialize, Serialize};

/// Example lines a persona would say in a specific game situation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechExample {
    /// Description of the situation (e.g. "Vargon vs Kagetsu, duel start").
    pub situation: String,
    /// Lines the character might deliver in that situation.
    pub speeches: Vec<String>,
}

/// Immutable character definition that biases generated dialogue.
///
/// Personas are loaded once into the [`crate::PersonaCatalog`] and shared
/// read-only across sessions; nothing mutates them afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// The character's role identifier (also its catalog key).
    pub role: String,
    /// The faction or species the character belongs to.
    pub group: String,
    /// Background story that shapes the character's worldview.
    pub backstory: String,
    /// Personality traits and attitudes toward the other factions.
    pub personality: String,
    /// Situation-keyed example lines.
    #[serde(default)]
    pub speech_examples: Vec<SpeechExample>,
}
