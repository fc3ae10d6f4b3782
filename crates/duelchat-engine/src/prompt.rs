//! Prompt construction for the conversation engine.
//!
//! Every string that reaches the generation backend is built here, so the
//! wire shape of the conversation lives in one place.

use duelchat_core::Persona;

/// System turn introducing the session's own persona and mandating the
/// output language. Appended to the transcript during initialization.
pub fn persona_intro(persona: &Persona, language: &str) -> String {
    let sheet = serde_json::json!({
        "role": persona.role,
        "group": persona.group,
        "backstory": persona.backstory,
        "personality": persona.personality,
        "speech_examples": persona.speech_examples,
    });
    format!(
        "Answer every line in {language}. You are {role}. The opponent may be \
         the same kind of being as you.\nCharacter sheet: {sheet}",
        role = persona.role,
    )
}

/// Synthesized "the opponent introduces itself" user turn. Derived from the
/// opponent persona, never generated.
pub fn opponent_intro(opponent: &Persona) -> String {
    format!(
        "I am {role} of the {group}.",
        role = opponent.role,
        group = opponent.group
    )
}

/// Structured envelope carried by every chat user turn.
pub fn chat_envelope(query: &str, opponent: &Persona) -> String {
    serde_json::json!({
        "speech": query,
        "role": opponent.role,
        "group": opponent.group,
    })
    .to_string()
}

/// System instruction carried by every analysis turn.
pub fn analysis_instruction(opponent_actions: &str) -> String {
    serde_json::json!({
        "query": "Derive an appropriate response and emotion from the opponent's actions.",
        "opponent_actions": opponent_actions,
    })
    .to_string()
}

/// Per-call output format instruction for chat. Sent with the backend
/// request but never committed to the transcript.
pub fn format_instruction(language: &str) -> String {
    format!(
        "Answer in {language}. Reply with a single JSON object with exactly \
         two string fields: \"speech\" (the line you deliver) and \"emotion\" \
         (the emotion behind it). Wrap the output in `json` tags."
    )
}
