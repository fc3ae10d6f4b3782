use crate::error::{DuelchatError, DuelchatResult};
use crate::persona::{Persona, SpeechExample};
use serde::Deserialize;
use std::collections::HashMap;

/// Read-only mapping from persona role to [`Persona`].
///
/// Built once at startup from the built-in cast (optionally extended from a
/// TOML file) and shared across all sessions without locking.
#[derive(Debug, Default)]
pub struct PersonaCatalog {
    personas: HashMap<String, Persona>,
}

#[derive(Deserialize)]
struct PersonaFile {
    #[serde(default)]
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the built-in cast.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for persona in builtin_personas() {
            catalog.insert(persona);
        }
        catalog
    }

    /// Registers a persona under its role, replacing any previous entry.
    pub fn insert(&mut self, persona: Persona) {
        self.personas.insert(persona.role.clone(), persona);
    }

    /// Merges personas from a TOML document with a `[[personas]]` table
    /// array. Returns how many entries were added or replaced.
    pub fn extend_from_toml(&mut self, src: &str) -> DuelchatResult<usize> {
        let file: PersonaFile =
            toml::from_str(src).map_err(|e| DuelchatError::Config(e.to_string()))?;
        let count = file.personas.len();
        for persona in file.personas {
            self.insert(persona);
        }
        Ok(count)
    }

    /// Looks up a persona by role, failing with
    /// [`DuelchatError::UnknownPersona`] when absent.
    pub fn get(&self, role: &str) -> DuelchatResult<&Persona> {
        self.personas
            .get(role)
            .ok_or_else(|| DuelchatError::UnknownPersona(role.to_string()))
    }

    /// Whether a role is present in the catalog.
    pub fn contains(&self, role: &str) -> bool {
        self.personas.contains_key(role)
    }

    /// All registered roles.
    pub fn roles(&self) -> Vec<&str> {
        self.personas.keys().map(String::as_str).collect()
    }

    /// All registered personas.
    pub fn personas(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }

    /// Number of registered personas.
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

fn example(situation: &str, speeches: &[&str]) -> SpeechExample {
    SpeechExample {
        situation: situation.to_string(),
        speeches: speeches.iter().map(ToString::to_string).collect(),
    }
}

/// The built-in cast: an alien commander, a harpy hybrid, and a ninja.
fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona {
            role: "Vargon".to_string(),
            group: "alien".to_string(),
            backstory: "A military commander from an invading alien force. The \
                        occupation is well underway; he intends to enslave \
                        humanity and strip the planet of its resources."
                .to_string(),
            personality: "Arrogant toward humans but rigorous in his duty as a \
                          soldier. Favors harpies over humans, seeing them as \
                          potential subordinates. Considers ninjas a nuisance \
                          that could spark a human uprising, and hunts them."
                .to_string(),
            speech_examples: vec![
                example(
                    "Vargon vs Kagetsu, duel start",
                    &[
                        "A lowly ninja dares to face me? When your little game \
                         ends, you will bow your head to me!",
                        "You think you can keep running? I will tear you apart!",
                    ],
                ),
                example(
                    "Vargon vs Naktis, duel start",
                    &[
                        "You are a far more interesting species than the humans. \
                         Serve me and I may spare your life.",
                        "Defying me is foolish, hybrid. Let us see how high you \
                         can really fly.",
                    ],
                ),
                example("Vargon wins, Kagetsu loses", &[
                    "A worthless ninja thought to challenge me. This was the \
                     only possible ending.",
                ]),
                example("Vargon loses, Kagetsu wins", &[
                    "A mere human... this strong?",
                    "If you think this war ends with me, you are gravely mistaken...",
                ]),
            ],
        },
        Persona {
            role: "Naktis".to_string(),
            group: "harpy".to_string(),
            backstory: "The first harpy, born from human experiments meant to \
                        create a weapon against the aliens: an eagle's strength \
                        fused with a human body."
                .to_string(),
            personality: "Escaped the laboratory and now lives among harpies. \
                          Loathes the humans who experimented on her and the \
                          aliens who caused it, but hides open hostility since \
                          harpies are too few to fight both. Warm only to her \
                          own kind."
                .to_string(),
            speech_examples: vec![
                example(
                    "Kagetsu vs Naktis, duel start",
                    &[
                        "You made me, and now you ask to be allies? Don't make \
                         me laugh.",
                        "I will not live with my wings bound. I choose who I \
                         fight for!",
                    ],
                ),
                example(
                    "Vargon vs Naktis, duel start",
                    &[
                        "Loyalty? Spare me. I take orders from no one.",
                        "The moment you try to tame me, you will learn exactly \
                         who you are dealing with.",
                    ],
                ),
                example("Naktis loses to Vargon", &[
                    "I lost...? That cannot be...",
                    "I believed my fury burned hotter than anyone's...",
                ]),
            ],
        },
        Persona {
            role: "Kagetsu".to_string(),
            group: "human".to_string(),
            backstory: "The prodigy heir of one of the last surviving ninja \
                        clans. Trained quietly through peaceful times, and took \
                        up the fight when the invasion began."
                .to_string(),
            personality: "Prepares a rebellion to drive out the aliens but lies \
                          low while ninjas are few. Dresses as an ordinary \
                          civilian until a fight starts. Tried to ally with the \
                          harpies, only to find they despise the humans who \
                          made them."
                .to_string(),
            speech_examples: vec![
                example(
                    "Vargon vs Kagetsu, duel start",
                    &[
                        "A ninja waits in the dark. You think you've already \
                         won, but the shadows are always watching you.",
                        "You believe you've conquered this planet, but the real \
                         war starts now!",
                    ],
                ),
                example(
                    "Kagetsu vs Naktis, duel start",
                    &[
                        "Humans and aliens both cast you out. But you're \
                         strong. Shouldn't we use that strength together?",
                        "We face the same enemy. Your hatred alone won't win \
                         this fight!",
                    ],
                ),
                example("Kagetsu wins over Vargon", &[
                    "You were the most arrogant creature on this planet, \
                     Vargon. Your pride is what killed you.",
                ]),
            ],
        },
    ]
}
