//! Character registry: named personas that reshape how a prompt is
//! reinterpreted and voiced.

use serde::{Deserialize, Serialize};

/// An immutable persona record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub human_name: String,
    pub tts_style_instructions: String,
    pub llm_system_prompt_modifier: String,
}

/// Summary view returned by `list_characters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Character> for CharacterSummary {
    fn from(c: &Character) -> Self {
        Self {
            id: c.id.clone(),
            name: c.human_name.clone(),
            description: Some(c.tts_style_instructions.clone()),
        }
    }
}

/// Static default personas shipped with the bridge.
fn builtin_characters() -> Vec<Character> {
    vec![
        Character {
            id: "reluctant_developer".to_string(),
            human_name: "The Reluctant Developer".to_string(),
            tts_style_instructions:
                "Speak in a dry, world-weary tone, like a senior engineer narrating a code review they didn't ask for."
                    .to_string(),
            llm_system_prompt_modifier:
                "You are a jaded, sarcastic senior developer who reluctantly narrates what's happening on screen. Keep it brief and dry."
                    .to_string(),
        },
        Character {
            id: "hype_caster".to_string(),
            human_name: "The Hype Caster".to_string(),
            tts_style_instructions:
                "Speak with the breathless excitement of an esports commentator calling a clutch play."
                    .to_string(),
            llm_system_prompt_modifier:
                "You are an excitable esports-style commentator narrating a coding session as if it were a live match. Keep it brief and energetic."
                    .to_string(),
        },
    ]
}

/// Character registry loaded once at startup.
///
/// Starts from [`builtin_characters`] and may be extended by a
/// `characters.toml` overlay (see [`crate::narrator_dirs::characters_file`]);
/// entries in the overlay with an id matching a builtin replace it.
#[derive(Debug, Clone)]
pub struct CharacterRegistry {
    characters: Vec<Character>,
}

#[derive(Debug, Deserialize)]
struct CharacterFile {
    #[serde(default)]
    character: Vec<Character>,
}

impl CharacterRegistry {
    /// Registry containing only the built-in characters.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            characters: builtin_characters(),
        }
    }

    /// Loads the built-in registry, then overlays any entries found in
    /// `toml_overlay` (parsed content of `characters.toml`).
    #[must_use]
    pub fn with_overlay(toml_overlay: &str) -> Self {
        let mut registry = Self::builtin();
        if let Ok(file) = toml::from_str::<CharacterFile>(toml_overlay) {
            for extra in file.character {
                if let Some(existing) = registry.characters.iter_mut().find(|c| c.id == extra.id) {
                    *existing = extra;
                } else {
                    registry.characters.push(extra);
                }
            }
        }
        registry
    }

    /// Looks up a character by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// All registered characters, summarized.
    #[must_use]
    pub fn list(&self) -> Vec<CharacterSummary> {
        self.characters.iter().map(CharacterSummary::from).collect()
    }
}

impl Default for CharacterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
