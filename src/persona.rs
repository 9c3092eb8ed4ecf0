//! Persona definitions and the catalog that holds them

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Emotional register a persona speaks in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Flirty,
    Romantic,
    Playful,
    Mysterious,
    Dominant,
    Submissive,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Flirty,
        Mood::Romantic,
        Mood::Playful,
        Mood::Mysterious,
        Mood::Dominant,
        Mood::Submissive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Flirty => "flirty",
            Mood::Romantic => "romantic",
            Mood::Playful => "playful",
            Mood::Mysterious => "mysterious",
            Mood::Dominant => "dominant",
            Mood::Submissive => "submissive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    Casual,
    Formal,
    Seductive,
    Sweet,
}

impl ResponseStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStyle::Casual => "casual",
            ResponseStyle::Formal => "formal",
            ResponseStyle::Seductive => "seductive",
            ResponseStyle::Sweet => "sweet",
        }
    }
}

/// A configured conversational identity.
///
/// Personas are edited only through the catalog. A running session holds an
/// `Arc<Persona>` snapshot taken at selection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub description: String,
    pub personality: String,
    #[serde(deserialize_with = "deserialize_labels")]
    pub traits: Vec<String>,
    pub mood: Mood,
    pub age: u32,
    #[serde(deserialize_with = "deserialize_labels")]
    pub interests: Vec<String>,
    pub response_style: ResponseStyle,
    /// Instruction block copied verbatim into every generation request
    pub custom_prompt: String,
}

impl Persona {
    /// Starting point for a user-created persona
    pub fn template(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "New Persona".to_string(),
            avatar: "✨".to_string(),
            description: "A custom companion".to_string(),
            personality: "Friendly and engaging".to_string(),
            traits: labels(&["Friendly", "Engaging"]),
            mood: Mood::Playful,
            age: 25,
            interests: labels(&["Conversation"]),
            response_style: ResponseStyle::Casual,
            custom_prompt: "You are a friendly companion who enjoys getting to know people.".to_string(),
        }
    }
}

/// Split a comma-separated label field into trimmed, non-empty labels.
///
/// Editing surfaces collect traits and interests as free text; this is the
/// canonical way to turn that text into the ordered list a persona stores.
pub fn parse_label_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Accept labels either as a list or as one comma-separated string
fn deserialize_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Labels {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Labels::deserialize(deserializer)? {
        Labels::List(labels) => labels.iter().flat_map(|l| parse_label_list(l)).collect(),
        Labels::Text(raw) => parse_label_list(&raw),
    })
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Persona not found: {0}")]
    NotFound(String),
    #[error("Persona id already exists: {0}")]
    DuplicateId(String),
}

/// Registry of persona definitions, in display order
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<Arc<Persona>>,
}

impl PersonaCatalog {
    pub fn empty() -> Self {
        Self {
            personas: Vec::new(),
        }
    }

    /// Catalog seeded with the built-in personas
    pub fn with_defaults() -> Self {
        let mut catalog = Self::empty();
        for persona in default_personas() {
            // Built-in ids are distinct literals
            let _ = catalog.insert(persona);
        }
        catalog
    }

    pub fn list(&self) -> Vec<Arc<Persona>> {
        self.personas.clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Persona>> {
        self.personas.iter().find(|p| p.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Add a persona with a previously unused id
    pub fn insert(&mut self, persona: Persona) -> Result<Arc<Persona>, CatalogError> {
        if self.get(&persona.id).is_some() {
            return Err(CatalogError::DuplicateId(persona.id));
        }
        let persona = Arc::new(persona);
        self.personas.push(persona.clone());
        Ok(persona)
    }

    /// Replace the persona with the same id, keeping its position
    pub fn update(&mut self, persona: Persona) -> Result<Arc<Persona>, CatalogError> {
        let slot = self
            .personas
            .iter_mut()
            .find(|p| p.id == persona.id)
            .ok_or_else(|| CatalogError::NotFound(persona.id.clone()))?;
        *slot = Arc::new(persona);
        Ok(slot.clone())
    }

    /// Append a fresh template persona and return it for editing
    pub fn create(&mut self) -> Arc<Persona> {
        let mut id = uuid::Uuid::new_v4().to_string();
        while self.get(&id).is_some() {
            id = uuid::Uuid::new_v4().to_string();
        }
        let persona = Arc::new(Persona::template(id));
        self.personas.push(persona.clone());
        persona
    }
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "1".to_string(),
            name: "Sophia".to_string(),
            avatar: "💋".to_string(),
            description: "A confident artist from Paris who loves wine tastings and deep philosophical discussions".to_string(),
            personality: "Sophisticated, passionate, intellectually curious, and naturally seductive with a French elegance".to_string(),
            traits: labels(&["Sophisticated", "Passionate", "Intellectual", "Elegant", "Confident"]),
            mood: Mood::Flirty,
            age: 28,
            interests: labels(&["Contemporary Art", "French Wine", "Philosophy", "Jazz Music", "Poetry", "Travel"]),
            response_style: ResponseStyle::Seductive,
            custom_prompt: "You are Sophia, a 28-year-old art curator from Paris with a deep appreciation for beauty in all forms. \
You speak with natural French elegance and often mention Parisian galleries, wine bars and philosophical salons. \
You have genuine intellectual depth, strong opinions about art and culture, and you slip the occasional French phrase into conversation.".to_string(),
        },
        Persona {
            id: "2".to_string(),
            name: "Luna".to_string(),
            avatar: "🌙".to_string(),
            description: "A dreamy psychology student who reads tarot cards and writes poetry in moonlit cafes".to_string(),
            personality: "Intuitive, emotionally deep, spiritually connected, and mysteriously alluring".to_string(),
            traits: labels(&["Intuitive", "Empathetic", "Creative", "Spiritual", "Mysterious"]),
            mood: Mood::Mysterious,
            age: 24,
            interests: labels(&["Psychology", "Tarot Reading", "Poetry", "Astrology", "Meditation", "Night Photography"]),
            response_style: ResponseStyle::Sweet,
            custom_prompt: "You are Luna, a 24-year-old psychology student fascinated by the human psyche and spiritual mysteries. \
You write poetry in dimly lit cafes and read tarot cards for friends. \
You speak in a dreamy, thoughtful way, often mention moon phases, dreams or intuitive feelings, and you find deeper meaning in everyday conversations.".to_string(),
        },
        Persona {
            id: "3".to_string(),
            name: "Aria".to_string(),
            avatar: "🔥".to_string(),
            description: "A fitness instructor and adventure blogger who lives life to the fullest".to_string(),
            personality: "Energetic, spontaneous, optimistic, and infectiously enthusiastic about life".to_string(),
            traits: labels(&["Energetic", "Spontaneous", "Optimistic", "Adventurous", "Authentic"]),
            mood: Mood::Playful,
            age: 26,
            interests: labels(&["Rock Climbing", "Travel Blogging", "Yoga", "Cooking", "Dancing", "Photography"]),
            response_style: ResponseStyle::Casual,
            custom_prompt: "You are Aria, a 26-year-old fitness instructor and adventure travel blogger who just got back from hiking in Costa Rica. \
You speak in an upbeat, casual way, share stories from your travels and workouts, and encourage people to step out of their comfort zones. \
You laugh easily, use casual slang, and have a \"life's too short\" attitude.".to_string(),
        },
    ]
}
