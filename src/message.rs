//! Conversation messages and the append-only log that orders them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Persona,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Position in the session log, starting at 1
    pub sequence: u64,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// Set exactly when `sender` is `Persona`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
}

/// Append-only, totally ordered message log.
///
/// Messages can only be added at the end; nothing hands out mutable access
/// to stored messages.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &Message {
        self.push(content.into(), Sender::User, None)
    }

    pub fn push_persona(&mut self, content: impl Into<String>, persona_id: impl Into<String>) -> &Message {
        self.push(content.into(), Sender::Persona, Some(persona_id.into()))
    }

    fn push(&mut self, content: String, sender: Sender, persona_id: Option<String>) -> &Message {
        let sequence = self.messages.len() as u64 + 1;
        self.messages.push(Message {
            id: uuid::Uuid::new_v4().to_string(),
            sequence,
            content,
            sender,
            timestamp: Utc::now(),
            persona_id,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}
