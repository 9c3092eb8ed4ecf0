//! Session state owned by the session loop

use super::SessionSnapshot;
use crate::message::{Message, MessageLog};
use crate::persona::Persona;
use crate::scheduler::FollowUpState;
use std::sync::Arc;
use tokio::time::Instant;

/// Work the session is waiting on; at most one at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Reply to the user turn numbered `turn`
    Reply { turn: u64 },
    /// Follow-up to the persona message `message_id`
    FollowUp { message_id: String },
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    persona: Arc<Persona>,
    log: MessageLog,
    last_activity: Option<Instant>,
    pending: Option<Pending>,
    turn: u64,
    pub(super) follow_up: FollowUpState,
}

impl Session {
    pub fn new(persona: Arc<Persona>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            persona,
            log: MessageLog::new(),
            last_activity: None,
            pending: None,
            turn: 0,
            follow_up: FollowUpState::Idle,
        }
    }

    pub fn persona(&self) -> &Arc<Persona> {
        &self.persona
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// When the last persona message was appended
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    pub fn is_generating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn last_message_id(&self) -> Option<String> {
        self.log.last().map(|m| m.id.clone())
    }

    /// Append a user message and open a new reply turn
    pub fn begin_turn(&mut self, text: String) -> Message {
        self.turn += 1;
        self.pending = Some(Pending::Reply { turn: self.turn });
        self.log.push_user(text).clone()
    }

    pub fn begin_follow_up(&mut self, message_id: String) {
        self.pending = Some(Pending::FollowUp { message_id });
    }

    /// Append a persona message, closing whatever was pending
    pub fn append_persona(&mut self, text: String, now: Instant) -> Message {
        self.pending = None;
        self.last_activity = Some(now);
        let persona_id = self.persona.id.clone();
        self.log.push_persona(text, persona_id).clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            persona: (*self.persona).clone(),
            messages: self.log.iter().cloned().collect(),
            generating: self.is_generating(),
            follow_up: self.follow_up.phase(),
        }
    }
}
