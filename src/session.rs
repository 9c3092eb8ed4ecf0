//! Live conversation with one persona
//!
//! Each session runs its own event loop task. User input, generation results
//! and follow-up timers all arrive as [`SessionEvent`]s and are applied one
//! at a time, so appends to the log never interleave.

mod runtime;
mod state;

#[cfg(test)]
pub mod testing;

pub use runtime::SessionRuntime;
pub use state::{Pending, Session};

use crate::generator::Reply;
use crate::message::Message;
use crate::persona::Persona;
use crate::scheduler::FollowUpPhase;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A reply is still being generated")]
    Busy,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Session has ended")]
    Closed,
}

/// Events processed by the session loop
#[derive(Debug)]
pub enum SessionEvent {
    UserMessage {
        text: String,
        reply: oneshot::Sender<Result<Message, SessionError>>,
    },
    GenerationComplete {
        turn: u64,
        reply: Reply,
    },
    FollowUpDue {
        message_id: String,
    },
    FollowUpReady {
        message_id: String,
        text: String,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Updates broadcast to observers (e.g. SSE clients)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Message(Message),
    Typing { active: bool },
    Ended,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub persona: Persona,
    pub messages: Vec<Message>,
    pub generating: bool,
    pub follow_up: FollowUpPhase,
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    persona: Arc<Persona>,
    event_tx: mpsc::Sender<SessionEvent>,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn persona(&self) -> &Arc<Persona> {
        &self.persona
    }

    /// Submit a user message; returns it once appended to the log.
    ///
    /// The persona's reply arrives later as a [`SessionUpdate::Message`].
    pub async fn send_message(&self, text: impl Into<String>) -> Result<Message, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.event_tx
            .send(SessionEvent::UserMessage {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.event_tx
            .send(SessionEvent::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.broadcast_tx.subscribe()
    }

    /// End the session, cancelling its timer and discarding in-flight work
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
