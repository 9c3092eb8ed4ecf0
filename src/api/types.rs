//! API request and response types

use crate::auth::{AuthState, User};
use crate::message::Message;
use crate::persona::Persona;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request to start a session
#[derive(Debug, Deserialize)]
pub struct SelectPersonaRequest {
    pub persona_id: String,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub is_loading: bool,
    pub authenticated: bool,
}

impl From<AuthState> for AuthResponse {
    fn from(state: AuthState) -> Self {
        Self {
            authenticated: state.is_authenticated(),
            user: state.user,
            is_loading: state.is_loading,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PersonaListResponse {
    pub personas: Vec<Arc<Persona>>,
}

#[derive(Debug, Serialize)]
pub struct PersonaResponse {
    pub persona: Arc<Persona>,
}

/// Response for a submitted message; the reply follows on the stream
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: Message,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
