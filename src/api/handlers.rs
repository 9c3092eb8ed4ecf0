//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AuthResponse, ErrorResponse, PersonaListResponse, PersonaResponse, SelectPersonaRequest, SendMessageRequest,
    SendMessageResponse, SuccessResponse,
};
use super::AppState;
use crate::auth::AuthError;
use crate::engine::EngineError;
use crate::persona::Persona;
use crate::session::{SessionError, SessionSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth", get(get_auth))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        // Persona catalog
        .route("/api/personas", get(list_personas).post(create_persona))
        .route("/api/personas/:id", get(get_persona).put(save_persona))
        // Active session
        .route("/api/session", get(get_session).post(start_session).delete(leave_session))
        .route("/api/session/messages", post(send_message))
        .route("/api/session/stream", get(stream_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Auth
// ============================================================

async fn get_auth(State(state): State<AppState>) -> Json<AuthResponse> {
    Json(state.engine.auth_state().into())
}

async fn login(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    state.engine.login().await?;
    Ok(Json(state.engine.auth_state().into()))
}

async fn logout(State(state): State<AppState>) -> Json<AuthResponse> {
    state.engine.logout().await;
    Json(state.engine.auth_state().into())
}

// ============================================================
// Personas
// ============================================================

async fn list_personas(State(state): State<AppState>) -> Json<PersonaListResponse> {
    Json(PersonaListResponse {
        personas: state.engine.personas().await,
    })
}

async fn create_persona(State(state): State<AppState>) -> (StatusCode, Json<PersonaResponse>) {
    let persona = state.engine.create_persona().await;
    (StatusCode::CREATED, Json(PersonaResponse { persona }))
}

async fn get_persona(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PersonaResponse>, AppError> {
    let persona = state.engine.persona(&id).await?;
    Ok(Json(PersonaResponse { persona }))
}

async fn save_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(persona): Json<Persona>,
) -> Result<Json<PersonaResponse>, AppError> {
    if persona.id != id {
        return Err(AppError::BadRequest(format!(
            "Persona id {} does not match path id {id}",
            persona.id
        )));
    }
    let persona = state.engine.save_persona(persona).await?;
    Ok(Json(PersonaResponse { persona }))
}

// ============================================================
// Session
// ============================================================

async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<SelectPersonaRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let handle = state.engine.select_persona(&req.persona_id).await?;
    let snapshot = handle.snapshot().await.map_err(EngineError::from)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_session(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = state.engine.active_session().await?;
    let snapshot = handle.snapshot().await.map_err(EngineError::from)?;
    Ok(Json(snapshot))
}

async fn leave_session(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.engine.leave_session().await;
    Json(SuccessResponse { success: true })
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let message = state.engine.send_message(&req.text).await?;
    Ok(Json(SendMessageResponse { message }))
}

async fn stream_session(State(state): State<AppState>) -> Result<Response, AppError> {
    let handle = state.engine.active_session().await?;
    let updates = handle.subscribe();
    let snapshot = handle.snapshot().await.map_err(EngineError::from)?;
    Ok(sse_stream(snapshot, updates).into_response())
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("persona-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::NotAuthenticated | EngineError::Auth(AuthError::LoginFailed(_)) => {
                AppError::Unauthorized(message)
            }
            EngineError::NoActiveSession | EngineError::PersonaNotFound(_) => AppError::NotFound(message),
            EngineError::Session(SessionError::EmptyMessage) => AppError::BadRequest(message),
            EngineError::DuplicatePersona(_) | EngineError::Session(SessionError::Busy | SessionError::Closed) => {
                AppError::Conflict(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
