//! Top-level orchestration: catalog, auth gate and the active session
//!
//! At most one session is live at a time. Selecting a persona replaces the
//! current session; leaving or signing out ends it.

use crate::auth::{AuthError, AuthProvider, AuthState, AuthSubscription, User};
use crate::config::EngineConfig;
use crate::generator::ResponseGenerator;
use crate::llm::LlmService;
use crate::message::Message;
use crate::persona::{CatalogError, Persona, PersonaCatalog};
use crate::session::{SessionError, SessionHandle, SessionRuntime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("No active session")]
    NoActiveSession,
    #[error("Persona not found: {0}")]
    PersonaNotFound(String),
    #[error("Persona id already exists: {0}")]
    DuplicatePersona(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(id) => EngineError::PersonaNotFound(id),
            CatalogError::DuplicateId(id) => EngineError::DuplicatePersona(id),
        }
    }
}

pub struct Engine {
    config: Arc<EngineConfig>,
    catalog: RwLock<PersonaCatalog>,
    auth: Arc<dyn AuthProvider>,
    generator: ResponseGenerator,
    active: Mutex<Option<SessionHandle>>,
    auth_watch: std::sync::Mutex<Option<AuthSubscription>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        catalog: PersonaCatalog,
        auth: Arc<dyn AuthProvider>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        let generator = ResponseGenerator::new(llm, &config);
        Self {
            config: Arc::new(config),
            catalog: RwLock::new(catalog),
            auth,
            generator,
            active: Mutex::new(None),
            auth_watch: std::sync::Mutex::new(None),
        }
    }

    /// End the active session whenever the provider reports a sign-out.
    ///
    /// Must be called once after wrapping the engine in an `Arc`.
    pub fn watch_auth(self: &Arc<Self>) {
        let engine: Weak<Self> = Arc::downgrade(self);
        let signed_in = AtomicBool::new(false);
        let subscription = self.auth.on_auth_state_changed(Box::new(move |state: AuthState| {
            if state.is_loading {
                return;
            }
            let was_signed_in = signed_in.swap(state.user.is_some(), Ordering::SeqCst);
            if !was_signed_in || state.user.is_some() {
                return;
            }
            if let Some(engine) = engine.upgrade() {
                tokio::spawn(async move {
                    engine.leave_session().await;
                });
            }
        }));

        if let Ok(mut slot) = self.auth_watch.lock() {
            *slot = Some(subscription);
        }
    }

    // ---- Auth ----

    pub fn auth_state(&self) -> AuthState {
        self.auth.current()
    }

    pub async fn login(&self) -> Result<User, EngineError> {
        Ok(self.auth.login().await?)
    }

    pub async fn logout(&self) {
        self.leave_session().await;
        self.auth.logout().await;
    }

    // ---- Personas ----

    pub async fn personas(&self) -> Vec<Arc<Persona>> {
        self.catalog.read().await.list()
    }

    pub async fn persona(&self, id: &str) -> Result<Arc<Persona>, EngineError> {
        self.catalog
            .read()
            .await
            .get(id)
            .ok_or_else(|| EngineError::PersonaNotFound(id.to_string()))
    }

    /// Replace a persona by id.
    ///
    /// A running session keeps the persona it was started with.
    pub async fn save_persona(&self, persona: Persona) -> Result<Arc<Persona>, EngineError> {
        let saved = self.catalog.write().await.update(persona)?;
        tracing::info!(persona_id = %saved.id, name = %saved.name, "Persona saved");
        Ok(saved)
    }

    pub async fn create_persona(&self) -> Arc<Persona> {
        let persona = self.catalog.write().await.create();
        tracing::info!(persona_id = %persona.id, "Persona created from template");
        persona
    }

    // ---- Session ----

    /// Start a fresh session with `persona_id`, ending any current one
    pub async fn select_persona(&self, persona_id: &str) -> Result<SessionHandle, EngineError> {
        if !self.auth.current().is_authenticated() {
            return Err(EngineError::NotAuthenticated);
        }
        let persona = self.persona(persona_id).await?;

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            tracing::info!(session_id = %previous.session_id(), "Replacing active session");
            previous.close();
        }

        let handle = SessionRuntime::spawn(persona, self.config.clone(), self.generator.clone());
        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Return to persona selection
    pub async fn leave_session(&self) {
        if let Some(handle) = self.active.lock().await.take() {
            handle.close();
        }
    }

    pub async fn active_session(&self) -> Result<SessionHandle, EngineError> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or(EngineError::NoActiveSession)
    }

    pub async fn send_message(&self, text: &str) -> Result<Message, EngineError> {
        let session = self.active_session().await?;
        Ok(session.send_message(text).await?)
    }
}
