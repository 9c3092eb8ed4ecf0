//! Authentication provider contract
//!
//! The engine only needs to know whether a user is signed in before it
//! creates a session. Credential handling belongs to the provider.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_loading: bool,
}

impl AuthState {
    /// A user is present and the provider has settled
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && !self.is_loading
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login failed: {0}")]
    LoginFailed(String),
}

pub type AuthCallback = Box<dyn Fn(AuthState) + Send + Sync>;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current(&self) -> AuthState;

    /// Deliver the current state immediately, then every change, until the
    /// returned subscription is unsubscribed or dropped.
    fn on_auth_state_changed(&self, callback: AuthCallback) -> AuthSubscription;

    async fn login(&self) -> Result<User, AuthError>;

    async fn logout(&self);
}

/// Live auth-state subscription; delivery stops on drop
#[derive(Debug)]
pub struct AuthSubscription {
    token: CancellationToken,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {
        self.token.cancel();
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// In-process provider for a single local user
pub struct LocalAuthProvider {
    state_tx: watch::Sender<AuthState>,
    display_name: String,
}

impl LocalAuthProvider {
    pub fn new(display_name: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(AuthState {
            user: None,
            is_loading: false,
        });
        Self {
            state_tx,
            display_name: display_name.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    fn current(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    fn on_auth_state_changed(&self, callback: AuthCallback) -> AuthSubscription {
        let token = CancellationToken::new();
        let mut rx = self.state_tx.subscribe();
        let cancel = token.clone();

        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            callback(initial);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = rx.borrow_and_update().clone();
                        callback(state);
                    }
                }
            }
        });

        AuthSubscription { token }
    }

    async fn login(&self) -> Result<User, AuthError> {
        if let Some(user) = self.current().user {
            return Ok(user);
        }
        if self.display_name.trim().is_empty() {
            return Err(AuthError::LoginFailed("no display name configured".to_string()));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: self.display_name.clone(),
        };
        self.state_tx.send_replace(AuthState {
            user: Some(user.clone()),
            is_loading: false,
        });
        tracing::info!(user_id = %user.id, "User signed in");
        Ok(user)
    }

    async fn logout(&self) {
        let previous = self.state_tx.send_replace(AuthState {
            user: None,
            is_loading: false,
        });
        if let Some(user) = previous.user {
            tracing::info!(user_id = %user.id, "User signed out");
        }
    }
}
