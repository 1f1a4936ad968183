//! The signed-in user and their token.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

/// A signed-in user as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// User id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Whether a second factor is enrolled.
    #[serde(default)]
    pub twofa_enabled: bool,
}

/// Login form contents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
    /// One-time code, when the account has a second factor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_code: Option<String>,
}

/// What a successful login returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// The user.
    pub user: AuthUser,
    /// Bearer token for sync calls.
    pub token: String,
}

/// Remote side of authentication.
pub trait AuthClient: Send + Sync {
    /// Exchanges credentials for a session.
    fn login(&self, credentials: &Credentials) -> impl Future<Output = SyncResult<AuthSession>> + Send;

    /// Tells the remote the token is no longer in use.
    fn logout(&self, token: &str) -> impl Future<Output = SyncResult<()>> + Send;

    /// Resolves a token to its user, or `None` if the remote no longer accepts it.
    fn current_user(&self, token: &str) -> impl Future<Output = SyncResult<Option<AuthUser>>> + Send;
}

/// Holds the current session.
pub struct Session<A: AuthClient> {
    client: A,
    current: RwLock<Option<AuthSession>>,
}

impl<A: AuthClient> Session<A> {
    /// Creates a signed-out session.
    pub fn new(client: A) -> Self {
        Self {
            client,
            current: RwLock::new(None),
        }
    }

    /// Returns true while a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// The signed-in user.
    pub fn user(&self) -> Option<AuthUser> {
        self.current.read().as_ref().map(|s| s.user.clone())
    }

    /// The bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] when signed out.
    pub fn token(&self) -> SyncResult<String> {
        self.current
            .read()
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(SyncError::NotAuthenticated)
    }

    /// Signs in. On failure the session is left signed out.
    pub async fn login(&self, credentials: &Credentials) -> SyncResult<AuthUser> {
        debug!(email = %credentials.email, "login attempt");
        match self.client.login(credentials).await {
            Ok(session) => {
                let user = session.user.clone();
                *self.current.write() = Some(session);
                info!(user_id = %user.id, "logged in");
                Ok(user)
            }
            Err(e) => {
                self.current.write().take();
                Err(e)
            }
        }
    }

    /// Signs out. The local session is cleared even if the remote call fails.
    pub async fn logout(&self) {
        let Some(session) = self.current.write().take() else {
            return;
        };
        if let Err(e) = self.client.logout(&session.token).await {
            warn!(error = %e, "remote logout failed; local session cleared anyway");
        }
        info!(user_id = %session.user.id, "logged out");
    }

    /// Re-validates the token. Any failure signs the session out.
    ///
    /// Returns the user if the session is still valid.
    pub async fn check(&self) -> Option<AuthUser> {
        let token = self.token().ok()?;
        match self.client.current_user(&token).await {
            Ok(Some(user)) => {
                if let Some(session) = self.current.write().as_mut() {
                    session.user = user.clone();
                }
                Some(user)
            }
            Ok(None) => {
                debug!("token no longer accepted");
                self.current.write().take();
                None
            }
            Err(e) => {
                warn!(error = %e, "auth check failed");
                self.current.write().take();
                None
            }
        }
    }
}
