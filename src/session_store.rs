// Session store
// Current identity and bearer token, persisted across restarts and validated on launch

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api_client::{ApiError, TravelApi};
use crate::models::{RegisterData, User, UserPatch, UserRole};
use crate::storage::{
    clear_session, load_session, save_session, SessionStorage, StorageError, AUTH_TOKEN_KEY,
    USER_DATA_KEY,
};

pub const LOGIN_SUCCESS: &str = "Login successful";
pub const LOGIN_FALLBACK: &str = "Login failed. Please try again.";
pub const REGISTER_SUCCESS: &str = "Registration successful";
pub const REGISTER_FALLBACK: &str = "Registration failed. Please try again.";
pub const CHECK_AUTH_FALLBACK: &str = "Failed to check authentication status";
pub const LOGOUT_FALLBACK: &str = "Logout failed";
pub const REFRESH_FALLBACK: &str = "Failed to refresh session";
pub const UPDATE_PROFILE_FALLBACK: &str = "Failed to update profile";
pub const MISSING_CREDENTIALS: &str = "Email and password are required";
pub const MISSING_REGISTRATION_FIELDS: &str = "Name, email, password and phone are required";

/// Snapshot of the session as seen by screens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    // Derived, never stored
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }
}

// Result of login/registration; failures never surface as `Err`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub message: String,
}

impl AuthOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// Navigator a screen router should mount for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigator {
    Splash,
    Auth,
    Customer,
    Admin,
}

/// Explicit, injectable session handle.
///
/// Operations are not serialized against each other: the state lock is only
/// held for synchronous reads and writes, never across an `.await`, so when
/// two calls overlap the one that completes last determines the final state.
pub struct SessionStore {
    api: Arc<dyn TravelApi>,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn TravelApi>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            api,
            storage,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn navigator(&self) -> Navigator {
        let state = self.state.read();
        if state.is_loading {
            return Navigator::Splash;
        }
        if !state.is_authenticated() {
            return Navigator::Auth;
        }
        match state.user.as_ref().and_then(|user| user.role) {
            Some(UserRole::Customer) => Navigator::Customer,
            Some(UserRole::Admin) => Navigator::Admin,
            _ => Navigator::Auth,
        }
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    fn begin_operation(&self) {
        let mut state = self.state.write();
        state.is_loading = true;
        state.error = None;
    }

    fn end_operation(&self) {
        self.state.write().is_loading = false;
    }

    fn set_error(&self, message: impl Into<String>) {
        self.state.write().error = Some(message.into());
    }

    // User and token are always replaced together
    fn set_session(&self, token: String, user: User) {
        let mut state = self.state.write();
        state.token = Some(token);
        state.user = Some(user);
    }

    fn clear_in_memory(&self) {
        let mut state = self.state.write();
        state.token = None;
        state.user = None;
    }

    async fn reset_session(&self) -> Result<(), StorageError> {
        let result = clear_session(self.storage.as_ref()).await;
        self.clear_in_memory();
        result
    }

    // Server rejected our token: persisted copies are gone, drop ours too
    async fn handle_rejection(&self, err: &ApiError) {
        if err.is_unauthorized() {
            warn!("Session token rejected by server, resetting session");
            if let Err(storage_err) = self.reset_session().await {
                warn!(error = %storage_err, "Failed to clear persisted session");
            }
        }
    }

    /// Restores a persisted session if the server still accepts its token.
    ///
    /// Any failure (no record, partial record, rejected token, network error)
    /// leaves the store logged out with persisted storage cleared.
    pub async fn check_auth_status(&self) {
        self.begin_operation();

        match load_session(self.storage.as_ref()).await {
            Ok(Some((token, user))) => match self.api.validate_token().await {
                Ok(()) => {
                    info!(user_id = %user.id, "Restored persisted session");
                    self.set_session(token, user);
                }
                Err(err) => {
                    warn!(error = %err, "Persisted session failed validation");
                    self.logout_inner().await;
                }
            },
            Ok(None) => {
                debug!("No complete persisted session");
                self.logout_inner().await;
            }
            Err(err) => {
                warn!(error = %err, "Could not read persisted session");
                self.logout_inner().await;
                self.set_error(CHECK_AUTH_FALLBACK);
            }
        }

        self.end_operation();
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        if email.trim().is_empty() || password.is_empty() {
            self.set_error(MISSING_CREDENTIALS);
            return AuthOutcome::failure(MISSING_CREDENTIALS);
        }

        self.begin_operation();
        let outcome = match self.api.login(email.trim(), password).await {
            Ok(response) => {
                self.establish_session(response.token, response.data, LOGIN_SUCCESS, LOGIN_FALLBACK)
                    .await
            }
            Err(err) => {
                warn!(email = %email, error = %err, "Login failed");
                self.fail(&err, LOGIN_FALLBACK)
            }
        };
        self.end_operation();
        outcome
    }

    /// Creates the account and signs it in immediately.
    pub async fn register(&self, data: &RegisterData) -> AuthOutcome {
        let incomplete = [&data.name, &data.email, &data.password, &data.phone]
            .iter()
            .any(|field| field.trim().is_empty());
        if incomplete {
            self.set_error(MISSING_REGISTRATION_FIELDS);
            return AuthOutcome::failure(MISSING_REGISTRATION_FIELDS);
        }

        self.begin_operation();
        let outcome = match self.api.register(data).await {
            Ok(response) => {
                self.establish_session(
                    response.token,
                    response.user,
                    REGISTER_SUCCESS,
                    REGISTER_FALLBACK,
                )
                .await
            }
            Err(err) => {
                warn!(email = %data.email, error = %err, "Registration failed");
                self.fail(&err, REGISTER_FALLBACK)
            }
        };
        self.end_operation();
        outcome
    }

    async fn establish_session(
        &self,
        token: String,
        user: User,
        success_message: &str,
        fallback: &str,
    ) -> AuthOutcome {
        if token.is_empty() {
            warn!("Server response carried an empty token");
            self.set_error(fallback);
            return AuthOutcome::failure(fallback);
        }
        if let Err(err) = save_session(self.storage.as_ref(), &token, &user).await {
            warn!(error = %err, "Failed to persist session");
            self.set_error(fallback);
            return AuthOutcome::failure(fallback);
        }
        info!(user_id = %user.id, "Session established");
        self.set_session(token, user);
        AuthOutcome::success(success_message)
    }

    fn fail(&self, err: &ApiError, fallback: &str) -> AuthOutcome {
        let message = err.server_message().unwrap_or(fallback).to_string();
        self.set_error(message.clone());
        AuthOutcome::failure(message)
    }

    // Idempotent; storage failures are reported through `error`
    pub async fn logout(&self) {
        self.begin_operation();
        self.logout_inner().await;
        self.end_operation();
    }

    async fn logout_inner(&self) {
        if let Err(err) = self.reset_session().await {
            warn!(error = %err, "Failed to clear persisted session");
            self.set_error(LOGOUT_FALLBACK);
        }
    }

    pub async fn refresh_token(&self) -> bool {
        let Some(current) = self.token() else {
            return false;
        };

        let new_token = match self.api.refresh_token(&current).await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Token refresh failed");
                self.handle_rejection(&err).await;
                self.set_error(err.server_message().unwrap_or(REFRESH_FALLBACK));
                return false;
            }
        };
        if let Err(err) = self.storage.set_item(AUTH_TOKEN_KEY, &new_token).await {
            warn!(error = %err, "Failed to persist refreshed token");
            self.set_error(REFRESH_FALLBACK);
            return false;
        }

        self.state.write().token = Some(new_token);
        debug!("Token refreshed");
        true
    }

    /// Applies `patch` to the current user on the server and locally.
    ///
    /// The persisted record is the current user with the patch merged in, so
    /// fields the server does not echo back are kept. Returns `false` without
    /// any I/O when there is no authenticated session.
    pub async fn update_user_profile(&self, patch: &UserPatch) -> bool {
        let snapshot = self.snapshot();
        if !snapshot.is_authenticated() {
            return false;
        }
        let Some(current) = snapshot.user else {
            return false;
        };

        let reply = match self.api.update_user_profile(patch).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "Profile update failed");
                self.handle_rejection(&err).await;
                self.set_error(err.server_message().unwrap_or(UPDATE_PROFILE_FALLBACK));
                return false;
            }
        };
        let base = match reply {
            Some(server_user) => current.overlaid_with(server_user),
            None => current,
        };
        let updated = base.merged(patch);

        let raw_user = match serde_json::to_string(&updated) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "Failed to serialize updated user");
                self.set_error(UPDATE_PROFILE_FALLBACK);
                return false;
            }
        };
        if let Err(err) = self.storage.set_item(USER_DATA_KEY, &raw_user).await {
            warn!(error = %err, "Failed to persist updated user");
            self.set_error(UPDATE_PROFILE_FALLBACK);
            return false;
        }

        info!(user_id = %updated.id, "Profile updated");
        self.state.write().user = Some(updated);
        true
    }
}
