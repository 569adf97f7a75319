//! Auth session layer: who is signed in, on top of [`ApiClient`].
//!
//! The session mirrors the client's credential so that a silent refresh
//! performed by the client (on some unrelated 401) is reflected here too.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, Method, RequestOptions};
use crate::config::AuthEndpoints;
use crate::resources::{first_string, unwrap_data};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Full user document as returned by the server
    pub raw: Value,
}

impl User {
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            id: first_string(value, &["id", "_id"]),
            username: first_string(value, &["username"]),
            email: first_string(value, &["email"]),
            raw: value.clone(),
        })
    }

    /// Best label for display: username, then email.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Result of a register or login call.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub access_token: Option<String>,
    pub user: Option<User>,
    pub raw: Value,
}

impl AuthResponse {
    fn from_json(raw: Value) -> Self {
        let data = raw.get("data");
        let access_token = data
            .and_then(|d| d.get("accessToken"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let user = data.and_then(|d| d.get("user")).and_then(User::from_value);
        Self {
            access_token,
            user,
            raw,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    token: Option<String>,
}

/// Authentication state for one application session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    client: ApiClient,
    endpoints: AuthEndpoints,
    state: Arc<RwLock<SessionState>>,
}

impl AuthSession {
    pub fn new(client: ApiClient, endpoints: AuthEndpoints) -> Self {
        let state = Arc::new(RwLock::new(SessionState::default()));

        let observed = Arc::clone(&state);
        client.on_credential_refreshed(move |token| {
            observed
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .token = Some(token.to_string());
        });

        Self {
            client,
            endpoints,
            state,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn current_user(&self) -> Option<User> {
        self.read_state().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().user.is_some()
    }

    /// Token as last seen by the session (login, register or silent refresh).
    pub fn token(&self) -> Option<String> {
        self.read_state().token.clone()
    }

    /// Silently restores a session from the refresh cookie.
    ///
    /// Calls the refresh endpoint directly with retry disabled, then loads the
    /// user. Any failure leaves the session signed out.
    pub async fn restore(&self) -> Option<User> {
        match self.try_restore().await {
            Ok(user) => user,
            Err(e) => {
                debug!(error = %e, "no session to restore");
                self.reset();
                None
            }
        }
    }

    async fn try_restore(&self) -> Result<Option<User>, ApiError> {
        let json = self
            .client
            .execute(
                &self.endpoints.refresh,
                RequestOptions::new(Method::POST),
                false,
            )
            .await?;

        let Some(token) = AuthResponse::from_json(json).access_token else {
            return Ok(None);
        };
        self.adopt_token(token);

        let user = self.me().await?;
        self.write_state().user.clone_from(&user);
        if let Some(user) = &user {
            info!(user = user.display_name(), "session restored");
        }
        Ok(user)
    }

    /// Registers a new account and signs it in.
    ///
    /// # Errors
    /// See [`ApiClient::execute`]; validation failures carry `errors[]`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let body = json!({"username": username, "email": email, "password": password});
        let json = self.client.post(&self.endpoints.register, Some(body)).await?;
        Ok(self.accept(json))
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = json!({"email": email, "password": password});
        let json = self.client.post(&self.endpoints.login, Some(body)).await?;
        Ok(self.accept(json))
    }

    /// Signs out. Local state is cleared even if the server call fails.
    pub async fn logout(&self) {
        if let Err(e) = self.client.post(&self.endpoints.logout, None).await {
            debug!(error = %e, "logout request failed, clearing local state anyway");
        }
        self.reset();
    }

    /// Fetches the current user (`data.user`, or `data` itself).
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn me(&self) -> Result<Option<User>, ApiError> {
        let json = self.client.get(&self.endpoints.me).await?;
        Ok(unwrap_data(&json, "user").and_then(User::from_value))
    }

    fn accept(&self, raw: Value) -> AuthResponse {
        let response = AuthResponse::from_json(raw);
        if let Some(token) = &response.access_token {
            self.adopt_token(token.clone());
        }
        if let Some(user) = &response.user {
            info!(user = user.display_name(), "signed in");
            self.write_state().user = Some(user.clone());
        }
        response
    }

    fn adopt_token(&self, token: String) {
        self.client.set_credential(Some(token.clone()));
        self.write_state().token = Some(token);
    }

    fn reset(&self) {
        let mut state = self.write_state();
        state.user = None;
        state.token = None;
        drop(state);
        self.client.clear_credential();
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
