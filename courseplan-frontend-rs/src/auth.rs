//! The authentication state machine and the two REST calls that drive it.
//!
//! ```text
//! Idle ──login_request──▶ LoggingIn ──login_success──▶ Authenticated ──logout_request──▶ LoggingOut
//!   ▲                         │                                                              │
//!   │                         └──login_failure──▶ Failed                                     │
//!   └────────────────────────────────────────logout_success──────────────────────────────────┘
//! ```
//!
//! The reducer is pure. Persisting and clearing the token happens in the session, right before
//! the success actions are dispatched, so `is_authenticated` never outlives the stored token.

use query_cache::Reducer;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::transport::Transport;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub is_fetching: bool,
    pub is_authenticated: bool,
    #[serde(skip)]
    pub access_token: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub enum AuthPhase {
    Idle,
    LoggingIn,
    Authenticated,
    LoggingOut,
    Failed,
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthAction {
    LoginRequest,
    LoginSuccess { access_token: String },
    LoginFailure { message: String },
    LogoutRequest,
    LogoutSuccess,
}

// hand-written so tokens don't end up in logs
impl std::fmt::Debug for AuthAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthAction::LoginRequest => write!(f, "LoginRequest"),
            AuthAction::LoginSuccess { .. } => write!(f, "LoginSuccess"),
            AuthAction::LoginFailure { message } => write!(f, "LoginFailure({message:?})"),
            AuthAction::LogoutRequest => write!(f, "LogoutRequest"),
            AuthAction::LogoutSuccess => write!(f, "LogoutSuccess"),
        }
    }
}

impl Reducer for AuthSession {
    type Action = AuthAction;

    fn reduce(self, action: &AuthAction) -> Self {
        match action {
            AuthAction::LoginRequest => AuthSession {
                is_fetching: true,
                is_authenticated: false,
                access_token: None,
                error_message: None,
            },
            AuthAction::LoginSuccess { access_token } => AuthSession {
                is_fetching: false,
                is_authenticated: true,
                access_token: Some(access_token.clone()),
                error_message: None,
            },
            AuthAction::LoginFailure { message } => AuthSession {
                is_fetching: false,
                is_authenticated: false,
                access_token: None,
                error_message: Some(message.clone()),
            },
            AuthAction::LogoutRequest => AuthSession {
                is_fetching: true,
                ..self
            },
            AuthAction::LogoutSuccess => AuthSession {
                is_fetching: false,
                is_authenticated: false,
                access_token: None,
                error_message: None,
            },
        }
    }
}

impl AuthSession {
    pub fn phase(&self) -> AuthPhase {
        match (self.is_fetching, self.is_authenticated) {
            (true, false) => AuthPhase::LoggingIn,
            (true, true) => AuthPhase::LoggingOut,
            (false, true) => AuthPhase::Authenticated,
            (false, false) if self.error_message.is_some() => AuthPhase::Failed,
            (false, false) => AuthPhase::Idle,
        }
    }
}

/// The profile the Google sign-in widget hands back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub struct GoogleProfile {
    pub email: String,
    pub google_id: String,
    pub name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

fn json_headers() -> Vec<(String, String)> {
    vec![("Content-Type".to_string(), "application/json".to_string())]
}

/// Trade a Google profile for a bearer token.
pub(crate) async fn request_token<T: Transport>(
    transport: &T,
    config: &ApiConfig,
    profile: &GoogleProfile,
) -> Result<String, ApiError> {
    let body = serde_json::to_value(profile)?;
    let response = transport
        .post_json(&config.google_auth_url(), &json_headers(), &body)
        .await?;
    if !response.ok() {
        return Err(ApiError::Status {
            status: response.status,
            body: response.body,
        });
    }

    let TokenResponse { token } = serde_json::from_str(&response.body)?;
    if token.is_empty() {
        return Err(ApiError::MissingData);
    }
    Ok(token)
}

/// Tell the server the token is done with. The outcome doesn't matter to the caller,
/// so failures are only logged.
pub(crate) async fn request_logout<T: Transport>(transport: &T, config: &ApiConfig, token: &str) {
    let mut headers = json_headers();
    headers.push(("Authorization".to_string(), format!("Bearer {token}")));

    match transport
        .post_json(&config.logout_url(), &headers, &serde_json::json!({}))
        .await
    {
        Ok(response) if !response.ok() => {
            log::warn!("Logout request returned status {}", response.status);
        }
        Ok(_) => {}
        Err(e) => log::warn!("Ignoring logout transport error: {e}"),
    }
}
