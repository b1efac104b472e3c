#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(not(feature = "local-backend"))]
const BASE_URL: &str = "http://local.uwcourseplan.com:8000";
#[cfg(feature = "local-backend")]
const BASE_URL: &str = "http://localhost:8000";

const GOOGLE_CLIENT_ID: &str =
    "988574817320-upn9d65cbmqvnol3h7fgro1cd7lo4l9h.apps.googleusercontent.com";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    pub google_client_id: String,
    /// Upper bound on how long a request may stay in flight. Enforced on native targets;
    /// in the browser the fetch is left to the platform.
    pub request_timeout_ms: u64,
}

impl ApiConfig {
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    pub fn graphql_url(&self) -> String {
        self.endpoint("/graphql")
    }

    pub fn google_auth_url(&self) -> String {
        self.endpoint("/google_auth")
    }

    pub fn logout_url(&self) -> String {
        self.endpoint("/logout")
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub fn api_config() -> ApiConfig {
    ApiConfig {
        base_url: BASE_URL.to_string(),
        google_client_id: GOOGLE_CLIENT_ID.to_string(),
        request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
    }
}
