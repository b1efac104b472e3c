pub mod auth;
#[cfg(target_arch = "wasm32")]
mod bindings;
pub mod cache_sync;
pub mod config;
pub mod error;
pub mod graphql;
pub mod model;
pub mod operations;
pub mod router;
pub mod session;
pub mod setup;
pub mod token_store;
pub mod transport;
mod utils;

use std::sync::LazyLock;

#[cfg(target_arch = "wasm32")]
pub use bindings::CoursePlanner;
pub use config::{ApiConfig, api_config};
pub use error::{ApiError, SessionError};
pub use session::{QueryKey, Session, Topic};

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
pub(crate) static LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();
    utils::init_logger();
    log::info!("Logging initialized");
});

#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
