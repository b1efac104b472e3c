#[path = "1-query-state.rs"]
mod query_state;

#[path = "2-dirty-tracker.rs"]
mod dirty_tracker;

#[path = "3-listeners.rs"]
mod listeners;

#[path = "4-query-cache.rs"]
mod query_cache;

pub use dirty_tracker::*;
pub use listeners::*;
pub use query_cache::*;
pub use query_state::*;

#[cfg_attr(target_arch = "wasm32", wasm_bindgen::prelude::wasm_bindgen)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ListenerKey(pub(crate) slotmap::DefaultKey);
