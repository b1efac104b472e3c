//! Which screen to show. This is policy only: the functions here look at auth state and
//! query state and name a view; drawing it is somebody else's job.

use query_cache::data_model::QueryState;
use serde::{Deserialize, Serialize};

use crate::model::CoursePlan;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub enum Route {
    Home,
    Setup,
    NotFound { path: String },
}

impl Route {
    pub fn parse(path: &str) -> Route {
        match path.trim_end_matches('/') {
            "" => Route::Home,
            "/setup" => Route::Setup,
            _ => Route::NotFound {
                path: path.to_string(),
            },
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Home => "/",
            Route::Setup => "/setup",
            Route::NotFound { path } => path,
        }
    }
}

/// Where the app currently is. Browser history belongs to the browser; this only tracks the
/// path the views are resolved against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigator {
    current: String,
}

impl Navigator {
    pub fn new(initial_path: &str) -> Self {
        Self {
            current: normalize(initial_path),
        }
    }

    pub fn current_path(&self) -> &str {
        &self.current
    }

    pub fn route(&self) -> Route {
        Route::parse(&self.current)
    }

    /// Returns false (and changes nothing) when we're already there.
    pub fn go_to(&mut self, path: &str) -> bool {
        let path = normalize(path);
        if path == self.current {
            return false;
        }
        self.current = path;
        true
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum View {
    /// Logged out: the only thing on offer is the login entry point.
    Landing,
    Loading,
    Timeline { plan: CoursePlan },
    Setup,
    /// Not a screen of its own; the caller should navigate there and resolve again.
    Redirect { to: Route },
    /// The unmatched path, without its leading slash.
    NotFound { path: String },
}

pub fn resolve_view(
    route: &Route,
    is_authenticated: bool,
    timeline: Option<&QueryState<CoursePlan>>,
) -> View {
    match (route, is_authenticated) {
        (Route::Home, false) => View::Landing,
        (Route::Home, true) => match timeline {
            None | Some(QueryState::Loading) => View::Loading,
            // the usual reason is that this user has no course plan yet
            Some(QueryState::Failed { .. }) => View::Redirect { to: Route::Setup },
            Some(QueryState::Ready(plan)) => View::Timeline { plan: plan.clone() },
        },
        (Route::Setup, true) => View::Setup,
        (Route::Setup, false) | (Route::NotFound { .. }, _) => View::NotFound {
            path: route.path().trim_start_matches('/').to_string(),
        },
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
#[serde(tag = "header", rename_all = "camelCase")]
pub enum HeaderView {
    Login { error_message: Option<String> },
    Account { username: QueryState<String> },
}

pub fn resolve_header(
    is_authenticated: bool,
    error_message: Option<&str>,
    username: Option<&QueryState<String>>,
) -> HeaderView {
    if is_authenticated {
        HeaderView::Account {
            username: username.cloned().unwrap_or(QueryState::Loading),
        }
    } else {
        HeaderView::Login {
            error_message: error_message.map(str::to_string),
        }
    }
}
