//! What the page sees. Everything here is a thin wrapper: state lives in [`Session`], and
//! errors become strings at this boundary.

use std::rc::Rc;

use query_cache::data_model::{ListenerKey, QueryState};
use wasm_bindgen::prelude::*;

use crate::auth::{AuthSession, GoogleProfile};
use crate::config::ApiConfig;
use crate::model::{Course, CoursePlan, DeletedTerm, Term};
use crate::router::{HeaderView, View};
use crate::session::{Session, Topic};
use crate::setup::{self, ProgramCatalogue};
use crate::token_store::LocalStorage;
use crate::transport::HttpTransport;

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn location_pathname() -> String {
    web_sys::window()
        .and_then(|window| window.location().pathname().ok())
        .unwrap_or_else(|| "/".to_string())
}

#[wasm_bindgen]
pub struct CoursePlanner {
    session: Rc<Session<HttpTransport>>,
    /// Mirrors our location into the browser's history. Moves that came from the browser
    /// are attributed to it, so it doesn't push them back.
    history_listener: ListenerKey,
}

#[wasm_bindgen]
impl CoursePlanner {
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<ApiConfig>) -> Result<CoursePlanner, JsValue> {
        let config = config.unwrap_or_else(crate::config::api_config);
        let storage = LocalStorage::new()
            .inspect_err(|e| log::error!("Error opening localStorage: {e}"))
            .map_err(to_js)?;
        let transport = HttpTransport::new(&config).map_err(to_js)?;
        let session = Rc::new(Session::new(
            config,
            Rc::new(storage),
            transport,
            &location_pathname(),
        ));

        let weak = Rc::downgrade(&session);
        let history_listener = session.subscribe(move |_, topic| {
            if topic == Topic::Location
                && let Some(session) = weak.upgrade()
            {
                push_history(&session.current_path());
            }
        });

        Ok(CoursePlanner {
            session,
            history_listener,
        })
    }

    #[wasm_bindgen]
    pub fn subscribe(&self, callback: js_sys::Function) -> ListenerKey {
        self.session.subscribe(move |listener, topic| {
            let this = JsValue::null();
            let listener_js: JsValue = listener.into();
            let topic_js = match serde_json::to_string(&topic) {
                Ok(topic) => JsValue::from_str(&topic),
                Err(e) => {
                    log::error!("Error serializing topic: {e}");
                    return;
                }
            };
            let _ = callback.call2(&this, &listener_js, &topic_js);
        })
    }

    #[wasm_bindgen]
    pub fn unsubscribe(&self, key: ListenerKey) {
        self.session.unsubscribe(key)
    }

    #[wasm_bindgen(getter)]
    pub fn auth(&self) -> AuthSession {
        self.session.auth_state()
    }

    #[wasm_bindgen]
    pub async fn login(&self, profile: GoogleProfile) -> Result<(), JsValue> {
        self.session.login(&profile).await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn logout(&self) {
        self.session.logout().await
    }

    #[wasm_bindgen]
    pub async fn load_timeline(&self) -> Result<(), JsValue> {
        self.session.load_timeline().await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn timeline(&self) -> Result<Option<QueryState<CoursePlan>>, JsValue> {
        self.session.timeline_state().map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn load_username(&self) -> Result<(), JsValue> {
        self.session.load_username().await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn add_term(&self, name: String) -> Result<Term, JsValue> {
        self.session.add_term(&name).await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn remove_term(&self, term_id: i32) -> Result<DeletedTerm, JsValue> {
        self.session.remove_term(term_id).await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn remove_term_named(&self, name: String) -> Result<Option<DeletedTerm>, JsValue> {
        self.session.remove_term_named(&name).await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn add_course(&self, term_id: i32, name: String) -> Result<Course, JsValue> {
        self.session.add_course(term_id, &name).await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn remove_course(&self, course_id: i32) -> Result<Course, JsValue> {
        self.session.remove_course(course_id).await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn programs(&self) -> ProgramCatalogue {
        setup::programs()
    }

    #[wasm_bindgen]
    pub async fn start_empty_plan(&self) -> Result<(), JsValue> {
        self.session.start_empty_plan().await.map_err(to_js)
    }

    #[wasm_bindgen]
    pub async fn build_plan_for_program(&self, program_key: String) -> Result<CoursePlan, JsValue> {
        self.session
            .build_plan_for_program(&program_key)
            .await
            .map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn last_mutation_error(&self) -> Option<String> {
        self.session.last_mutation_error()
    }

    #[wasm_bindgen]
    pub fn view(&self) -> Result<View, JsValue> {
        self.session.current_view().map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn header(&self) -> Result<HeaderView, JsValue> {
        self.session.header_view().map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn current_path(&self) -> String {
        self.session.current_path()
    }

    /// In-app navigation. The history listener pushes the new path onto the browser history.
    #[wasm_bindgen]
    pub fn navigate(&self, path: String) {
        self.session.navigate(&path, None);
    }

    /// Call from a `popstate` handler: the browser has already moved, so don't push again.
    #[wasm_bindgen]
    pub fn location_changed(&self) {
        self.session
            .navigate(&location_pathname(), Some(self.history_listener));
    }
}

fn push_history(path: &str) {
    if path == location_pathname() {
        return;
    }
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Ok(history) = window.history()
        && let Err(e) = history.push_state_with_url(&JsValue::NULL, "", Some(path))
    {
        log::error!("Error pushing {path} onto browser history: {e:?}");
    }
}
