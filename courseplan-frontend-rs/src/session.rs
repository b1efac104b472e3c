//! The one object that owns everything stateful: auth, the query cache, the current location
//! and the GraphQL client. It is built once at startup and handed to whoever needs it.
//!
//! Ordering rules:
//! - A mutation's result is folded into the cache before any listener hears about it.
//! - Listeners only ever run from [`Session::flush_notifications`], with no borrows held.
//! - No `RefCell` borrow is ever held across an `.await`.
//! - A response that lands after a logout is dropped, not written to the cache.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use query_cache::Reducer;
use query_cache::data_model::{DirtyState, DirtyTracker, ListenerKey, Listeners, QueryCache, QueryState};
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthAction, AuthPhase, AuthSession, GoogleProfile};
use crate::cache_sync;
use crate::config::ApiConfig;
use crate::error::{ApiError, SessionError};
use crate::graphql::{GraphqlClient, PipelineEvent};
use crate::model::{Course, CourseId, CoursePlan, DeletedTerm, Me, Term, TermId};
use crate::operations::{
    AddCourse, AddCourseVariables, AddCoursePlan, AddCoursePlanVariables, AddTerm,
    AddTermVariables, CreateCoursePlanInput, GetUserTimeline, GetUsername, NoVariables, Operation,
    RemoveCourse, RemoveCourseVariables, RemoveTerm, RemoveTermVariables,
};
use crate::router::{self, HeaderView, Navigator, Route, View};
use crate::token_store::{KeyValueStorage, TokenStore};
use crate::transport::Transport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub enum QueryKey {
    Timeline,
    Username,
}

/// What a listener is being told changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi, from_wasm_abi))]
pub enum Topic {
    Auth,
    Location,
    Query(QueryKey),
    MutationError,
}

pub struct Session<T> {
    config: ApiConfig,
    tokens: TokenStore,
    client: GraphqlClient<T>,

    auth: RefCell<DirtyTracker<AuthSession>>,
    /// Bumped by every logout. A request that sees it change while in flight belongs to a
    /// session that no longer exists.
    generation: Cell<u64>,
    cache: RefCell<QueryCache<QueryKey>>,
    navigator: RefCell<DirtyTracker<Navigator>>,
    /// Shown to the user until the next mutation succeeds.
    last_mutation_error: RefCell<DirtyTracker<Option<String>>>,

    listeners: RefCell<Listeners<Topic>>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        config: ApiConfig,
        storage: Rc<dyn KeyValueStorage>,
        transport: T,
        initial_path: &str,
    ) -> Self {
        std::sync::LazyLock::force(&crate::LOGGER);

        let tokens = TokenStore::new(storage);
        let client = GraphqlClient::new(config.graphql_url(), tokens.clone(), transport);

        // the stored token is trusted as-is; the first 401 will clear it if it's stale
        let auth = match tokens.access_token() {
            Some(access_token) => {
                log::info!("Restoring session from stored access token");
                AuthSession::default().reduce(&AuthAction::LoginSuccess { access_token })
            }
            None => AuthSession::default(),
        };

        Self {
            config,
            tokens,
            client,
            auth: RefCell::new(DirtyTracker::clean(auth)),
            generation: Cell::new(0),
            cache: RefCell::new(QueryCache::default()),
            navigator: RefCell::new(DirtyTracker::clean(Navigator::new(initial_path))),
            last_mutation_error: RefCell::new(DirtyTracker::clean(None)),
            listeners: RefCell::new(Listeners::default()),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    // =======
    // auth
    // =======

    pub fn auth_state(&self) -> AuthSession {
        self.auth.borrow().get().clone()
    }

    pub fn auth_phase(&self) -> AuthPhase {
        self.auth.borrow().get().phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.borrow().get().is_authenticated
    }

    fn dispatch(&self, action: AuthAction) {
        log::debug!("Auth action: {action:?}");
        let mut auth = self.auth.borrow_mut();
        let next = auth.get().clone().reduce(&action);
        auth.value_mut(None).set(next);
    }

    pub async fn login(&self, profile: &GoogleProfile) -> Result<(), SessionError> {
        let _flusher = FlushLater::new(self);

        self.dispatch(AuthAction::LoginRequest);
        self.flush_notifications();

        let stored = match auth::request_token(self.client.transport(), &self.config, profile).await {
            Ok(token) => self
                .tokens
                .set_access_token(&token)
                .map(|()| token)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match stored {
            Ok(access_token) => {
                self.dispatch(AuthAction::LoginSuccess { access_token });
                Ok(())
            }
            Err(message) => {
                log::error!("Login failed: {message}");
                self.dispatch(AuthAction::LoginFailure {
                    message: message.clone(),
                });
                Err(SessionError::Authentication { message })
            }
        }
    }

    /// Always ends logged out locally, whatever the server says. Does nothing if there's no
    /// session to end.
    pub async fn logout(&self) {
        if !self.is_authenticated() {
            log::debug!("Ignoring logout, not logged in");
            return;
        }
        let _flusher = FlushLater::new(self);

        let token = self.auth.borrow().get().access_token.clone();
        self.dispatch(AuthAction::LogoutRequest);
        self.flush_notifications();

        if let Some(token) = token {
            auth::request_logout(self.client.transport(), &self.config, &token).await;
        }

        self.finish_logout();
        self.navigate("/", None);
    }

    /// A 401/403 means the token is no good. No point telling the server about it.
    fn force_logout(&self, status: u16) {
        log::warn!("Forcing logout after the API answered {status}");
        self.dispatch(AuthAction::LogoutRequest);
        self.finish_logout();
        self.navigate("/", None);
    }

    fn finish_logout(&self) {
        self.generation.set(self.generation.get() + 1);
        self.tokens.clear();
        self.dispatch(AuthAction::LogoutSuccess);
        self.cache.borrow_mut().clear();
        self.set_mutation_error(None);
    }

    fn require_authenticated(&self) -> Result<(), SessionError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::NotAuthenticated)
        }
    }

    // =======
    // requests
    // =======

    async fn execute<O: Operation>(&self, variables: &O::Variables) -> Result<O::Data, ApiError> {
        let outcome = self.client.execute::<O>(variables).await;
        for event in self.client.take_events() {
            match event {
                PipelineEvent::Forbidden { status } => self.force_logout(status),
            }
        }
        outcome
    }

    async fn query<O: Operation>(
        &self,
        key: QueryKey,
        variables: &O::Variables,
    ) -> Result<O::Data, SessionError> {
        self.require_authenticated()?;
        let generation = self.generation.get();
        self.cache.borrow_mut().mark_loading(key, None);
        self.flush_notifications();

        let outcome = self.execute::<O>(variables).await;
        // the forced logout already emptied the cache
        if let Err(error) = &outcome
            && let Some(status) = error.status().filter(|_| error.is_forbidden())
        {
            return Err(SessionError::Authorization { status });
        }
        self.still_current(generation, O::NAME)?;

        match outcome {
            Ok(data) => Ok(data),
            Err(error) => {
                log::info!("{} failed: {error}", O::NAME);
                self.cache
                    .borrow_mut()
                    .write_failure(key, error.to_string(), None);
                Err(SessionError::Query(error))
            }
        }
    }

    async fn mutate<O: Operation>(&self, variables: &O::Variables) -> Result<O::Data, SessionError> {
        self.require_authenticated()?;
        let generation = self.generation.get();

        let outcome = self.execute::<O>(variables).await;
        if let Err(error) = &outcome
            && let Some(status) = error.status().filter(|_| error.is_forbidden())
        {
            return Err(SessionError::Authorization { status });
        }
        self.still_current(generation, O::NAME)?;

        let error = match outcome {
            Ok(data) => {
                self.set_mutation_error(None);
                return Ok(data);
            }
            Err(error) => error,
        };
        log::error!("{} failed: {error}", O::NAME);
        self.set_mutation_error(Some(format!("{} failed: {error}", O::NAME)));
        Err(SessionError::Mutation {
            operation: O::NAME,
            source: error,
        })
    }

    fn still_current(&self, generation: u64, operation: &str) -> Result<(), SessionError> {
        if self.generation.get() == generation {
            Ok(())
        } else {
            log::info!("Dropping the {operation} response, the session it belonged to has ended");
            Err(SessionError::NotAuthenticated)
        }
    }

    fn set_mutation_error(&self, message: Option<String>) {
        let mut last = self.last_mutation_error.borrow_mut();
        if *last.get() != message {
            last.value_mut(None).set(message);
        }
    }

    pub fn last_mutation_error(&self) -> Option<String> {
        self.last_mutation_error.borrow().get().clone()
    }

    // =======
    // queries
    // =======

    pub async fn load_timeline(&self) -> Result<(), SessionError> {
        let _flusher = FlushLater::new(self);
        let data = self
            .query::<GetUserTimeline>(QueryKey::Timeline, &NoVariables {})
            .await?;
        self.cache
            .borrow_mut()
            .write(QueryKey::Timeline, &data.course_plan, None)?;
        Ok(())
    }

    /// `None` until the timeline has been asked for.
    pub fn timeline_state(&self) -> Result<Option<QueryState<CoursePlan>>, SessionError> {
        Ok(self.cache.borrow().read::<CoursePlan>(&QueryKey::Timeline)?)
    }

    pub async fn load_username(&self) -> Result<(), SessionError> {
        let _flusher = FlushLater::new(self);
        let data = self
            .query::<GetUsername>(QueryKey::Username, &NoVariables {})
            .await?;
        self.cache
            .borrow_mut()
            .write(QueryKey::Username, &data.me, None)?;
        Ok(())
    }

    pub fn username_state(&self) -> Result<Option<QueryState<String>>, SessionError> {
        let me = self.cache.borrow().read::<Me>(&QueryKey::Username)?;
        Ok(me.map(|state| state.map(|me| me.name)))
    }

    fn cached_plan(&self) -> Result<CoursePlan, SessionError> {
        self.timeline_state()?
            .and_then(QueryState::ready)
            .ok_or(SessionError::NoCoursePlan)
    }

    fn update_timeline(&self, f: impl FnOnce(CoursePlan) -> CoursePlan) -> Result<(), SessionError> {
        if !self
            .cache
            .borrow_mut()
            .update(&QueryKey::Timeline, None, f)?
        {
            log::warn!("Mutation succeeded but there was no cached course plan to update");
        }
        Ok(())
    }

    // =======
    // mutations
    // =======

    pub async fn add_term(&self, name: &str) -> Result<Term, SessionError> {
        let _flusher = FlushLater::new(self);
        let cp_id = self.cached_plan()?.id;

        let term = self
            .mutate::<AddTerm>(&AddTermVariables {
                cp_id,
                new_name: name.to_string(),
            })
            .await?
            .create_term;

        self.update_timeline(|plan| cache_sync::add_term(plan, &term))?;
        Ok(term)
    }

    pub async fn remove_term(&self, term_id: TermId) -> Result<DeletedTerm, SessionError> {
        let _flusher = FlushLater::new(self);

        let removed = self
            .mutate::<RemoveTerm>(&RemoveTermVariables { term_id })
            .await?
            .delete_term;

        self.update_timeline(|plan| cache_sync::remove_term(plan, &removed))?;
        Ok(removed)
    }

    /// Names aren't unique. An unknown name removes nothing, and a name shared by several
    /// terms is refused rather than guessed at.
    pub async fn remove_term_named(&self, name: &str) -> Result<Option<DeletedTerm>, SessionError> {
        let plan = self.cached_plan()?;
        let term_id = match cache_sync::term_lookup(&plan).get(name).map(Vec::as_slice) {
            None | Some([]) => return Ok(None),
            Some([term_id]) => *term_id,
            Some(ids) => {
                return Err(SessionError::AmbiguousTermName {
                    name: name.to_string(),
                    count: ids.len(),
                });
            }
        };
        self.remove_term(term_id).await.map(Some)
    }

    pub async fn add_course(&self, term_id: TermId, name: &str) -> Result<Course, SessionError> {
        let _flusher = FlushLater::new(self);

        let course = self
            .mutate::<AddCourse>(&AddCourseVariables {
                term_id,
                new_name: name.to_string(),
            })
            .await?
            .create_term_course;

        self.update_timeline(|plan| cache_sync::add_course(plan, &course))?;
        Ok(course)
    }

    pub async fn remove_course(&self, course_id: CourseId) -> Result<Course, SessionError> {
        let _flusher = FlushLater::new(self);

        let course = self
            .mutate::<RemoveCourse>(&RemoveCourseVariables { course_id })
            .await?
            .delete_term_course;

        self.update_timeline(|plan| cache_sync::remove_course(plan, &course))?;
        Ok(course)
    }

    /// The new plan replaces whatever the timeline entry held, including a failure.
    pub async fn create_course_plan(
        &self,
        input: CreateCoursePlanInput,
    ) -> Result<CoursePlan, SessionError> {
        let _flusher = FlushLater::new(self);

        let plan = self
            .mutate::<AddCoursePlan>(&AddCoursePlanVariables { cp_input: input })
            .await?
            .create_course_plan;

        self.cache
            .borrow_mut()
            .write(QueryKey::Timeline, &plan, None)?;
        Ok(plan)
    }

    // =======
    // setup
    // =======

    /// Creates an empty plan if the user doesn't have one yet, then heads home. When the
    /// timeline hasn't been answered yet, it is asked for first.
    pub async fn start_empty_plan(&self) -> Result<(), SessionError> {
        let _flusher = FlushLater::new(self);
        let result = self.create_plan_if_missing().await;
        self.navigate("/", None);
        result
    }

    async fn create_plan_if_missing(&self) -> Result<(), SessionError> {
        if let None | Some(QueryState::Loading) = self.timeline_state()? {
            match self.load_timeline().await {
                // a failed timeline query is how we learn there's no plan
                Ok(()) | Err(SessionError::Query(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if let Some(QueryState::Failed { .. }) = self.timeline_state()? {
            self.create_course_plan(CreateCoursePlanInput::default()).await?;
        }
        Ok(())
    }

    /// Heads home whether or not the server could build the plan.
    pub async fn build_plan_for_program(&self, program_key: &str) -> Result<CoursePlan, SessionError> {
        let _flusher = FlushLater::new(self);

        let result = self
            .create_course_plan(CreateCoursePlanInput {
                program: Some(program_key.to_string()),
            })
            .await;

        self.navigate("/", None);
        result
    }

    // =======
    // navigation
    // =======

    pub fn current_path(&self) -> String {
        self.navigator.borrow().get().current_path().to_string()
    }

    pub fn current_route(&self) -> Route {
        self.navigator.borrow().get().route()
    }

    /// `modifier` is the listener that caused the move (e.g. the one mirroring browser history)
    /// and won't be told about it.
    pub fn navigate(&self, path: &str, modifier: Option<ListenerKey>) {
        let _flusher = FlushLater::new(self);
        let mut navigator = self.navigator.borrow_mut();
        let mut next = navigator.get().clone();
        if next.go_to(path) {
            log::debug!("Navigated to {}", next.current_path());
            navigator.value_mut(modifier).set(next);
        }
    }

    /// The view for the current route. A redirect is followed here, so callers never see one.
    pub fn current_view(&self) -> Result<View, SessionError> {
        let _flusher = FlushLater::new(self);

        let view = self.resolve_view()?;
        if let View::Redirect { to } = view {
            log::info!("No course plan found, redirecting to {}", to.path());
            self.navigate(to.path(), None);
            return self.resolve_view();
        }
        Ok(view)
    }

    fn resolve_view(&self) -> Result<View, SessionError> {
        let timeline = self.timeline_state()?;
        Ok(router::resolve_view(
            &self.current_route(),
            self.is_authenticated(),
            timeline.as_ref(),
        ))
    }

    pub fn header_view(&self) -> Result<HeaderView, SessionError> {
        let auth = self.auth_state();
        let username = self.username_state()?;
        Ok(router::resolve_header(
            auth.is_authenticated,
            auth.error_message.as_deref(),
            username.as_ref(),
        ))
    }

    // =======
    // listeners
    // =======

    pub fn subscribe(&self, listener: impl Fn(ListenerKey, Topic) + 'static) -> ListenerKey {
        self.listeners.borrow_mut().register(listener)
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.listeners.borrow_mut().unregister(key)
    }

    /// Runs every pending notification. Borrows are released before any callback runs, since
    /// callbacks usually read state straight back out of the session.
    pub fn flush_notifications(&self) {
        let mut pending: Vec<(Topic, DirtyState)> = vec![
            (Topic::Auth, self.auth.borrow_mut().take_dirty()),
            (Topic::Location, self.navigator.borrow_mut().take_dirty()),
            (
                Topic::MutationError,
                self.last_mutation_error.borrow_mut().take_dirty(),
            ),
        ];
        pending.extend(
            self.cache
                .borrow_mut()
                .drain_dirty()
                .into_iter()
                .map(|(key, state)| (Topic::Query(key), state)),
        );

        let notifications: Vec<Box<dyn FnOnce()>> = {
            let listeners = self.listeners.borrow();
            pending
                .iter()
                .flat_map(|(topic, state)| listeners.notifications(topic, state))
                .collect()
        };
        for notification in notifications {
            notification();
        }
    }
}

/// Flushes listeners when dropped, so no return path can forget to.
struct FlushLater<'a, T: Transport> {
    session: &'a Session<T>,
}

impl<'a, T: Transport> FlushLater<'a, T> {
    fn new(session: &'a Session<T>) -> Self {
        Self { session }
    }
}

impl<T: Transport> Drop for FlushLater<'_, T> {
    fn drop(&mut self) {
        self.session.flush_notifications();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::executor::block_on;
    use futures::future::join;
    use serde_json::json;

    use super::*;
    use crate::config::api_config;
    use crate::token_store::{ACCESS_TOKEN_KEY, MemoryStorage};
    use crate::transport::testing::ScriptedTransport;

    struct Harness {
        storage: Rc<MemoryStorage>,
        transport: Rc<ScriptedTransport>,
        session: Session<Rc<ScriptedTransport>>,
    }

    fn harness(token: Option<&str>, path: &str) -> Harness {
        let storage = Rc::new(MemoryStorage::default());
        if let Some(token) = token {
            storage.set_item(ACCESS_TOKEN_KEY, token).unwrap();
        }
        let transport = Rc::new(ScriptedTransport::default());
        let session = Session::new(
            api_config().with_base_url("http://api.test"),
            storage.clone(),
            transport.clone(),
            path,
        );
        Harness {
            storage,
            transport,
            session,
        }
    }

    fn stored_token(harness: &Harness) -> Option<String> {
        harness.storage.get_item(ACCESS_TOKEN_KEY).unwrap()
    }

    fn profile() -> GoogleProfile {
        GoogleProfile {
            email: "ada@example.com".to_string(),
            google_id: "42".to_string(),
            name: "Ada".to_string(),
        }
    }

    fn fall_plan() -> serde_json::Value {
        json!({
            "id": 1,
            "terms": [
                { "id": 10, "name": "Fall", "courses": [{ "id": 100, "termId": 10, "name": "CS101" }] }
            ]
        })
    }

    fn logged_in_with_plan() -> Harness {
        let h = harness(Some("jwt"), "/");
        h.transport
            .respond(200, json!({ "data": { "coursePlan": fall_plan() } }));
        block_on(h.session.load_timeline()).unwrap();
        h
    }

    fn cached_plan(h: &Harness) -> CoursePlan {
        h.session
            .timeline_state()
            .unwrap()
            .and_then(QueryState::ready)
            .unwrap()
    }

    #[test]
    fn test_startup_restores_persisted_token() {
        let h = harness(Some("jwt"), "/");
        assert_eq!(h.session.auth_phase(), AuthPhase::Authenticated);
        assert_eq!(h.session.auth_state().access_token.as_deref(), Some("jwt"));

        let h = harness(None, "/");
        assert_eq!(h.session.auth_phase(), AuthPhase::Idle);
        assert_eq!(h.session.current_view().unwrap(), View::Landing);
    }

    #[test]
    fn test_login_then_logout_round_trip() {
        let h = harness(None, "/");
        h.transport.respond(200, json!({ "token": "jwt" }));

        block_on(h.session.login(&profile())).unwrap();
        assert!(h.session.is_authenticated());
        assert_eq!(stored_token(&h).as_deref(), Some("jwt"));

        // the logout request fails on the wire, the user is logged out anyway
        h.transport.fail("connection reset");
        block_on(h.session.logout());

        assert!(!h.session.is_authenticated());
        assert_eq!(h.session.auth_phase(), AuthPhase::Idle);
        assert_eq!(stored_token(&h), None);
        assert_eq!(h.session.current_route(), Route::Home);
    }

    #[test]
    fn test_login_failure_is_recorded_and_shown_in_header() {
        let h = harness(None, "/");
        h.transport.respond(500, json!({ "error": "boom" }));

        let error = block_on(h.session.login(&profile())).unwrap_err();

        assert!(matches!(error, SessionError::Authentication { .. }));
        assert_eq!(h.session.auth_phase(), AuthPhase::Failed);
        assert_eq!(stored_token(&h), None);
        let HeaderView::Login { error_message } = h.session.header_view().unwrap() else {
            panic!("expected the login header");
        };
        assert!(error_message.unwrap().contains("500"));
    }

    #[test]
    fn test_forbidden_response_forces_logout() {
        for status in [401, 403] {
            let h = logged_in_with_plan();
            h.session.navigate("/setup", None);
            h.transport.respond(status, json!({ "error": "expired" }));

            let error = block_on(h.session.add_term("Winter")).unwrap_err();

            assert!(matches!(error, SessionError::Authorization { status: s } if s == status));
            assert!(!h.session.is_authenticated());
            assert_eq!(stored_token(&h), None);
            assert_eq!(h.session.current_route(), Route::Home);
            assert_eq!(h.session.timeline_state().unwrap(), None);
            // a forced logout doesn't call /logout
            assert_eq!(h.transport.requests.borrow().len(), 2);
        }
    }

    #[test]
    fn test_failed_timeline_redirects_to_setup() {
        let h = harness(Some("jwt"), "/");
        h.transport.respond(
            200,
            json!({ "data": null, "errors": [{ "message": "Course plan not found" }] }),
        );

        let error = block_on(h.session.load_timeline()).unwrap_err();

        assert!(matches!(error, SessionError::Query(_)));
        assert!(h.session.is_authenticated());
        assert_eq!(h.session.current_view().unwrap(), View::Setup);
        assert_eq!(h.session.current_route(), Route::Setup);
    }

    #[test]
    fn test_mutations_update_cached_plan() {
        let h = logged_in_with_plan();

        h.transport.respond(
            200,
            json!({ "data": { "deleteTermCourse": { "id": 100, "termId": 10, "name": "CS101" } } }),
        );
        block_on(h.session.remove_course(100)).unwrap();

        h.transport.respond(
            200,
            json!({ "data": { "createTerm": { "id": 20, "name": "Winter", "courses": [] } } }),
        );
        block_on(h.session.add_term("Winter")).unwrap();
        assert_eq!(
            h.transport.last_request().body["variables"],
            json!({ "cpId": 1, "newName": "Winter" })
        );

        h.transport.respond(
            200,
            json!({ "data": { "createTermCourse": { "id": 200, "termId": 20, "name": "MATH135" } } }),
        );
        block_on(h.session.add_course(20, "MATH135")).unwrap();

        let plan = cached_plan(&h);
        let names: Vec<_> = plan.terms.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Fall", "Winter"]);
        assert!(plan.terms[0].courses.is_empty());
        assert_eq!(plan.terms[1].courses[0].name, "MATH135");
        assert_eq!(
            h.session.current_view().unwrap(),
            View::Timeline { plan: plan.clone() }
        );
    }

    #[test]
    fn test_failed_mutation_leaves_cache_and_records_error() {
        let h = logged_in_with_plan();
        h.transport.respond(500, json!({}));

        let error = block_on(h.session.remove_term(10)).unwrap_err();

        assert!(matches!(error, SessionError::Mutation { operation: "removeTerm", .. }));
        assert_eq!(cached_plan(&h).terms.len(), 1);
        assert!(h.session.last_mutation_error().is_some());
        assert!(h.session.is_authenticated());

        h.transport.respond(
            200,
            json!({ "data": { "deleteTerm": { "id": 10, "name": "Fall" } } }),
        );
        block_on(h.session.remove_term(10)).unwrap();
        assert_eq!(h.session.last_mutation_error(), None);
        assert!(cached_plan(&h).terms.is_empty());
    }

    #[test]
    fn test_remove_term_by_name() {
        let h = logged_in_with_plan();

        assert!(block_on(h.session.remove_term_named("Spring")).unwrap().is_none());
        assert_eq!(h.transport.requests.borrow().len(), 1);

        h.transport.respond(
            200,
            json!({ "data": { "createTerm": { "id": 11, "name": "Fall", "courses": [] } } }),
        );
        block_on(h.session.add_term("Fall")).unwrap();
        let error = block_on(h.session.remove_term_named("Fall")).unwrap_err();
        assert!(matches!(error, SessionError::AmbiguousTermName { count: 2, .. }));

        h.transport.respond(
            200,
            json!({ "data": { "deleteTerm": { "id": 11, "name": "Fall" } } }),
        );
        block_on(h.session.remove_term(11)).unwrap();
        h.transport.respond(
            200,
            json!({ "data": { "deleteTerm": { "id": 10, "name": "Fall" } } }),
        );
        let removed = block_on(h.session.remove_term_named("Fall")).unwrap().unwrap();
        assert_eq!(removed.id, 10);
        assert_eq!(
            h.transport.last_request().body["variables"],
            json!({ "termId": 10 })
        );
    }

    #[test]
    fn test_start_empty_plan_after_failed_timeline() {
        let h = harness(Some("jwt"), "/setup");
        h.transport
            .respond(200, json!({ "data": null, "errors": [{ "message": "none" }] }));
        let _ = block_on(h.session.load_timeline());

        h.transport.respond(
            200,
            json!({ "data": { "createCoursePlan": { "id": 5, "terms": [] } } }),
        );
        block_on(h.session.start_empty_plan()).unwrap();

        assert_eq!(
            h.transport.last_request().body["variables"],
            json!({ "cpInput": {} })
        );
        assert_eq!(h.session.current_route(), Route::Home);
        assert_eq!(
            h.session.current_view().unwrap(),
            View::Timeline {
                plan: CoursePlan { id: 5, terms: vec![] }
            }
        );
    }

    #[test]
    fn test_start_empty_plan_on_fresh_setup_page() {
        let h = harness(Some("jwt"), "/setup");
        assert_eq!(h.session.timeline_state().unwrap(), None);
        h.transport
            .respond(200, json!({ "data": null, "errors": [{ "message": "none" }] }));
        h.transport.respond(
            200,
            json!({ "data": { "createCoursePlan": { "id": 5, "terms": [] } } }),
        );

        block_on(h.session.start_empty_plan()).unwrap();

        let operations: Vec<_> = h
            .transport
            .requests
            .borrow()
            .iter()
            .map(|request| request.body["operationName"].clone())
            .collect();
        assert_eq!(operations, vec![json!("GetUserTimeline"), json!("addCoursePlan")]);
        assert_eq!(
            h.session.current_view().unwrap(),
            View::Timeline {
                plan: CoursePlan { id: 5, terms: vec![] }
            }
        );
    }

    #[test]
    fn test_start_empty_plan_keeps_existing_plan() {
        let h = harness(Some("jwt"), "/setup");
        h.transport
            .respond(200, json!({ "data": { "coursePlan": fall_plan() } }));

        block_on(h.session.start_empty_plan()).unwrap();

        assert_eq!(h.transport.requests.borrow().len(), 1);
        assert_eq!(h.session.current_route(), Route::Home);
        assert_eq!(cached_plan(&h).terms[0].name, "Fall");
    }

    #[test]
    fn test_program_plan_navigates_home_even_on_failure() {
        let h = harness(Some("jwt"), "/setup");
        h.transport.respond(500, json!({}));

        let key = crate::setup::programs()
            .program_key("Engineering", "Software Engineering", "2018-2019")
            .map(str::to_string)
            .unwrap();
        assert!(block_on(h.session.build_plan_for_program(&key)).is_err());

        assert_eq!(
            h.transport.last_request().body["variables"],
            json!({ "cpInput": { "program": "uw-software-engineering_2018-2019_stream-8" } })
        );
        assert_eq!(h.session.current_route(), Route::Home);
    }

    #[test]
    fn test_requests_need_a_session() {
        let h = harness(None, "/");
        assert!(matches!(
            block_on(h.session.load_timeline()),
            Err(SessionError::NotAuthenticated)
        ));
        assert!(matches!(
            block_on(h.session.add_term("Fall")),
            Err(SessionError::NoCoursePlan)
        ));
        assert!(h.transport.requests.borrow().is_empty());
    }

    #[test]
    fn test_username_in_header() {
        let h = harness(Some("jwt"), "/");
        assert_eq!(
            h.session.header_view().unwrap(),
            HeaderView::Account {
                username: QueryState::Loading
            }
        );

        h.transport
            .respond(200, json!({ "data": { "me": { "name": "Ada" } } }));
        block_on(h.session.load_username()).unwrap();
        assert_eq!(
            h.session.header_view().unwrap(),
            HeaderView::Account {
                username: QueryState::Ready("Ada".to_string())
            }
        );
    }

    #[test]
    fn test_logout_clears_cache_and_notifies() {
        let h = logged_in_with_plan();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = seen.clone();
        h.session
            .subscribe(move |_, topic| recorder.borrow_mut().push(topic));

        h.transport.respond(200, json!({}));
        block_on(h.session.logout());

        assert_eq!(h.session.timeline_state().unwrap(), None);
        let seen = seen.borrow();
        assert!(seen.contains(&Topic::Auth));
        assert!(seen.contains(&Topic::Query(QueryKey::Timeline)));
    }

    #[test]
    fn test_listeners_see_updated_cache() {
        let h = logged_in_with_plan();
        let h = Rc::new(h);
        let observed = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&h);
        let sink = observed.clone();
        h.session.subscribe(move |_, topic| {
            if topic == Topic::Query(QueryKey::Timeline)
                && let Some(h) = weak.upgrade()
            {
                let terms = h
                    .session
                    .timeline_state()
                    .unwrap()
                    .and_then(QueryState::ready)
                    .map(|plan| plan.terms.len());
                sink.borrow_mut().push(terms);
            }
        });

        h.transport.respond(
            200,
            json!({ "data": { "createTerm": { "id": 20, "name": "Winter", "courses": [] } } }),
        );
        block_on(h.session.add_term("Winter")).unwrap();

        assert_eq!(*observed.borrow(), vec![Some(2)]);
    }

    #[test]
    fn test_timeline_answered_after_logout_is_dropped() {
        let h = harness(Some("jwt"), "/");
        let release = h
            .transport
            .respond_when_released(200, json!({ "data": { "coursePlan": fall_plan() } }));
        h.transport.respond(200, json!({}));

        let session = &h.session;
        let (loaded, ()) = block_on(join(session.load_timeline(), async move {
            session.logout().await;
            let _ = release.send(());
        }));

        assert!(matches!(loaded, Err(SessionError::NotAuthenticated)));
        assert_eq!(h.session.timeline_state().unwrap(), None);

        // the next user must not inherit the old plan
        h.transport.respond(200, json!({ "token": "jwt2" }));
        block_on(h.session.login(&profile())).unwrap();
        assert_eq!(h.session.timeline_state().unwrap(), None);
        assert_eq!(h.session.current_view().unwrap(), View::Loading);
    }

    #[test]
    fn test_plan_created_after_logout_is_not_cached() {
        let h = harness(Some("jwt"), "/setup");
        let release = h.transport.respond_when_released(
            200,
            json!({ "data": { "createCoursePlan": { "id": 5, "terms": [] } } }),
        );
        h.transport.respond(200, json!({}));

        let session = &h.session;
        let (created, ()) = block_on(join(
            session.create_course_plan(CreateCoursePlanInput::default()),
            async move {
                session.logout().await;
                let _ = release.send(());
            },
        ));

        assert!(matches!(created, Err(SessionError::NotAuthenticated)));
        assert_eq!(h.session.timeline_state().unwrap(), None);
        assert_eq!(h.session.last_mutation_error(), None);
        assert!(!h.session.is_authenticated());
    }

    #[test]
    fn test_listeners_see_in_flight_states() {
        let h = Rc::new(harness(None, "/"));
        let phases = Rc::new(RefCell::new(Vec::new()));
        let timelines = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&h);
        let (phase_sink, timeline_sink) = (phases.clone(), timelines.clone());
        h.session.subscribe(move |_, topic| {
            let Some(h) = weak.upgrade() else {
                return;
            };
            match topic {
                Topic::Auth => phase_sink.borrow_mut().push(h.session.auth_phase()),
                Topic::Query(QueryKey::Timeline) => {
                    let state = h.session.timeline_state().unwrap();
                    timeline_sink.borrow_mut().push(match state {
                        None => "none",
                        Some(QueryState::Loading) => "loading",
                        Some(QueryState::Ready(_)) => "ready",
                        Some(QueryState::Failed { .. }) => "failed",
                    });
                }
                _ => {}
            }
        });
        let session = &h.session;

        let release = h.transport.respond_when_released(200, json!({ "token": "jwt" }));
        let (logged_in, ()) = block_on(join(session.login(&profile()), async {
            assert_eq!(*phases.borrow(), vec![AuthPhase::LoggingIn]);
            let _ = release.send(());
        }));
        logged_in.unwrap();
        assert_eq!(
            *phases.borrow(),
            vec![AuthPhase::LoggingIn, AuthPhase::Authenticated]
        );

        let release = h
            .transport
            .respond_when_released(200, json!({ "data": { "coursePlan": fall_plan() } }));
        let (loaded, ()) = block_on(join(session.load_timeline(), async {
            assert_eq!(*timelines.borrow(), vec!["loading"]);
            assert_eq!(session.current_view().unwrap(), View::Loading);
            let _ = release.send(());
        }));
        loaded.unwrap();
        assert_eq!(*timelines.borrow(), vec!["loading", "ready"]);

        let release = h.transport.respond_when_released(200, json!({}));
        block_on(join(session.logout(), async {
            assert_eq!(phases.borrow().last(), Some(&AuthPhase::LoggingOut));
            let _ = release.send(());
        }));
        assert_eq!(phases.borrow().last(), Some(&AuthPhase::Idle));
        assert_eq!(*timelines.borrow(), vec!["loading", "ready", "none"]);
    }

    #[test]
    fn test_logout_without_session_changes_nothing() {
        let h = harness(None, "/setup");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = seen.clone();
        h.session
            .subscribe(move |_, topic| recorder.borrow_mut().push(topic));

        block_on(h.session.logout());

        assert!(seen.borrow().is_empty());
        assert!(h.transport.requests.borrow().is_empty());
        assert_eq!(h.session.auth_phase(), AuthPhase::Idle);
        assert_eq!(h.session.current_route(), Route::Setup);
    }

    #[test]
    fn test_navigation_modifier_is_not_notified() {
        let h = harness(None, "/");
        let calls = Rc::new(RefCell::new(Vec::new()));

        let sink = calls.clone();
        let history = h
            .session
            .subscribe(move |key, _| sink.borrow_mut().push(key));
        let sink = calls.clone();
        let other = h
            .session
            .subscribe(move |key, _| sink.borrow_mut().push(key));

        h.session.navigate("/setup", Some(history));
        assert_eq!(*calls.borrow(), vec![other]);

        h.session.unsubscribe(other);
        h.session.navigate("/", None);
        assert_eq!(*calls.borrow(), vec![other, history]);
    }
}
