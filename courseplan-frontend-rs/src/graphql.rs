//! The request pipeline every GraphQL operation goes through, always in this order:
//!
//! 1. [`AuthLink`] puts the stored bearer token on the request (or an empty credential).
//! 2. [`ForbiddenLink`] watches the outcome. A 401/403 is reported as a [`PipelineEvent`];
//!    the error itself still goes back to the caller untouched.
//! 3. The [`Transport`] does the actual HTTP.
//!
//! The pipeline never logs anyone out by itself. Whoever owns the client drains
//! [`GraphqlClient::take_events`] and decides what a forbidden response means.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::operations::Operation;
use crate::token_store::TokenStore;
use crate::transport::{HttpResponse, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    Forbidden { status: u16 },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a, V> {
    operation_name: &'a str,
    query: &'a str,
    variables: &'a V,
}

#[derive(Deserialize)]
struct GraphqlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

pub struct AuthLink {
    tokens: TokenStore,
}

impl AuthLink {
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }

    pub fn decorate(&self, headers: &mut Vec<(String, String)>) {
        let credential = self
            .tokens
            .access_token()
            .map(|token| format!("Bearer {token}"))
            .unwrap_or_default();
        headers.push(("authorization".to_string(), credential));
    }
}

#[derive(Default)]
pub struct ForbiddenLink {
    events: RefCell<Vec<PipelineEvent>>,
}

impl ForbiddenLink {
    pub fn observe(&self, outcome: &Result<HttpResponse, ApiError>) {
        let Err(error) = outcome else {
            return;
        };
        if error.is_forbidden()
            && let Some(status) = error.status()
        {
            log::warn!("GraphQL request was rejected with status {status}");
            self.events
                .borrow_mut()
                .push(PipelineEvent::Forbidden { status });
        }
    }

    fn take(&self) -> Vec<PipelineEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

pub struct GraphqlClient<T> {
    endpoint: String,
    auth: AuthLink,
    forbidden: ForbiddenLink,
    transport: T,
}

impl<T: Transport> GraphqlClient<T> {
    pub fn new(endpoint: String, tokens: TokenStore, transport: T) -> Self {
        Self {
            endpoint,
            auth: AuthLink::new(tokens),
            forbidden: ForbiddenLink::default(),
            transport,
        }
    }

    /// The bare transport, for the REST calls that don't go through the pipeline.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn take_events(&self) -> Vec<PipelineEvent> {
        self.forbidden.take()
    }

    pub async fn execute<O: Operation>(&self, variables: &O::Variables) -> Result<O::Data, ApiError> {
        let request = serde_json::to_value(GraphqlRequest {
            operation_name: O::NAME,
            query: O::DOCUMENT,
            variables,
        })?;

        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        self.auth.decorate(&mut headers);

        let outcome = self.send(&headers, &request).await;
        self.forbidden.observe(&outcome);
        let response = outcome?;

        let GraphqlResponse { data, errors } =
            serde_json::from_str::<GraphqlResponse<O::Data>>(&response.body)?;
        if !errors.is_empty() {
            return Err(ApiError::Graphql(
                errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        data.ok_or(ApiError::MissingData)
    }

    async fn send(
        &self,
        headers: &[(String, String)],
        request: &serde_json::Value,
    ) -> Result<HttpResponse, ApiError> {
        let response = self
            .transport
            .post_json(&self.endpoint, headers, request)
            .await?;
        if !response.ok() {
            return Err(ApiError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }
}
