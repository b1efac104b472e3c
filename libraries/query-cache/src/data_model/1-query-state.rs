//! # QueryState
//! The lifecycle of one cached query. A query that was never requested has no entry at all;
//! once requested it is `Loading` until the response arrives, then either `Ready` or `Failed`.

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(from_wasm_abi, into_wasm_abi))]
#[serde(tag = "status", content = "data", rename_all = "camelCase")]
pub enum QueryState<D> {
    Loading,
    Failed { message: String },
    Ready(D),
}

impl<D> QueryState<D> {
    pub fn map<G, F: FnOnce(D) -> G>(self, f: F) -> QueryState<G> {
        match self {
            QueryState::Loading => QueryState::Loading,
            QueryState::Failed { message } => QueryState::Failed { message },
            QueryState::Ready(data) => QueryState::Ready(f(data)),
        }
    }

    pub fn as_ref(&self) -> QueryState<&D> {
        match self {
            QueryState::Loading => QueryState::Loading,
            QueryState::Failed { message } => QueryState::Failed {
                message: message.clone(),
            },
            QueryState::Ready(data) => QueryState::Ready(data),
        }
    }

    pub fn ready(self) -> Option<D> {
        match self {
            QueryState::Ready(data) => Some(data),
            QueryState::Loading | QueryState::Failed { .. } => None,
        }
    }
}

impl<D, Error> QueryState<Result<D, Error>> {
    pub fn transpose(self) -> Result<QueryState<D>, Error> {
        match self {
            QueryState::Loading => Ok(QueryState::Loading),
            QueryState::Failed { message } => Ok(QueryState::Failed { message }),
            QueryState::Ready(data) => data.map(QueryState::Ready),
        }
    }
}
