#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("persistent storage is not available: {0}")]
    Unavailable(String),
    #[error("storage rejected write of `{key}`: {message}")]
    Write { key: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("could not read response body from {url}: {message}")]
    Body { url: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("GraphQL error: {}", .0.join("; "))]
    Graphql(Vec<String>),
    #[error("response carried no data")]
    MissingData,
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 both mean the session is no longer usable.
    pub fn is_forbidden(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("login failed: {message}")]
    Authentication { message: String },
    #[error("not authorized (status {status}), you have been logged out")]
    Authorization { status: u16 },
    #[error("query failed: {0}")]
    Query(#[source] ApiError),
    #[error("{operation} failed: {source}")]
    Mutation {
        operation: &'static str,
        #[source]
        source: ApiError,
    },
    #[error("not logged in")]
    NotAuthenticated,
    #[error("no course plan is loaded")]
    NoCoursePlan,
    #[error("{count} terms are named `{name}`, remove one by id instead")]
    AmbiguousTermName { name: String, count: usize },
    #[error("cached data has an unexpected shape: {0}")]
    Cache(#[from] serde_json::Error),
}
