use std::sync::Arc;

use thiserror::Error;

use super::key::QueryKey;
use crate::api::ApiError;

/// Failure of a cached query.
///
/// `Clone` so one failed fetch can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("{0:#}")]
    Fetch(Arc<anyhow::Error>),

    #[error("Query {0} is disabled")]
    Disabled(QueryKey),

    #[error("Query {0} was cancelled")]
    Cancelled(QueryKey),

    #[error("Query {0} holds a value of a different type")]
    TypeMismatch(QueryKey),

    #[error("Query {0} needs a Tokio runtime to fetch")]
    NoRuntime(QueryKey),
}

impl QueryError {
    /// The gateway error behind a failed fetch, if there is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            QueryError::Fetch(e) => ApiError::find(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled(_))
    }
}

impl From<anyhow::Error> for QueryError {
    fn from(e: anyhow::Error) -> Self {
        QueryError::Fetch(Arc::new(e))
    }
}
