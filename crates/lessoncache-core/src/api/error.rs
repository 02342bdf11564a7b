use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - sign in again")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// FastAPI-style error body: `{"detail": "..."}` or `{"detail": [{"msg": "..."}]}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<ValidationItem>),
}

#[derive(Debug, Deserialize)]
struct ValidationItem {
    msg: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable message out of a server error body, falling
    /// back to the (truncated) raw body.
    fn server_message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: ErrorDetail::Message(msg),
            }) => msg,
            Ok(ErrorBody {
                detail: ErrorDetail::Items(items),
            }) if !items.is_empty() => items
                .into_iter()
                .map(|item| item.msg)
                .collect::<Vec<_>>()
                .join("; "),
            _ => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 | 422 => ApiError::Validation(Self::server_message(body)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(Self::truncate_body(body)),
            404 => ApiError::NotFound(Self::truncate_body(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// Failures worth retrying later: the request itself was fine.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkError(_) | ApiError::ServerError(_) | ApiError::RateLimited
        )
    }

    /// Find the `ApiError` inside an `anyhow` chain, if there is one.
    pub fn find(err: &anyhow::Error) -> Option<&ApiError> {
        err.chain().find_map(|cause| cause.downcast_ref::<ApiError>())
    }
}
