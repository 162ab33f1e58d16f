use std::io;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("not logged in (http 401)")]
    Unauthorized { message: Option<String> },
    #[error("not permitted (http 403)")]
    Forbidden { message: Option<String> },
    /// Refused locally before anything was sent.
    #[error("{0}")]
    UploadRejected(String),
    #[error("http status {status}")]
    HttpStatus { status: u16, message: Option<String> },
    #[error("response too large (max {max_bytes} bytes)")]
    TooLarge { max_bytes: u64 },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// The `error` field of the service's JSON error body, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::HttpStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("no items selected")]
    EmptySelection,
    #[error("{message}")]
    SubmissionFailed { message: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] io::Error),
}
