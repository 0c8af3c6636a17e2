//! Error types for the ZeroPush client.
//!
//! # Design
//! Configuration and validation failures are detected before any request is
//! built, so they never reach the network. A `Remote` failure carries the
//! decoded envelope (error record plus headers) because quota headers arrive
//! even on rejected calls and callers may still want to read them.

use thiserror::Error;

use crate::response::ZeroResponse;

/// Errors returned by `ZeroPushClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client was configured without a bearer credential.
    #[error("auth token is not set")]
    MissingAuthToken,

    /// The configured base URL could not be parsed or cannot carry a path.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// Caller-supplied arguments violate a precondition. No request was sent.
    #[error("{0}")]
    Validation(String),

    /// The transport failed before a response was available.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body is not JSON of the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The server answered with a status above 299. The message is the
    /// value of the `"error"` key in the body, empty if absent.
    #[error("{message}")]
    Remote {
        status: u16,
        message: String,
        response: Box<ZeroResponse>,
    },
}

impl ApiError {
    pub(crate) fn validation(msg: &str) -> Self {
        ApiError::Validation(msg.to_string())
    }

    /// The envelope attached to a remote failure, if any.
    pub fn response(&self) -> Option<&ZeroResponse> {
        match self {
            ApiError::Remote { response, .. } => Some(response),
            _ => None,
        }
    }

    /// HTTP status of a remote failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }

    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, ApiError::MissingAuthToken | ApiError::InvalidBaseUrl(_))
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
