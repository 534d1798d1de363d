use thiserror::Error;

use crate::util::http::{ClientError, StatusCode};

/// Errors reported by [`FleetClient`](super::FleetClient) operations.
///
/// Every transport, status, and parse failure is converted into one of
/// these variants; nothing panics past the client boundary. Non-2xx
/// replies are not retried.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, timeout or other transport failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The controller replied with a non-2xx status.
    #[error("server replied with status {0}")]
    Status(StatusCode),

    /// The reply was not valid JSON or was missing an expected field.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A well-formed reply carrying an empty collection.
    #[error("{0}")]
    EmptyResult(&'static str),

    /// The controller's envelope reported an error (`code != 0`).
    #[error("controller error: {0}")]
    Controller(String),
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Request(msg) => ApiError::Transport(msg),
            ClientError::Response(status) => ApiError::Status(status),
            ClientError::Client(e) => ApiError::Transport(e.to_string()),
            ClientError::Server(e) => ApiError::Decode(e.to_string()),
        }
    }
}

impl ApiError {
    pub(crate) fn missing(field: &str) -> Self {
        ApiError::Decode(format!("missing field `{field}` in reply"))
    }
}
