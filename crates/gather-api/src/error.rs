use thiserror::Error;

/// Errors produced by the gateway.
///
/// Read paths that the platform defines as null-on-failure catch these at
/// the gateway boundary and return `None`; mutation paths surface them so
/// the optimistic coordinator can roll back.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Connectivity failure or protocol-level error.
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// Non-2xx HTTP response; the body is surfaced for the UI.
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The GraphQL endpoint returned errors alongside (or instead of) data.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The response body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response carried an unparseable timestamp.
    #[error("Invalid timestamp in response: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// The client was constructed with an unusable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e)
        }
    }
}

impl ApiError {
    /// Whether this failure means "not authenticated" rather than a
    /// transport problem, so the UI can redirect to sign-in.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}
