use thiserror::Error;

/// Errors surfaced by the sync layer.
///
/// Storage failures never appear here: they are degraded to cache misses
/// at the [`crate::persist::PersistedStore`] boundary.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The gateway failed; carries HTTP status and body where available.
    #[error("Gateway error: {0}")]
    Api(#[from] gather_api::ApiError),

    /// No credential, or the server rejected the one we have.  Surfaced
    /// distinctly so the UI redirects to sign-in instead of showing a
    /// generic failure.
    #[error("Authentication required")]
    Auth,

    /// Cached data did not match the expected shape.
    #[error("Cache decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A failure shared by every caller coalesced onto one in-flight load.
    #[error("{0}")]
    Upstream(std::sync::Arc<ClientError>),
}

impl ClientError {
    /// Collapse gateway auth failures into [`ClientError::Auth`].
    pub fn classify(self) -> Self {
        match self {
            Self::Api(e) if e.is_auth_failure() => Self::Auth,
            Self::Upstream(e) if matches!(&*e, Self::Api(inner) if inner.is_auth_failure()) => {
                Self::Auth
            }
            other => other,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
