use thiserror::Error;

/// Application-wide error types for leadlens.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource does not exist remotely (handle, entity, tag).
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote rejected the active identity's auth material.
    #[error("authentication rejected for identity {identity}")]
    AuthRejected { identity: String },

    /// Rate limit exceeded.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Request timed out.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("network error: {0}")]
    Network(String),

    /// Response had a success status but not the expected shape.
    /// The remote serves soft-blocks this way, so it is treated as
    /// throttling rather than a structural failure.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Unexpected HTTP status outside the auth/rate-limit classes.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Caller supplied invalid filter/limit/pool parameters.
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// Every identity in the pool was tried and failed.
    #[error("credential pool exhausted after {attempts} attempts: {last_error}")]
    PoolExhausted { attempts: usize, last_error: String },

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if rotating to another identity and retrying may
    /// help. Structural failures (missing resources, bad parameters)
    /// are not retried; a different credential cannot conjure an
    /// absent resource.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::AuthRejected { .. }
                | AppError::RateLimited
                | AppError::Timeout(_)
                | AppError::Network(_)
                | AppError::MalformedPayload(_)
        )
    }
}
