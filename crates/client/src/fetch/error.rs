//! Network error types.

use std::sync::Arc;

/// Errors from the network layer.
///
/// Any of these means the transport gave no response at all; HTTP error
/// statuses arrive as ordinary responses.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// Request timed out at the transport.
    #[error("request timeout")]
    Timeout,

    /// Host could not be reached (DNS, refused connection, offline).
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Response body could not be read.
    #[error("failed to read response: {0}")]
    Body(String),

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::Unreachable(err.to_string())
        } else {
            NetworkError::Transport(Arc::new(err))
        }
    }
}

impl From<NetworkError> for offcache_core::Error {
    fn from(err: NetworkError) -> Self {
        offcache_core::Error::Network(err.to_string())
    }
}
