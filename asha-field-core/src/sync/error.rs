//! Remote endpoint error types.

use std::time::Duration;

use thiserror::Error;

/// Why a request to the remote system did not produce a durable acknowledgement.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// No endpoint configured.
    #[error("sync not configured; add sync.base_url to the config")]
    NotConfigured,

    /// Failed to reach the server.
    #[error("network error: {0}")]
    Network(String),

    /// No response within the per-request budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success HTTP status.
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The server answered `success: false`.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The server claimed success without a durable identifier.
    #[error("server acknowledged without a server id")]
    MissingServerId,

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
