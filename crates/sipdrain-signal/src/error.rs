//! Signaling error types.

use std::time::Duration;

use thiserror::Error;

pub type SignalResult<T> = Result<T, SignalError>;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("unsupported scheme {0}; only http is supported")]
    UnsupportedScheme(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        last: Box<SignalError>,
    },
}
