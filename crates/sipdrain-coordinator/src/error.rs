//! Coordinator error types.
//!
//! Only unexpected failures are errors. Admission denials, state
//! conflicts and exhausted signaling retries are outcomes.

use thiserror::Error;

use sipdrain_core::PlatformError;
use sipdrain_state::StateError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("control plane error: {0}")]
    Platform(#[from] PlatformError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
