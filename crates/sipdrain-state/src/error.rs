//! Error types for the drain-record store.

use thiserror::Error;

use crate::types::DrainState;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// The conditional write's expectation did not hold. `found` is the
    /// state observed inside the write transaction (`None` = no record).
    #[error("condition failed for {key}: found {found:?}")]
    ConditionFailed {
        key: String,
        found: Option<DrainState>,
    },
}

impl StateError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StateError::ConditionFailed { .. })
    }
}
