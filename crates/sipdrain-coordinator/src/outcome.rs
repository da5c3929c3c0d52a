//! Terminal outcomes of the two handlers, serialized as the JSON bodies
//! the HTTP surface returns.

use serde::{Deserialize, Serialize};

use sipdrain_admission::{Denial, Gate};

/// Why an attempt was skipped without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyDraining,
    Cooldown,
    HourlyLimit,
    ConcurrencyLimit,
    AtMinCapacity,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyDraining => "already_draining",
            SkipReason::Cooldown => "cooldown",
            SkipReason::HourlyLimit => "hourly_limit",
            SkipReason::ConcurrencyLimit => "concurrency_limit",
            SkipReason::AtMinCapacity => "at_min_capacity",
        }
    }
}

impl From<Gate> for SkipReason {
    fn from(gate: Gate) -> Self {
        match gate {
            Gate::Cooldown => SkipReason::Cooldown,
            Gate::HourlyLimit => SkipReason::HourlyLimit,
            Gate::ConcurrencyLimit => SkipReason::ConcurrencyLimit,
            Gate::AtMinCapacity => SkipReason::AtMinCapacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    TaskNotFound,
    NoAddress,
    DeregFailed,
    DrainStartFailed,
    MissingFleet,
    UpdateFailed,
    UnexpectedError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::TaskNotFound => "task_not_found",
            FailureReason::NoAddress => "no_address",
            FailureReason::DeregFailed => "dereg_failed",
            FailureReason::DrainStartFailed => "drain_start_failed",
            FailureReason::MissingFleet => "missing_fleet",
            FailureReason::UpdateFailed => "update_failed",
            FailureReason::UnexpectedError => "unexpected_error",
        }
    }
}

/// Outcome of one scale-in attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    Started {
        #[serde(rename = "taskArn")]
        task_arn: String,
        ip: String,
        #[serde(rename = "drainId")]
        drain_id: String,
    },
    Skipped {
        reason: SkipReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desired: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
    },
    #[serde(rename = "error")]
    Failed { reason: FailureReason },
}

impl DrainOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        DrainOutcome::Skipped {
            reason,
            desired: None,
            min: None,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        DrainOutcome::Failed { reason }
    }
}

impl From<Denial> for DrainOutcome {
    fn from(denial: Denial) -> Self {
        DrainOutcome::Skipped {
            reason: denial.gate.into(),
            desired: denial.desired,
            min: denial.min,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    NotDraining,
    DrainIdMismatch,
}

/// Outcome of one completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// Capacity decremented; `desired` is the count after the decrement.
    Scaled { desired: u32 },
    Skipped {
        reason: SkipReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        desired: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
    },
    Unauthorized,
    BadRequest,
    Conflict { reason: ConflictReason },
    #[serde(rename = "error")]
    Failed { reason: FailureReason },
}

impl CompletionOutcome {
    /// HTTP status the callback endpoint answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            CompletionOutcome::Scaled { .. } | CompletionOutcome::Skipped { .. } => 200,
            CompletionOutcome::BadRequest => 400,
            CompletionOutcome::Unauthorized => 401,
            CompletionOutcome::Conflict { .. } => 409,
            CompletionOutcome::Failed { .. } => 500,
        }
    }
}
