//! Gate identities and verdicts.

use std::fmt;

use thiserror::Error;

use sipdrain_core::PlatformError;
use sipdrain_state::StateError;

/// One admission gate, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Cooldown,
    HourlyLimit,
    ConcurrencyLimit,
    AtMinCapacity,
}

impl Gate {
    pub const ORDER: [Gate; 4] = [
        Gate::Cooldown,
        Gate::HourlyLimit,
        Gate::ConcurrencyLimit,
        Gate::AtMinCapacity,
    ];

    /// Reason string used in outcomes and metric dimensions.
    pub fn reason(&self) -> &'static str {
        match self {
            Gate::Cooldown => "cooldown",
            Gate::HourlyLimit => "hourly_limit",
            Gate::ConcurrencyLimit => "concurrency_limit",
            Gate::AtMinCapacity => "at_min_capacity",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A gate's veto. Capacity figures are present only when the
/// min-capacity gate denied after reading both of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub gate: Gate,
    pub desired: Option<u32>,
    pub min: Option<u32>,
}

impl Denial {
    pub fn by(gate: Gate) -> Self {
        Self {
            gate,
            desired: None,
            min: None,
        }
    }
}

/// Result of a full evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Every gate passed. `draining` is the service's DRAINING count
    /// observed by the concurrency gate.
    Admit { draining: usize },
    Deny(Denial),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit { .. })
    }
}

/// Failure while evaluating a gate. Never escapes the controller: it is
/// converted into a denial.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("state store: {0}")]
    Store(#[from] StateError),

    #[error("control plane: {0}")]
    Platform(#[from] PlatformError),

    #[error("service {0} not found")]
    ServiceNotFound(String),
}
