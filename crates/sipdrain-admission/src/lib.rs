//! sipdrain-admission — veto or permit one scale-in attempt.
//!
//! Four gates, evaluated in a fixed order against the task's service:
//!
//! ```text
//! cooldown           any drain started within cooldown_seconds      → deny
//! hourly_limit       drains started in the trailing hour >= cap     → deny
//! concurrency_limit  records currently DRAINING >= limit            → deny
//! at_min_capacity    desired count <= configured minimum            → deny
//! ```
//!
//! The first denial short-circuits. Every gate is fail-safe: an error
//! while evaluating it is logged and reported as a denial by that gate.
//!
//! The three counting gates read the store's secondary index, so under
//! concurrent attempts for different tasks of one service they are
//! advisory. Single-task exclusivity comes from the store's conditional
//! put, not from these counters.

pub mod controller;
pub mod gate;

pub use controller::{AdmissionController, AdmissionLimits};
pub use gate::{Admission, Denial, Gate, GateError};
