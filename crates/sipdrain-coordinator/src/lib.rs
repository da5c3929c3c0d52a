//! sipdrain-coordinator — the two-phase scale-in protocol.
//!
//! # Phase 1: [`DrainInitiator`]
//!
//! A scale-in attempt names a task. The initiator resolves its service,
//! runs the admission gates, claims the task with a conditional
//! `absent|RUNNING → DRAINING` write, de-registers its address from call
//! routing and asks its media server to drain. A signaling failure rolls
//! the record back to RUNNING.
//!
//! # Phase 2: [`CompletionHandler`]
//!
//! The media server calls back once empty. The handler authenticates the
//! call, matches it to the DRAINING record by drain id, re-checks the
//! capacity floor, shrinks the service by one and marks the task
//! SCALED_OUT.
//!
//! # Also here
//!
//! - [`HttpControlPlane`] / [`HttpCapacityPolicy`]: JSON clients for the
//!   collaborator traits in `sipdrain-core`
//! - [`select_candidate`]: newest RUNNING task not already draining
//! - [`find_stuck_drains`]: read-only scan for DRAINING records past their
//!   ceiling

pub mod candidate;
pub mod completion;
pub mod error;
pub mod initiator;
pub mod outcome;
pub mod platform_http;
pub mod reconcile;

pub use candidate::select_candidate;
pub use completion::{CompletionHandler, CompletionRequest};
pub use error::{CoordinatorError, CoordinatorResult};
pub use initiator::{DrainInitiator, DrainSettings, ScaleInRequest};
pub use outcome::{CompletionOutcome, ConflictReason, DrainOutcome, FailureReason, SkipReason};
pub use platform_http::{HttpCapacityPolicy, HttpControlPlane};
pub use reconcile::{StuckDrain, find_stuck_drains, report_stuck_drains};
