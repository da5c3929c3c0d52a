//! sipdrain-signal — outbound signaling for scale-in drains.
//!
//! Two independent channels, each caller-idempotent:
//!
//! - **routing** — asynchronous de-registration of a task's address from
//!   the call-routing layer (`comment_out_ip`), success = `202 Accepted`
//! - **media** — `POST /drain/start` on the task's media server,
//!   success = `200`/`202`
//!
//! [`SignalingClient`] runs both through one [`RetryPolicy`] via
//! [`invoke_with_retry`]: 3 attempts, doubling backoff, bounded per-call
//! timeout by default. Exhausted retries surface as
//! [`SignalError::Exhausted`], which the initiator turns into a rollback.

pub mod client;
pub mod error;
pub mod http;
pub mod media;
pub mod retry;
pub mod routing;

pub use client::SignalingClient;
pub use error::{SignalError, SignalResult};
pub use media::{DrainStartRequest, HttpMediaChannel, MediaChannel};
pub use retry::{RetryPolicy, invoke_with_retry};
pub use routing::{DeregistrationMessage, HttpRoutingChannel, RoutingChannel};
