//! Shared test utilities for sipdrain.
//!
//! - [`FixedClock`]: settable clock
//! - [`FakePlatform`]: in-memory control plane and capacity policy with
//!   injectable failures
//! - [`ScriptedRouting`] / [`ScriptedMedia`]: signaling channels that fail
//!   on demand and record every attempt
//! - [`RecordingSink`]: metrics sink that keeps every emission

#![allow(clippy::unwrap_used)]

pub mod clock;
pub mod metrics;
pub mod platform;
pub mod signal;

pub use clock::FixedClock;
pub use metrics::RecordingSink;
pub use platform::{FakePlatform, running_task};
pub use signal::{ScriptedMedia, ScriptedRouting};

/// Initialize test logging (safe to call from every test).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sipdrain=debug")),
        )
        .with_test_writer()
        .try_init();
}
