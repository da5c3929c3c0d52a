pub mod clock;
pub mod config;
pub mod drain_id;
pub mod fleet;
pub mod metrics;
pub mod platform;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, DaemonConfig};
pub use drain_id::{DRAIN_BUCKET_SECS, drain_id};
pub use metrics::{Metric, MetricKind, MetricsSink, emit};
pub use platform::*;
