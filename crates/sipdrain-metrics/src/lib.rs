//! sipdrain-metrics — observability for drain coordination.
//!
//! # Architecture
//!
//! ```text
//! MetricsRegistry (implements MetricsSink)
//!   ├── emit() ← called by the handlers, never fails the caller
//!   └── series() → point-in-time copy of every series
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod prometheus;
pub mod registry;

pub use prometheus::render_prometheus;
pub use registry::{MetricsRegistry, Series};
