//! Metrics sink interface.
//!
//! Emission is fire-and-forget: [`emit`] logs and drops sink failures so
//! a broken metrics backend never changes a handler's outcome.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Accumulates across emissions.
    Counter,
    /// Last emission wins.
    Gauge,
}

/// A single metric data point with ordered dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub value: f64,
    pub kind: MetricKind,
    pub dimensions: Vec<(&'static str, String)>,
}

impl Metric {
    pub fn counter(name: &'static str) -> Self {
        Self {
            name,
            value: 1.0,
            kind: MetricKind::Counter,
            dimensions: Vec::new(),
        }
    }

    pub fn gauge(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value,
            kind: MetricKind::Gauge,
            dimensions: Vec::new(),
        }
    }

    pub fn with(mut self, dimension: &'static str, value: impl Into<String>) -> Self {
        self.dimensions.push((dimension, value.into()));
        self
    }
}

pub trait MetricsSink: Send + Sync {
    fn emit(&self, metric: Metric) -> anyhow::Result<()>;
}

/// Emit a metric, swallowing sink failures.
pub fn emit(sink: &dyn MetricsSink, metric: Metric) {
    let name = metric.name;
    if let Err(e) = sink.emit(metric) {
        warn!(metric = name, error = %e, "failed to emit metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl MetricsSink for BrokenSink {
        fn emit(&self, _metric: Metric) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    #[test]
    fn builder_keeps_dimension_order() {
        let m = Metric::counter("ScaleInSkipped")
            .with("Reason", "cooldown")
            .with("ServiceArn", "svc");
        assert_eq!(m.value, 1.0);
        assert_eq!(m.dimensions[0], ("Reason", "cooldown".to_string()));
        assert_eq!(m.dimensions[1].0, "ServiceArn");
    }

    #[test]
    fn emit_swallows_sink_errors() {
        emit(&BrokenSink, Metric::gauge("DrainingCount", 1.0));
    }
}
