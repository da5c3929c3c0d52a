//! In-process metric registry.
//!
//! Counters accumulate and gauges keep their last value, keyed by metric
//! name plus ordered dimensions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use sipdrain_core::{Metric, MetricKind, MetricsSink};

type SeriesKey = (&'static str, Vec<(&'static str, String)>);

/// One time series at the moment of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: &'static str,
    pub kind: MetricKind,
    pub dimensions: Vec<(&'static str, String)>,
    pub value: f64,
}

#[derive(Clone, Default)]
pub struct MetricsRegistry {
    series: Arc<Mutex<BTreeMap<SeriesKey, (MetricKind, f64)>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every series, ordered by name then dimensions.
    pub fn series(&self) -> Vec<Series> {
        let guard = match self.series.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .iter()
            .map(|((name, dims), (kind, value))| Series {
                name: *name,
                kind: *kind,
                dimensions: dims.clone(),
                value: *value,
            })
            .collect()
    }

    /// Current value of one series, if it has been emitted.
    pub fn value(&self, name: &str, dimensions: &[(&str, &str)]) -> Option<f64> {
        self.series()
            .into_iter()
            .find(|s| {
                s.name == name
                    && s.dimensions.len() == dimensions.len()
                    && s.dimensions
                        .iter()
                        .zip(dimensions)
                        .all(|((k, v), (ek, ev))| k == ek && v == ev)
            })
            .map(|s| s.value)
    }
}

impl MetricsSink for MetricsRegistry {
    fn emit(&self, metric: Metric) -> anyhow::Result<()> {
        let mut guard = self
            .series
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics registry lock poisoned"))?;
        let entry = guard
            .entry((metric.name, metric.dimensions))
            .or_insert((metric.kind, 0.0));
        match metric.kind {
            MetricKind::Counter => entry.1 += metric.value,
            MetricKind::Gauge => entry.1 = metric.value,
        }
        entry.0 = metric.kind;
        trace!(metric = metric.name, value = entry.1, "metric recorded");
        Ok(())
    }
}
