use std::sync::{Arc, Mutex};

use sipdrain_core::{Metric, MetricsSink};

/// Keeps every emitted metric in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    emitted: Arc<Mutex<Vec<Metric>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Metric> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn named(&self, name: &str) -> Vec<Metric> {
        self.all().into_iter().filter(|m| m.name == name).collect()
    }

    /// Number of emissions of `name` carrying `dimension=value`.
    pub fn count_with(&self, name: &str, dimension: &str, value: &str) -> usize {
        self.named(name)
            .iter()
            .filter(|m| m.dimensions.iter().any(|(k, v)| *k == dimension && v == value))
            .count()
    }
}

impl MetricsSink for RecordingSink {
    fn emit(&self, metric: Metric) -> anyhow::Result<()> {
        self.emitted.lock().unwrap().push(metric);
        Ok(())
    }
}
