//! Stuck-drain scan.
//!
//! A task whose media server never calls back, or whose rollback write
//! failed, stays DRAINING indefinitely. This scan only reports such
//! records; remediation is an operator decision.

use serde::Serialize;

use sipdrain_core::{Metric, MetricsSink, emit};
use sipdrain_state::{DrainState, StateResult, StateStore, TaskDrainRecord};

/// A DRAINING record past its drain ceiling plus grace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuckDrain {
    #[serde(flatten)]
    pub record: TaskDrainRecord,
    /// Seconds past `startedAt + maxDrainSeconds + grace`.
    pub overdue_seconds: u64,
}

/// Records in DRAINING with `startedAt + max_drain_seconds + grace < now`,
/// most overdue first. A record without a start time counts as started at 0.
pub fn find_stuck_drains(
    store: &StateStore,
    now: u64,
    max_drain_seconds: u64,
    grace_seconds: u64,
) -> StateResult<Vec<StuckDrain>> {
    let mut stuck: Vec<StuckDrain> = store
        .list_in_state(DrainState::Draining)?
        .into_iter()
        .filter_map(|record| {
            let deadline = record
                .started_at
                .unwrap_or(0)
                .saturating_add(max_drain_seconds)
                .saturating_add(grace_seconds);
            (deadline < now).then(|| StuckDrain {
                overdue_seconds: now - deadline,
                record,
            })
        })
        .collect();
    stuck.sort_by(|a, b| b.overdue_seconds.cmp(&a.overdue_seconds));
    Ok(stuck)
}

pub fn report_stuck_drains(metrics: &dyn MetricsSink, stuck: &[StuckDrain]) {
    emit(metrics, Metric::gauge("StuckDrains", stuck.len() as f64));
}
