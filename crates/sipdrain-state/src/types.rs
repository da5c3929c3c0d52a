//! Domain types for the drain-record store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tables::{INDEX_SEPARATOR, INDEX_UPPER_SENTINEL};

/// Lifecycle state of one orchestrated task.
///
/// Transitions are monotone `Running → Draining → ScaledOut`, plus the single
/// `Draining → Running` rollback edge taken when signaling fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrainState {
    #[default]
    Running,
    Draining,
    ScaledOut,
}

impl DrainState {
    pub const ALL: [DrainState; 3] = [
        DrainState::Running,
        DrainState::Draining,
        DrainState::ScaledOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrainState::Running => "RUNNING",
            DrainState::Draining => "DRAINING",
            DrainState::ScaledOut => "SCALED_OUT",
        }
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, next: DrainState) -> bool {
        matches!(
            (self, next),
            (DrainState::Running, DrainState::Draining)
                | (DrainState::Draining, DrainState::ScaledOut)
                | (DrainState::Draining, DrainState::Running)
        )
    }
}

impl fmt::Display for DrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per orchestrated task, keyed by task ARN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDrainRecord {
    pub task_arn: String,
    /// Absent in storage means `Running`.
    #[serde(default)]
    pub state: DrainState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drain_id: Option<String>,
    /// Unix timestamp (seconds) of the drain start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    /// Unix timestamp (seconds) of the capacity decrement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    /// Address used for signaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ip: Option<String>,
}

impl TaskDrainRecord {
    pub fn new(task_arn: &str) -> Self {
        Self {
            task_arn: task_arn.to_string(),
            ..Self::default()
        }
    }

    /// Secondary-index key, or `None` for records not yet tied to a service.
    pub fn index_key(&self) -> Option<String> {
        let service = self.service_arn.as_deref()?;
        Some(format!(
            "{}{INDEX_SEPARATOR}{:020}{INDEX_SEPARATOR}{}",
            index_prefix(service, self.state),
            self.started_at.unwrap_or(0),
            self.task_arn
        ))
    }
}

/// `{service_arn}|{STATE}`
pub(crate) fn index_prefix(service_arn: &str, state: DrainState) -> String {
    format!("{service_arn}{INDEX_SEPARATOR}{}", state.as_str())
}

/// Lower and upper bounds of an index range scan for one service/state
/// partition restricted to `started_at >= since`.
pub(crate) fn index_bounds(service_arn: &str, state: DrainState, since: u64) -> (String, String) {
    let prefix = index_prefix(service_arn, state);
    (
        format!("{prefix}{INDEX_SEPARATOR}{since:020}"),
        format!("{prefix}{INDEX_SEPARATOR}{INDEX_UPPER_SENTINEL}"),
    )
}

/// Field assignments applied by a store write. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub state: Option<DrainState>,
    pub service_arn: Option<String>,
    pub cluster_arn: Option<String>,
    pub drain_id: Option<String>,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub last_ip: Option<String>,
}

impl RecordUpdate {
    pub fn state(state: DrainState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to(&self, record: &mut TaskDrainRecord) {
        if let Some(state) = self.state {
            record.state = state;
        }
        if let Some(v) = &self.service_arn {
            record.service_arn = Some(v.clone());
        }
        if let Some(v) = &self.cluster_arn {
            record.cluster_arn = Some(v.clone());
        }
        if let Some(v) = &self.drain_id {
            record.drain_id = Some(v.clone());
        }
        if let Some(v) = self.started_at {
            record.started_at = Some(v);
        }
        if let Some(v) = self.completed_at {
            record.completed_at = Some(v);
        }
        if let Some(v) = &self.last_ip {
            record.last_ip = Some(v.clone());
        }
    }
}

/// Expectation checked atomically by [`crate::StateStore::conditional_put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// No record may exist.
    Absent,
    /// A record must exist in exactly this state.
    State(DrainState),
    /// Either no record exists or it is in this state.
    AbsentOrState(DrainState),
}

impl Expect {
    pub fn admits(&self, current: Option<&TaskDrainRecord>) -> bool {
        match (self, current) {
            (Expect::Absent, None) => true,
            (Expect::Absent, Some(_)) => false,
            (Expect::State(_), None) => false,
            (Expect::State(s), Some(r)) => r.state == *s,
            (Expect::AbsentOrState(_), None) => true,
            (Expect::AbsentOrState(s), Some(r)) => r.state == *s,
        }
    }
}

/// Range query against the `(serviceArn, state, startedAt)` index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexQuery {
    /// Restrict to one state; `None` scans every state partition.
    pub state: Option<DrainState>,
    /// Restrict to records with `started_at >= since`.
    pub started_since: Option<u64>,
}

impl IndexQuery {
    pub fn in_state(state: DrainState) -> Self {
        Self {
            state: Some(state),
            started_since: None,
        }
    }

    pub fn started_since(since: u64) -> Self {
        Self {
            state: None,
            started_since: Some(since),
        }
    }
}
