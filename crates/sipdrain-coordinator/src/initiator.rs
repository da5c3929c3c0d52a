//! DrainInitiator — reacts to a scale-in attempt for one task.
//!
//! ```text
//! describe task ─► already DRAINING? ─► admission gates ─► resolve address
//!      │                  │                    │                 │
//!  task_not_found   already_draining      skipped(gate)      no_address
//!
//! drain id ─► CAS absent|RUNNING → DRAINING ─► de-register ─► drain start ─► finalize
//!                        │                         │              │
//!                 already_draining          rollback +      rollback +
//!                                           dereg_failed    drain_start_failed
//! ```
//!
//! The conditional put is the only mutual exclusion: of two concurrent
//! attempts for one task exactly one wins it, the other is skipped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use sipdrain_admission::{Admission, AdmissionController};
use sipdrain_core::config::DrainConfig;
use sipdrain_core::{Clock, ControlPlane, Metric, MetricsSink, drain_id, emit};
use sipdrain_signal::{DrainStartRequest, SignalingClient};
use sipdrain_state::{DrainState, Expect, IndexQuery, RecordUpdate, StateError, StateStore};

use crate::error::CoordinatorResult;
use crate::outcome::{DrainOutcome, FailureReason, SkipReason};

/// A scale-in attempt for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleInRequest {
    pub cluster_arn: String,
    pub task_arn: String,
}

/// Parameters handed to media servers when a drain starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainSettings {
    pub max_drain_seconds: u64,
    pub callback_url: String,
    pub shared_token: String,
}

impl From<&DrainConfig> for DrainSettings {
    fn from(cfg: &DrainConfig) -> Self {
        Self {
            max_drain_seconds: cfg.max_drain_seconds,
            callback_url: cfg.callback_url.clone(),
            shared_token: cfg.shared_token.clone(),
        }
    }
}

pub struct DrainInitiator {
    store: StateStore,
    control_plane: Arc<dyn ControlPlane>,
    admission: AdmissionController,
    signaling: SignalingClient,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    settings: DrainSettings,
}

impl DrainInitiator {
    pub fn new(
        store: StateStore,
        control_plane: Arc<dyn ControlPlane>,
        admission: AdmissionController,
        signaling: SignalingClient,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
        settings: DrainSettings,
    ) -> Self {
        Self {
            store,
            control_plane,
            admission,
            signaling,
            metrics,
            clock,
            settings,
        }
    }

    /// Handle one scale-in attempt.
    ///
    /// Unexpected failures are logged, counted as
    /// `ScaleInErrors{Reason=unexpected_error}` and returned so the caller's
    /// redelivery policy decides what happens next.
    pub async fn handle(&self, request: &ScaleInRequest) -> CoordinatorResult<DrainOutcome> {
        match self.run(request).await {
            Ok(outcome) => {
                self.record(request, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    task = %request.task_arn,
                    error = %e,
                    "scale-in attempt failed unexpectedly"
                );
                self.count_error(FailureReason::UnexpectedError);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &ScaleInRequest) -> CoordinatorResult<DrainOutcome> {
        let task_arn = request.task_arn.as_str();
        let cluster_arn = request.cluster_arn.as_str();

        let Some(task) = self.control_plane.describe_task(cluster_arn, task_arn).await? else {
            return Ok(DrainOutcome::failed(FailureReason::TaskNotFound));
        };
        let Some(service_arn) = task.service_arn.clone() else {
            return Ok(DrainOutcome::failed(FailureReason::TaskNotFound));
        };

        if let Some(existing) = self.store.get(task_arn)?
            && existing.state == DrainState::Draining
        {
            return Ok(DrainOutcome::skipped(SkipReason::AlreadyDraining));
        }

        let now = self.clock.now();
        let draining = match self.admission.evaluate(cluster_arn, &service_arn, now).await {
            Admission::Admit { draining } => draining,
            Admission::Deny(denial) => return Ok(denial.into()),
        };

        let Some(ip) = task.private_address().map(str::to_string) else {
            return Ok(DrainOutcome::failed(FailureReason::NoAddress));
        };
        let drain_id = drain_id(task_arn, now);

        let begin = RecordUpdate {
            state: Some(DrainState::Draining),
            service_arn: Some(service_arn.clone()),
            cluster_arn: Some(cluster_arn.to_string()),
            drain_id: Some(drain_id.clone()),
            started_at: Some(now),
            ..RecordUpdate::default()
        };
        match self
            .store
            .conditional_put(task_arn, Expect::AbsentOrState(DrainState::Running), &begin)
        {
            Ok(_) => debug!(task = %task_arn, %drain_id, "claimed task for draining"),
            Err(StateError::ConditionFailed { found, .. }) => {
                debug!(task = %task_arn, ?found, "lost drain claim to another attempt");
                return Ok(DrainOutcome::skipped(SkipReason::AlreadyDraining));
            }
            Err(e) => return Err(e.into()),
        }

        if self.signaling.deregister(&ip, &drain_id).await.is_err() {
            self.roll_back(task_arn, &service_arn);
            return Ok(DrainOutcome::failed(FailureReason::DeregFailed));
        }

        let start = DrainStartRequest {
            task_arn: task_arn.to_string(),
            drain_id: drain_id.clone(),
            max_drain_seconds: self.settings.max_drain_seconds,
            callback_url: self.settings.callback_url.clone(),
            token: self.settings.shared_token.clone(),
        };
        if self.signaling.start_drain(&ip, &start).await.is_err() {
            self.roll_back(task_arn, &service_arn);
            return Ok(DrainOutcome::failed(FailureReason::DrainStartFailed));
        }

        self.store.update(
            task_arn,
            &RecordUpdate {
                state: Some(DrainState::Draining),
                last_ip: Some(ip.clone()),
                ..RecordUpdate::default()
            },
        )?;

        emit(
            self.metrics.as_ref(),
            Metric::counter("DrainStarted")
                .with("ServiceArn", service_arn.as_str())
                .with("TaskArn", task_arn),
        );
        emit(
            self.metrics.as_ref(),
            Metric::gauge("DrainingCount", (draining + 1) as f64).with("ServiceArn", service_arn),
        );

        Ok(DrainOutcome::Started {
            task_arn: task_arn.to_string(),
            ip,
            drain_id,
        })
    }

    /// Best effort. A failed rollback leaves the task DRAINING with no
    /// drain in progress; the reconcile scan reports it once overdue.
    fn roll_back(&self, task_arn: &str, service_arn: &str) {
        match self.store.conditional_put(
            task_arn,
            Expect::State(DrainState::Draining),
            &RecordUpdate::state(DrainState::Running),
        ) {
            Ok(_) => {
                info!(task = %task_arn, "rolled drain record back to RUNNING");
                report_draining_count(&self.store, self.metrics.as_ref(), service_arn);
            }
            Err(e) => error!(
                task = %task_arn,
                error = %e,
                "rollback failed; task left DRAINING with no drain in progress"
            ),
        }
    }

    fn record(&self, request: &ScaleInRequest, outcome: &DrainOutcome) {
        match outcome {
            DrainOutcome::Started { ip, drain_id, .. } => {
                info!(task = %request.task_arn, %ip, %drain_id, "drain started");
            }
            DrainOutcome::Skipped { reason, desired, min } => {
                info!(
                    task = %request.task_arn,
                    reason = reason.as_str(),
                    ?desired,
                    ?min,
                    "scale-in skipped"
                );
                emit(
                    self.metrics.as_ref(),
                    Metric::counter("ScaleInSkipped").with("Reason", reason.as_str()),
                );
            }
            DrainOutcome::Failed { reason } => {
                warn!(task = %request.task_arn, reason = reason.as_str(), "scale-in failed");
                self.count_error(*reason);
            }
        }
    }

    fn count_error(&self, reason: FailureReason) {
        emit(
            self.metrics.as_ref(),
            Metric::counter("ScaleInErrors").with("Reason", reason.as_str()),
        );
    }
}

/// Re-publish `DrainingCount` for a service from the store once a drain
/// has left DRAINING. A failed count skips the emission.
pub(crate) fn report_draining_count(
    store: &StateStore,
    metrics: &dyn MetricsSink,
    service_arn: &str,
) {
    match store.count_service(service_arn, &IndexQuery::in_state(DrainState::Draining)) {
        Ok(count) => emit(
            metrics,
            Metric::gauge("DrainingCount", count as f64).with("ServiceArn", service_arn),
        ),
        Err(e) => warn!(service = %service_arn, error = %e, "could not count draining tasks"),
    }
}
