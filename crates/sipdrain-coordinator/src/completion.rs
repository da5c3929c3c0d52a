//! CompletionHandler — authenticated callback from a media server whose
//! sessions have drained.
//!
//! Validates the drain it refers to, re-checks the capacity floor, clears
//! scale-in protection, shrinks the service by one and marks the task
//! SCALED_OUT. Every path ends in a [`CompletionOutcome`]; nothing here
//! returns an error to the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use sipdrain_admission::AdmissionController;
use sipdrain_core::{Clock, ControlPlane, Metric, MetricsSink, emit};
use sipdrain_state::{DrainState, Expect, RecordUpdate, StateError, StateStore};

use crate::error::CoordinatorResult;
use crate::initiator::report_draining_count;
use crate::outcome::{CompletionOutcome, ConflictReason, FailureReason, SkipReason};

/// Callback body. Both fields are required; they are optional here so a
/// missing one is a `BadRequest` outcome rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[serde(default)]
    pub task_arn: Option<String>,
    #[serde(default)]
    pub drain_id: Option<String>,
}

pub struct CompletionHandler {
    store: StateStore,
    control_plane: Arc<dyn ControlPlane>,
    admission: AdmissionController,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    shared_token: String,
}

impl CompletionHandler {
    pub fn new(
        store: StateStore,
        control_plane: Arc<dyn ControlPlane>,
        admission: AdmissionController,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
        shared_token: impl Into<String>,
    ) -> Self {
        Self {
            store,
            control_plane,
            admission,
            metrics,
            clock,
            shared_token: shared_token.into(),
        }
    }

    /// `authorization` is the raw `Authorization` header value, if any.
    pub async fn handle(
        &self,
        authorization: Option<&str>,
        request: &CompletionRequest,
    ) -> CompletionOutcome {
        if !self.authorized(authorization) {
            warn!("completion callback rejected: bad credentials");
            emit(self.metrics.as_ref(), Metric::counter("ScalerAuthFailures"));
            return CompletionOutcome::Unauthorized;
        }

        let (Some(task_arn), Some(drain_id)) = (
            non_empty(request.task_arn.as_deref()),
            non_empty(request.drain_id.as_deref()),
        ) else {
            warn!(?request, "completion callback missing taskArn or drainId");
            return CompletionOutcome::BadRequest;
        };

        match self.run(task_arn, drain_id).await {
            Ok(outcome) => {
                self.record(task_arn, &outcome);
                outcome
            }
            Err(e) => {
                error!(task = %task_arn, error = %e, "completion failed unexpectedly");
                self.count_error(FailureReason::UnexpectedError);
                CompletionOutcome::Failed {
                    reason: FailureReason::UnexpectedError,
                }
            }
        }
    }

    fn authorized(&self, authorization: Option<&str>) -> bool {
        let expected = format!("Bearer {}", self.shared_token);
        authorization == Some(expected.as_str())
    }

    async fn run(&self, task_arn: &str, drain_id: &str) -> CoordinatorResult<CompletionOutcome> {
        let record = match self.store.get(task_arn)? {
            Some(r) if r.state == DrainState::Draining => r,
            found => {
                warn!(
                    task = %task_arn,
                    state = ?found.map(|r| r.state),
                    "completion for a task that is not draining"
                );
                return Ok(self.conflict(task_arn, ConflictReason::NotDraining));
            }
        };
        if record.drain_id.as_deref() != Some(drain_id) {
            warn!(
                task = %task_arn,
                expected = ?record.drain_id,
                received = %drain_id,
                "completion drain id mismatch"
            );
            return Ok(self.conflict(task_arn, ConflictReason::DrainIdMismatch));
        }

        let (Some(cluster_arn), Some(service_arn)) =
            (record.cluster_arn.as_deref(), record.service_arn.as_deref())
        else {
            return Ok(CompletionOutcome::Failed {
                reason: FailureReason::MissingFleet,
            });
        };

        let desired = match self
            .admission
            .check_min_capacity(cluster_arn, service_arn)
            .await
        {
            Ok(desired) => desired,
            Err(denial) => {
                return Ok(CompletionOutcome::Skipped {
                    reason: SkipReason::AtMinCapacity,
                    desired: denial.desired,
                    min: denial.min,
                });
            }
        };

        if let Err(e) = self
            .control_plane
            .clear_scale_in_protection(cluster_arn, task_arn)
            .await
        {
            warn!(task = %task_arn, error = %e, "failed to clear scale-in protection; continuing");
        }

        if desired > 0
            && let Err(e) = self
                .control_plane
                .update_desired_count(cluster_arn, service_arn, desired - 1)
                .await
        {
            error!(service = %service_arn, desired, error = %e, "desired count update failed");
            return Ok(CompletionOutcome::Failed {
                reason: FailureReason::UpdateFailed,
            });
        }
        let desired_after = desired.saturating_sub(1);

        let finish = RecordUpdate {
            state: Some(DrainState::ScaledOut),
            completed_at: Some(self.clock.now()),
            ..RecordUpdate::default()
        };
        match self
            .store
            .conditional_put(task_arn, Expect::State(DrainState::Draining), &finish)
        {
            Ok(_) => {}
            Err(StateError::ConditionFailed { found, .. }) => {
                warn!(
                    task = %task_arn,
                    ?found,
                    desired = desired_after,
                    "drain left DRAINING while completing; desired count already lowered"
                );
                return Ok(self.conflict(task_arn, ConflictReason::NotDraining));
            }
            Err(e) => return Err(e.into()),
        }

        emit(
            self.metrics.as_ref(),
            Metric::counter("ScaleOutCompleted")
                .with("ServiceArn", service_arn)
                .with("TaskArn", task_arn),
        );
        report_draining_count(&self.store, self.metrics.as_ref(), service_arn);
        Ok(CompletionOutcome::Scaled {
            desired: desired_after,
        })
    }

    fn conflict(&self, task_arn: &str, reason: ConflictReason) -> CompletionOutcome {
        emit(
            self.metrics.as_ref(),
            Metric::counter("ScalerInvalidState").with("TaskArn", task_arn),
        );
        CompletionOutcome::Conflict { reason }
    }

    fn record(&self, task_arn: &str, outcome: &CompletionOutcome) {
        match outcome {
            CompletionOutcome::Scaled { desired } => {
                info!(task = %task_arn, desired, "task scaled out");
            }
            CompletionOutcome::Skipped { reason, desired, min } => {
                info!(
                    task = %task_arn,
                    reason = reason.as_str(),
                    ?desired,
                    ?min,
                    "scale-out skipped; task stays DRAINING"
                );
                emit(
                    self.metrics.as_ref(),
                    Metric::counter("ScalerSkipped").with("Reason", reason.as_str()),
                );
            }
            CompletionOutcome::Failed { reason } => {
                warn!(task = %task_arn, reason = reason.as_str(), "scale-out failed");
                self.count_error(*reason);
            }
            CompletionOutcome::Conflict { .. }
            | CompletionOutcome::Unauthorized
            | CompletionOutcome::BadRequest => {}
        }
    }

    fn count_error(&self, reason: FailureReason) {
        emit(
            self.metrics.as_ref(),
            Metric::counter("ScalerErrors").with("Reason", reason.as_str()),
        );
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
