//! AdmissionController — ordered, fail-safe gate evaluation.

use std::sync::Arc;

use tracing::{debug, warn};

use sipdrain_core::config::AdmissionConfig;
use sipdrain_core::{CapacityPolicy, ControlPlane};
use sipdrain_state::{DrainState, IndexQuery, StateStore};

use crate::gate::{Admission, Denial, Gate, GateError};

/// Trailing window of the hourly cap.
const HOUR_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionLimits {
    pub cooldown_seconds: u64,
    pub max_drains_per_hour: usize,
    pub concurrency_limit: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self::from(&AdmissionConfig::default())
    }
}

impl From<&AdmissionConfig> for AdmissionLimits {
    fn from(cfg: &AdmissionConfig) -> Self {
        Self {
            cooldown_seconds: cfg.cooldown_seconds,
            max_drains_per_hour: cfg.max_drains_per_hour,
            concurrency_limit: cfg.concurrency_limit,
        }
    }
}

/// Consulted before a drain starts and again before capacity shrinks.
#[derive(Clone)]
pub struct AdmissionController {
    store: StateStore,
    control_plane: Arc<dyn ControlPlane>,
    capacity: Arc<dyn CapacityPolicy>,
    limits: AdmissionLimits,
}

impl AdmissionController {
    pub fn new(
        store: StateStore,
        control_plane: Arc<dyn ControlPlane>,
        capacity: Arc<dyn CapacityPolicy>,
        limits: AdmissionLimits,
    ) -> Self {
        Self {
            store,
            control_plane,
            capacity,
            limits,
        }
    }

    /// Run every gate in order for `service_arn` at time `now`.
    pub async fn evaluate(&self, cluster_arn: &str, service_arn: &str, now: u64) -> Admission {
        if let Some(denial) =
            fail_safe(Gate::Cooldown, service_arn, self.cooldown(service_arn, now))
        {
            return Admission::Deny(denial);
        }
        if let Some(denial) =
            fail_safe(Gate::HourlyLimit, service_arn, self.hourly_limit(service_arn, now))
        {
            return Admission::Deny(denial);
        }
        let draining = match self.concurrency(service_arn) {
            Ok(Ok(count)) => count,
            Ok(Err(denial)) => return Admission::Deny(denial),
            Err(e) => return Admission::Deny(gate_failed(Gate::ConcurrencyLimit, service_arn, &e)),
        };
        if let Err(denial) = self.check_min_capacity(cluster_arn, service_arn).await {
            return Admission::Deny(denial);
        }

        debug!(service = %service_arn, draining, "admission granted");
        Admission::Admit { draining }
    }

    /// Capacity-floor gate on its own. Returns the current desired count
    /// when the service is above its minimum.
    pub async fn check_min_capacity(
        &self,
        cluster_arn: &str,
        service_arn: &str,
    ) -> Result<u32, Denial> {
        match self.capacity_figures(cluster_arn, service_arn).await {
            Ok((desired, min)) if desired <= min => {
                debug!(service = %service_arn, desired, min, "denied: at minimum capacity");
                Err(Denial {
                    gate: Gate::AtMinCapacity,
                    desired: Some(desired),
                    min: Some(min),
                })
            }
            Ok((desired, _)) => Ok(desired),
            Err(e) => Err(gate_failed(Gate::AtMinCapacity, service_arn, &e)),
        }
    }

    fn cooldown(&self, service_arn: &str, now: u64) -> Result<Option<Denial>, GateError> {
        let since = now.saturating_sub(self.limits.cooldown_seconds);
        let recent = self
            .store
            .count_service(service_arn, &IndexQuery::started_since(since))?;
        if recent > 0 {
            debug!(service = %service_arn, recent, since, "denied: cooldown");
            return Ok(Some(Denial::by(Gate::Cooldown)));
        }
        Ok(None)
    }

    fn hourly_limit(&self, service_arn: &str, now: u64) -> Result<Option<Denial>, GateError> {
        let since = now.saturating_sub(HOUR_SECS);
        let started = self
            .store
            .count_service(service_arn, &IndexQuery::started_since(since))?;
        if started >= self.limits.max_drains_per_hour {
            debug!(
                service = %service_arn,
                started,
                cap = self.limits.max_drains_per_hour,
                "denied: hourly limit"
            );
            return Ok(Some(Denial::by(Gate::HourlyLimit)));
        }
        Ok(None)
    }

    fn concurrency(&self, service_arn: &str) -> Result<Result<usize, Denial>, GateError> {
        let draining = self
            .store
            .count_service(service_arn, &IndexQuery::in_state(DrainState::Draining))?;
        if draining >= self.limits.concurrency_limit {
            debug!(
                service = %service_arn,
                draining,
                limit = self.limits.concurrency_limit,
                "denied: concurrency limit"
            );
            return Ok(Err(Denial::by(Gate::ConcurrencyLimit)));
        }
        Ok(Ok(draining))
    }

    async fn capacity_figures(
        &self,
        cluster_arn: &str,
        service_arn: &str,
    ) -> Result<(u32, u32), GateError> {
        let service = self
            .control_plane
            .describe_service(cluster_arn, service_arn)
            .await?
            .ok_or_else(|| GateError::ServiceNotFound(service_arn.to_string()))?;
        let min = self.capacity.min_capacity(service_arn).await?;
        Ok((service.desired_count, min))
    }
}

fn fail_safe(
    gate: Gate,
    service_arn: &str,
    result: Result<Option<Denial>, GateError>,
) -> Option<Denial> {
    match result {
        Ok(verdict) => verdict,
        Err(e) => Some(gate_failed(gate, service_arn, &e)),
    }
}

fn gate_failed(gate: Gate, service_arn: &str, error: &GateError) -> Denial {
    warn!(service = %service_arn, %gate, error = %error, "gate evaluation failed; denying");
    Denial::by(gate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipdrain_state::RecordUpdate;
    use sipdrain_test_utils::FakePlatform;

    const CLUSTER: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/voice";
    const SVC: &str = "arn:aws:ecs:us-east-1:123456789012:service/voice/asterisk";
    const NOW: u64 = 1_700_000_000;

    fn controller(
        store: &StateStore,
        platform: FakePlatform,
        limits: AdmissionLimits,
    ) -> AdmissionController {
        let platform = Arc::new(platform);
        AdmissionController::new(store.clone(), platform.clone(), platform, limits)
    }

    fn roomy() -> FakePlatform {
        FakePlatform::new().with_service(SVC, 5, 1)
    }

    fn seed(store: &StateStore, task: &str, state: DrainState, started_at: u64) {
        store
            .update(
                task,
                &RecordUpdate {
                    state: Some(state),
                    service_arn: Some(SVC.to_string()),
                    cluster_arn: Some(CLUSTER.to_string()),
                    started_at: Some(started_at),
                    ..RecordUpdate::default()
                },
            )
            .unwrap();
    }

    fn denied_by(admission: &Admission) -> Option<Gate> {
        match admission {
            Admission::Deny(d) => Some(d.gate),
            Admission::Admit { .. } => None,
        }
    }

    #[tokio::test]
    async fn empty_service_is_admitted() {
        let store = StateStore::open_in_memory().unwrap();
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert_eq!(ctl.evaluate(CLUSTER, SVC, NOW).await, Admission::Admit { draining: 0 });
    }

    #[tokio::test]
    async fn recent_drain_in_any_state_triggers_cooldown() {
        for state in DrainState::ALL {
            let store = StateStore::open_in_memory().unwrap();
            seed(&store, "task-old", state, NOW - 1);
            let ctl = controller(&store, roomy(), AdmissionLimits::default());
            assert_eq!(denied_by(&ctl.evaluate(CLUSTER, SVC, NOW).await), Some(Gate::Cooldown));
        }
    }

    #[tokio::test]
    async fn cooldown_expires() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "task-old", DrainState::ScaledOut, NOW - 901);
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert!(ctl.evaluate(CLUSTER, SVC, NOW).await.is_admitted());
    }

    #[tokio::test]
    async fn other_services_do_not_count() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .update(
                "task-elsewhere",
                &RecordUpdate {
                    state: Some(DrainState::Draining),
                    service_arn: Some("arn:aws:ecs:us-east-1:1:service/voice/kamailio".to_string()),
                    started_at: Some(NOW - 1),
                    ..RecordUpdate::default()
                },
            )
            .unwrap();
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert!(ctl.evaluate(CLUSTER, SVC, NOW).await.is_admitted());
    }

    #[tokio::test]
    async fn third_drain_in_an_hour_hits_hourly_limit() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "task-a", DrainState::ScaledOut, NOW - 3000);
        seed(&store, "task-b", DrainState::ScaledOut, NOW - 1200);
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert_eq!(
            denied_by(&ctl.evaluate(CLUSTER, SVC, NOW).await),
            Some(Gate::HourlyLimit)
        );
    }

    #[tokio::test]
    async fn drains_older_than_an_hour_are_not_counted() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "task-a", DrainState::ScaledOut, NOW - 4000);
        seed(&store, "task-b", DrainState::ScaledOut, NOW - 1200);
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert!(ctl.evaluate(CLUSTER, SVC, NOW).await.is_admitted());
    }

    #[tokio::test]
    async fn in_flight_drain_hits_concurrency_limit() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "task-a", DrainState::Draining, NOW - 2000);
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert_eq!(
            denied_by(&ctl.evaluate(CLUSTER, SVC, NOW).await),
            Some(Gate::ConcurrencyLimit)
        );
    }

    #[tokio::test]
    async fn admit_reports_draining_count() {
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "task-a", DrainState::Draining, NOW - 2000);
        let limits = AdmissionLimits {
            concurrency_limit: 3,
            ..AdmissionLimits::default()
        };
        let ctl = controller(&store, roomy(), limits);
        assert_eq!(ctl.evaluate(CLUSTER, SVC, NOW).await, Admission::Admit { draining: 1 });
    }

    #[tokio::test]
    async fn desired_at_floor_is_denied_with_figures() {
        let store = StateStore::open_in_memory().unwrap();
        let ctl = controller(
            &store,
            FakePlatform::new().with_service(SVC, 2, 2),
            AdmissionLimits::default(),
        );
        assert_eq!(
            ctl.evaluate(CLUSTER, SVC, NOW).await,
            Admission::Deny(Denial {
                gate: Gate::AtMinCapacity,
                desired: Some(2),
                min: Some(2),
            })
        );
        assert!(store.get("anything").unwrap().is_none());
    }

    #[tokio::test]
    async fn first_denial_short_circuits() {
        // Cooldown and concurrency both violated, capacity at floor too.
        let store = StateStore::open_in_memory().unwrap();
        seed(&store, "task-a", DrainState::Draining, NOW - 10);
        let platform = FakePlatform::new().with_service(SVC, 1, 1);
        platform.fail_describe_service(true);
        let ctl = controller(&store, platform, AdmissionLimits::default());
        assert_eq!(denied_by(&ctl.evaluate(CLUSTER, SVC, NOW).await), Some(Gate::Cooldown));
    }

    #[tokio::test]
    async fn control_plane_failure_denies() {
        let store = StateStore::open_in_memory().unwrap();
        let platform = roomy();
        platform.fail_describe_service(true);
        let ctl = controller(&store, platform, AdmissionLimits::default());
        assert_eq!(
            ctl.evaluate(CLUSTER, SVC, NOW).await,
            Admission::Deny(Denial::by(Gate::AtMinCapacity))
        );
    }

    #[tokio::test]
    async fn capacity_policy_failure_denies() {
        let store = StateStore::open_in_memory().unwrap();
        let platform = roomy();
        platform.fail_min_capacity(true);
        let ctl = controller(&store, platform, AdmissionLimits::default());
        assert_eq!(
            denied_by(&ctl.evaluate(CLUSTER, SVC, NOW).await),
            Some(Gate::AtMinCapacity)
        );
    }

    #[tokio::test]
    async fn unknown_service_denies() {
        let store = StateStore::open_in_memory().unwrap();
        let ctl = controller(&store, FakePlatform::new(), AdmissionLimits::default());
        assert_eq!(
            denied_by(&ctl.evaluate(CLUSTER, SVC, NOW).await),
            Some(Gate::AtMinCapacity)
        );
    }

    #[tokio::test]
    async fn check_min_capacity_returns_desired() {
        let store = StateStore::open_in_memory().unwrap();
        let ctl = controller(&store, roomy(), AdmissionLimits::default());
        assert_eq!(ctl.check_min_capacity(CLUSTER, SVC).await, Ok(5));
    }

    #[test]
    fn reasons_are_stable() {
        let reasons: Vec<_> = Gate::ORDER.iter().map(Gate::reason).collect();
        assert_eq!(
            reasons,
            ["cooldown", "hourly_limit", "concurrency_limit", "at_min_capacity"]
        );
    }
}
