//! Collaborator construction: every client handle is built once here and
//! injected into the handlers.

use std::sync::Arc;

use sipdrain_admission::{AdmissionController, AdmissionLimits};
use sipdrain_api::ApiState;
use sipdrain_coordinator::{
    CompletionHandler, DrainInitiator, DrainSettings, HttpCapacityPolicy, HttpControlPlane,
};
use sipdrain_core::{CapacityPolicy, Clock, ControlPlane, DaemonConfig, MetricsSink, SystemClock};
use sipdrain_metrics::MetricsRegistry;
use sipdrain_signal::{HttpMediaChannel, HttpRoutingChannel, RetryPolicy, SignalingClient};
use sipdrain_state::StateStore;

pub fn api_state(config: &DaemonConfig, store: StateStore) -> ApiState {
    let registry = MetricsRegistry::new();
    let metrics: Arc<dyn MetricsSink> = Arc::new(registry.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let control_plane: Arc<dyn ControlPlane> =
        Arc::new(HttpControlPlane::new(&config.platform.endpoint));
    let capacity: Arc<dyn CapacityPolicy> =
        Arc::new(HttpCapacityPolicy::new(&config.platform.endpoint));

    let admission = AdmissionController::new(
        store.clone(),
        control_plane.clone(),
        capacity,
        AdmissionLimits::from(&config.admission),
    );
    let signaling = SignalingClient::new(
        Arc::new(HttpRoutingChannel::new(&config.routing.endpoint)),
        Arc::new(HttpMediaChannel::new(&config.media.scheme, config.media.port)),
        RetryPolicy::from(&config.retry),
        metrics.clone(),
    );

    let initiator = DrainInitiator::new(
        store.clone(),
        control_plane.clone(),
        admission.clone(),
        signaling,
        metrics.clone(),
        clock.clone(),
        DrainSettings::from(&config.drain),
    );
    let completion = CompletionHandler::new(
        store.clone(),
        control_plane.clone(),
        admission,
        metrics,
        clock,
        &config.drain.shared_token,
    );

    ApiState {
        store,
        initiator: Arc::new(initiator),
        completion: Arc::new(completion),
        control_plane,
        metrics: registry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wires_from_minimal_config() {
        let config: DaemonConfig = toml::from_str(
            r#"
[drain]
callback_url = "http://sipdrain.internal/api/v1/drain/complete"
shared_token = "s3cret"

[routing]
endpoint = "http://routing.internal/dispatch"

[platform]
endpoint = "http://orchestrator.internal/api/v1"
"#,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("drains.redb")).unwrap();
        let state = api_state(&config, store);
        assert!(state.metrics.series().is_empty());
        let _router = sipdrain_api::build_router(state);
    }
}
