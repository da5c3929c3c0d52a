//! sipdrain-api — HTTP surface of the scale-in coordinator.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/scale-in` | Scale-in attempt for one task |
//! | POST | `/api/v1/drain/complete` | Media-server completion callback |
//! | GET | `/api/v1/tasks/{taskArn}` | Read one drain record |
//! | POST | `/api/v1/candidates` | Pick the next task to scale in |
//! | GET | `/metrics` | Prometheus exposition |
//!
//! Task ARNs contain `/`, so the record route takes the rest of the path.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use sipdrain_coordinator::{CompletionHandler, DrainInitiator};
use sipdrain_core::ControlPlane;
use sipdrain_metrics::MetricsRegistry;
use sipdrain_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub initiator: Arc<DrainInitiator>,
    pub completion: Arc<CompletionHandler>,
    pub control_plane: Arc<dyn ControlPlane>,
    pub metrics: MetricsRegistry,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/scale-in", post(handlers::scale_in))
        .route("/drain/complete", post(handlers::drain_complete))
        .route("/tasks/{*task_arn}", get(handlers::get_task))
        .route("/candidates", post(handlers::select_candidate))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
