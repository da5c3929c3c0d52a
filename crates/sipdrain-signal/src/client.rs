//! Retry-wrapped signaling operations used by the drain initiator.

use std::sync::Arc;

use tracing::{error, info};

use sipdrain_core::{Metric, MetricsSink, emit};

use crate::error::SignalResult;
use crate::media::{DrainStartRequest, MediaChannel};
use crate::retry::{RetryPolicy, invoke_with_retry};
use crate::routing::{DeregistrationMessage, RoutingChannel};

/// Both outbound channels under one shared retry policy.
#[derive(Clone)]
pub struct SignalingClient {
    routing: Arc<dyn RoutingChannel>,
    media: Arc<dyn MediaChannel>,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl SignalingClient {
    pub fn new(
        routing: Arc<dyn RoutingChannel>,
        media: Arc<dyn MediaChannel>,
        policy: RetryPolicy,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            routing,
            media,
            policy,
            metrics,
        }
    }

    /// Remove `target_ip` from call routing.
    pub async fn deregister(&self, target_ip: &str, drain_id: &str) -> SignalResult<()> {
        let message = DeregistrationMessage::comment_out(target_ip, drain_id);
        let routing = self.routing.clone();
        let result = invoke_with_retry(&self.policy, "routing_deregister", |_| {
            let routing = routing.clone();
            let message = message.clone();
            async move { routing.send(&message).await }
        })
        .await;

        match &result {
            Ok(()) => info!(%target_ip, %drain_id, "routing de-registration accepted"),
            Err(e) => {
                error!(%target_ip, %drain_id, error = %e, "routing de-registration failed");
                emit(
                    self.metrics.as_ref(),
                    Metric::counter("RoutingDeregistrationFailures").with("TargetIP", target_ip),
                );
            }
        }
        result
    }

    /// Ask the media server at `address` to begin draining.
    pub async fn start_drain(
        &self,
        address: &str,
        request: &DrainStartRequest,
    ) -> SignalResult<()> {
        let media = self.media.clone();
        let result = invoke_with_retry(&self.policy, "media_drain_start", |_| {
            let media = media.clone();
            let request = request.clone();
            let address = address.to_string();
            async move { media.start_drain(&address, &request).await }
        })
        .await;

        match &result {
            Ok(()) => info!(%address, drain_id = %request.drain_id, "media drain start accepted"),
            Err(e) => {
                error!(
                    %address,
                    drain_id = %request.drain_id,
                    error = %e,
                    "media drain start failed"
                );
                emit(
                    self.metrics.as_ref(),
                    Metric::counter("DrainStartFailures").with("TargetIP", address),
                );
            }
        }
        result
    }
}
