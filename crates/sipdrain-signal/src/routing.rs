//! Call-routing de-registration channel.
//!
//! Removes a media server's address from the SIP routing layer so no new
//! sessions land on it. The routing control endpoint accepts the message
//! asynchronously; `202 Accepted` is the only success status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::http::post_json;

pub const DEREGISTER_ACTION: &str = "comment_out_ip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeregistrationMessage {
    pub action: String,
    pub target_ip: String,
    #[serde(rename = "drainId")]
    pub drain_id: String,
}

impl DeregistrationMessage {
    pub fn comment_out(target_ip: &str, drain_id: &str) -> Self {
        Self {
            action: DEREGISTER_ACTION.to_string(),
            target_ip: target_ip.to_string(),
            drain_id: drain_id.to_string(),
        }
    }
}

/// One delivery attempt of a de-registration message.
#[async_trait]
pub trait RoutingChannel: Send + Sync {
    async fn send(&self, message: &DeregistrationMessage) -> SignalResult<()>;
}

/// Delivers de-registration messages to an HTTP routing-control endpoint.
#[derive(Debug, Clone)]
pub struct HttpRoutingChannel {
    endpoint: String,
}

impl HttpRoutingChannel {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RoutingChannel for HttpRoutingChannel {
    async fn send(&self, message: &DeregistrationMessage) -> SignalResult<()> {
        let resp = post_json(&self.endpoint, message).await?;
        if resp.status == 202 {
            Ok(())
        } else {
            Err(SignalError::Status(resp.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_format() {
        let msg = DeregistrationMessage::comment_out("10.0.3.17", "1f2e3d4c5b6a7980");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "comment_out_ip",
                "target_ip": "10.0.3.17",
                "drainId": "1f2e3d4c5b6a7980"
            })
        );
    }

    async fn serve(status: axum::http::StatusCode) -> String {
        let app = axum::Router::new().route(
            "/dispatch",
            axum::routing::post(move || async move { status }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/dispatch")
    }

    #[tokio::test]
    async fn accepted_is_success() {
        let url = serve(axum::http::StatusCode::ACCEPTED).await;
        let channel = HttpRoutingChannel::new(url);
        channel
            .send(&DeregistrationMessage::comment_out("10.0.0.1", "d1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn synchronous_ok_is_not_accepted() {
        let url = serve(axum::http::StatusCode::OK).await;
        let channel = HttpRoutingChannel::new(url);
        let err = channel
            .send(&DeregistrationMessage::comment_out("10.0.0.1", "d1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::Status(200)));
    }
}
