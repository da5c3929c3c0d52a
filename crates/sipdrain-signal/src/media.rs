//! Media-server drain-start channel.
//!
//! Asks the media server on a task to stop taking new sessions, migrate or
//! finish the active ones, and call back when it is empty.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SignalError, SignalResult};
use crate::http::post_json;

/// Body of `POST {address}/drain/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainStartRequest {
    pub task_arn: String,
    /// Correlation token echoed back in the completion callback.
    pub drain_id: String,
    pub max_drain_seconds: u64,
    pub callback_url: String,
    /// Bearer credential the media server presents on callback.
    pub token: String,
}

/// One delivery attempt of a drain-start request.
#[async_trait]
pub trait MediaChannel: Send + Sync {
    async fn start_drain(&self, address: &str, request: &DrainStartRequest) -> SignalResult<()>;
}

/// Talks to the media server's HTTP control port.
#[derive(Debug, Clone)]
pub struct HttpMediaChannel {
    scheme: String,
    port: u16,
}

impl HttpMediaChannel {
    pub fn new(scheme: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            port,
        }
    }

    pub fn drain_url(&self, address: &str) -> String {
        format!("{}://{}:{}/drain/start", self.scheme, address, self.port)
    }
}

#[async_trait]
impl MediaChannel for HttpMediaChannel {
    async fn start_drain(&self, address: &str, request: &DrainStartRequest) -> SignalResult<()> {
        let resp = post_json(&self.drain_url(address), request).await?;
        match resp.status {
            200 | 202 => Ok(()),
            other => Err(SignalError::Status(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::http::StatusCode;

    fn request() -> DrainStartRequest {
        DrainStartRequest {
            task_arn: "arn:aws:ecs:us-east-1:1:task/voice/abc".to_string(),
            drain_id: "0011223344556677".to_string(),
            max_drain_seconds: 14_400,
            callback_url: "http://sipdrain.internal/api/v1/drain/complete".to_string(),
            token: "s3cret".to_string(),
        }
    }

    #[test]
    fn drain_url_format() {
        let channel = HttpMediaChannel::new("http", 8088);
        assert_eq!(channel.drain_url("10.0.0.9"), "http://10.0.0.9:8088/drain/start");
    }

    #[test]
    fn request_wire_format() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["taskArn"], "arn:aws:ecs:us-east-1:1:task/voice/abc");
        assert_eq!(json["drainId"], "0011223344556677");
        assert_eq!(json["maxDrainSeconds"], 14_400);
        assert_eq!(json["callbackUrl"], "http://sipdrain.internal/api/v1/drain/complete");
        assert_eq!(json["token"], "s3cret");
    }

    async fn serve(status: StatusCode) -> (u16, Arc<Mutex<Vec<serde_json::Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = axum::Router::new().route(
            "/drain/start",
            axum::routing::post(move |Json(body): Json<serde_json::Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (port, seen)
    }

    #[tokio::test]
    async fn accepted_and_ok_are_success() {
        for status in [StatusCode::OK, StatusCode::ACCEPTED] {
            let (port, seen) = serve(status).await;
            let channel = HttpMediaChannel::new("http", port);
            channel.start_drain("127.0.0.1", &request()).await.unwrap();
            assert_eq!(seen.lock().unwrap()[0]["drainId"], "0011223344556677");
        }
    }

    #[tokio::test]
    async fn server_error_is_failure() {
        let (port, _) = serve(StatusCode::SERVICE_UNAVAILABLE).await;
        let channel = HttpMediaChannel::new("http", port);
        let err = channel.start_drain("127.0.0.1", &request()).await.unwrap_err();
        assert!(matches!(err, SignalError::Status(503)));
    }
}
