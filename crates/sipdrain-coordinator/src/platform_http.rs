//! HTTP/JSON clients for the orchestration control plane and the
//! capacity policy.
//!
//! Every operation is `POST {endpoint}/{operation}` with identifiers in the
//! JSON body. These calls are not retried here; a failure surfaces to the
//! handler, which treats it as unexpected (initiator) or fail-safe
//! (admission gates).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use sipdrain_core::fleet::scalable_resource_id;
use sipdrain_core::{
    CapacityPolicy, ControlPlane, PlatformError, PlatformResult, ServiceDescription,
    TaskDescription,
};
use sipdrain_signal::http::post_json;

async fn call<B, R>(endpoint: &str, operation: &str, body: &B) -> PlatformResult<R>
where
    B: Serialize + ?Sized + Sync,
    R: DeserializeOwned,
{
    let url = format!("{}/{operation}", endpoint.trim_end_matches('/'));
    let resp = post_json(&url, body)
        .await
        .map_err(|e| PlatformError::Transport {
            operation: operation.to_string(),
            message: e.to_string(),
        })?;
    if !resp.is_success() {
        return Err(PlatformError::Status {
            operation: operation.to_string(),
            status: resp.status,
        });
    }
    debug!(operation, status = resp.status, "control plane call complete");
    serde_json::from_slice(&resp.body).map_err(|e| PlatformError::Decode {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

#[derive(Deserialize)]
struct TaskEnvelope {
    #[serde(default)]
    task: Option<TaskDescription>,
}

#[derive(Deserialize)]
struct ServiceEnvelope {
    #[serde(default)]
    service: Option<ServiceDescription>,
}

#[derive(Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<TaskDescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScalableTarget {
    #[serde(default)]
    min_capacity: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    endpoint: String,
}

impl HttpControlPlane {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    async fn write(&self, operation: &str, body: &serde_json::Value) -> PlatformResult<()> {
        let url = format!("{}/{operation}", self.endpoint.trim_end_matches('/'));
        let resp = post_json(&url, body)
            .await
            .map_err(|e| PlatformError::Transport {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(PlatformError::Status {
                operation: operation.to_string(),
                status: resp.status,
            })
        }
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn describe_task(
        &self,
        cluster_arn: &str,
        task_arn: &str,
    ) -> PlatformResult<Option<TaskDescription>> {
        let body = json!({"clusterArn": cluster_arn, "taskArn": task_arn});
        let envelope: TaskEnvelope = call(&self.endpoint, "describe-task", &body).await?;
        Ok(envelope.task)
    }

    async fn describe_service(
        &self,
        cluster_arn: &str,
        service_arn: &str,
    ) -> PlatformResult<Option<ServiceDescription>> {
        let body = json!({"clusterArn": cluster_arn, "serviceArn": service_arn});
        let envelope: ServiceEnvelope = call(&self.endpoint, "describe-service", &body).await?;
        Ok(envelope.service)
    }

    async fn update_desired_count(
        &self,
        cluster_arn: &str,
        service_arn: &str,
        desired_count: u32,
    ) -> PlatformResult<()> {
        let body = json!({
            "clusterArn": cluster_arn,
            "serviceArn": service_arn,
            "desiredCount": desired_count,
        });
        self.write("update-desired-count", &body).await
    }

    async fn clear_scale_in_protection(
        &self,
        cluster_arn: &str,
        task_arn: &str,
    ) -> PlatformResult<()> {
        let body = json!({
            "clusterArn": cluster_arn,
            "taskArns": [task_arn],
            "protectionEnabled": false,
        });
        self.write("update-task-protection", &body).await
    }

    async fn list_service_tasks(
        &self,
        cluster_arn: &str,
        service_arn: &str,
    ) -> PlatformResult<Vec<TaskDescription>> {
        let body = json!({"clusterArn": cluster_arn, "serviceArn": service_arn});
        let list: TaskList = call(&self.endpoint, "list-service-tasks", &body).await?;
        Ok(list.tasks)
    }
}

#[derive(Debug, Clone)]
pub struct HttpCapacityPolicy {
    endpoint: String,
}

impl HttpCapacityPolicy {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CapacityPolicy for HttpCapacityPolicy {
    async fn min_capacity(&self, service_arn: &str) -> PlatformResult<u32> {
        let resource_id = scalable_resource_id(service_arn)
            .ok_or_else(|| PlatformError::InvalidIdentifier(service_arn.to_string()))?;
        let target: ScalableTarget = call(
            &self.endpoint,
            "describe-scalable-target",
            &json!({"resourceId": resource_id}),
        )
        .await?;
        Ok(target.min_capacity.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use serde_json::Value;

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    /// Fake control plane answering every operation with `reply(op)`.
    async fn serve(reply: fn(&str) -> (StatusCode, Value)) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = axum::Router::new().route(
            "/api/v1/{op}",
            axum::routing::post(move |Path(op): Path<String>, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push((op.clone(), body));
                    let (status, value) = reply(&op);
                    (status, Json(value))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/api/v1"), seen)
    }

    #[tokio::test]
    async fn describe_task_decodes_envelope() {
        let (endpoint, seen) = serve(|_| {
            (
                StatusCode::OK,
                json!({"task": {
                    "taskArn": "arn:task/1",
                    "serviceArn": "arn:aws:ecs:us-east-1:1:service/voice/asterisk",
                    "lastStatus": "RUNNING",
                    "attachments": [{
                        "type": "ElasticNetworkInterface",
                        "details": [{"name": "privateIPv4Address", "value": "10.1.2.3"}]
                    }]
                }}),
            )
        })
        .await;
        let cp = HttpControlPlane::new(endpoint);
        let task = cp.describe_task("arn:cluster/voice", "arn:task/1").await.unwrap().unwrap();
        assert_eq!(task.private_address(), Some("10.1.2.3"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "describe-task");
        assert_eq!(seen[0].1["taskArn"], "arn:task/1");
    }

    #[tokio::test]
    async fn null_service_is_none() {
        let (endpoint, _) = serve(|_| (StatusCode::OK, json!({"service": null}))).await;
        let cp = HttpControlPlane::new(endpoint);
        assert!(cp.describe_service("c", "s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn protection_clear_body() {
        let (endpoint, seen) = serve(|_| (StatusCode::OK, json!({}))).await;
        let cp = HttpControlPlane::new(endpoint);
        cp.clear_scale_in_protection("arn:cluster/voice", "arn:task/1")
            .await
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "update-task-protection");
        assert_eq!(seen[0].1["taskArns"], json!(["arn:task/1"]));
        assert_eq!(seen[0].1["protectionEnabled"], json!(false));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (endpoint, _) = serve(|_| (StatusCode::INTERNAL_SERVER_ERROR, json!({}))).await;
        let cp = HttpControlPlane::new(endpoint);
        let err = cp.update_desired_count("c", "s", 3).await.unwrap_err();
        assert!(matches!(err, PlatformError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn min_capacity_uses_resource_id_and_defaults_to_zero() {
        let (endpoint, seen) = serve(|_| (StatusCode::OK, json!({}))).await;
        let policy = HttpCapacityPolicy::new(endpoint);
        let min = policy
            .min_capacity("arn:aws:ecs:us-east-1:1:service/voice/asterisk")
            .await
            .unwrap();
        assert_eq!(min, 0);
        assert_eq!(seen.lock().unwrap()[0].1["resourceId"], "service/voice/asterisk");
    }

    #[tokio::test]
    async fn min_capacity_rejects_malformed_arn() {
        let policy = HttpCapacityPolicy::new("http://127.0.0.1:1");
        let err = policy.min_capacity("not-an-arn").await.unwrap_err();
        assert!(matches!(err, PlatformError::InvalidIdentifier(_)));
    }
}
