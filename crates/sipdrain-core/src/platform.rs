//! Collaborator interfaces for the orchestration control plane and the
//! capacity policy.
//!
//! Handlers receive these as `Arc<dyn ...>` handles constructed once per
//! process; nothing in the coordinator reaches for a global client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attachment type carrying the task's network interface.
pub const NETWORK_INTERFACE_ATTACHMENT: &str = "ElasticNetworkInterface";

/// Attachment detail holding the private address.
pub const PRIVATE_ADDRESS_DETAIL: &str = "privateIPv4Address";

/// Task status for a task that is serving traffic.
pub const TASK_STATUS_RUNNING: &str = "RUNNING";

/// Errors raised by control-plane and capacity-policy clients.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request to {operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("{operation} returned HTTP {status}")]
    Status { operation: String, status: u16 },

    #[error("malformed {operation} response: {message}")]
    Decode { operation: String, message: String },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// A task as reported by the orchestration control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescription {
    pub task_arn: String,
    #[serde(default)]
    pub service_arn: Option<String>,
    #[serde(default)]
    pub last_status: String,
    #[serde(default)]
    pub started_at: Option<u64>,
    #[serde(default)]
    pub attachments: Vec<TaskAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub details: Vec<AttachmentDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDetail {
    pub name: String,
    pub value: String,
}

impl TaskDescription {
    /// Private address from the task's network-interface attachment.
    pub fn private_address(&self) -> Option<&str> {
        self.attachments
            .iter()
            .filter(|a| a.kind == NETWORK_INTERFACE_ATTACHMENT)
            .flat_map(|a| a.details.iter())
            .find(|d| d.name == PRIVATE_ADDRESS_DETAIL && !d.value.is_empty())
            .map(|d| d.value.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.last_status == TASK_STATUS_RUNNING
    }
}

/// A service as reported by the orchestration control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_arn: String,
    pub desired_count: u32,
}

/// Orchestration control plane: describe tasks and services, adjust
/// desired capacity, toggle scale-in protection.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// `Ok(None)` when the control plane does not know the task.
    async fn describe_task(
        &self,
        cluster_arn: &str,
        task_arn: &str,
    ) -> PlatformResult<Option<TaskDescription>>;

    /// `Ok(None)` when the control plane does not know the service.
    async fn describe_service(
        &self,
        cluster_arn: &str,
        service_arn: &str,
    ) -> PlatformResult<Option<ServiceDescription>>;

    async fn update_desired_count(
        &self,
        cluster_arn: &str,
        service_arn: &str,
        desired_count: u32,
    ) -> PlatformResult<()>;

    async fn clear_scale_in_protection(
        &self,
        cluster_arn: &str,
        task_arn: &str,
    ) -> PlatformResult<()>;

    async fn list_service_tasks(
        &self,
        cluster_arn: &str,
        service_arn: &str,
    ) -> PlatformResult<Vec<TaskDescription>>;
}

/// Capacity policy: the configured floor for a service.
#[async_trait]
pub trait CapacityPolicy: Send + Sync {
    /// Minimum capacity; a service without a registered target has floor 0.
    async fn min_capacity(&self, service_arn: &str) -> PlatformResult<u32>;
}
