use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use sipdrain_core::{
    AttachmentDetail, CapacityPolicy, ControlPlane, NETWORK_INTERFACE_ATTACHMENT,
    PRIVATE_ADDRESS_DETAIL, PlatformError, PlatformResult, ServiceDescription, TASK_STATUS_RUNNING,
    TaskAttachment, TaskDescription,
};

/// A running task with a network-interface attachment carrying `ip`.
pub fn running_task(
    task_arn: &str,
    service_arn: &str,
    ip: &str,
    started_at: u64,
) -> TaskDescription {
    TaskDescription {
        task_arn: task_arn.to_string(),
        service_arn: Some(service_arn.to_string()),
        last_status: TASK_STATUS_RUNNING.to_string(),
        started_at: Some(started_at),
        attachments: vec![TaskAttachment {
            kind: NETWORK_INTERFACE_ATTACHMENT.to_string(),
            details: vec![AttachmentDetail {
                name: PRIVATE_ADDRESS_DETAIL.to_string(),
                value: ip.to_string(),
            }],
        }],
    }
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, TaskDescription>,
    desired: HashMap<String, u32>,
    min_capacity: HashMap<String, u32>,
    protection_cleared: Vec<String>,
    desired_updates: Vec<(String, u32)>,
}

/// In-memory control plane and capacity policy.
#[derive(Default)]
pub struct FakePlatform {
    inner: Mutex<Inner>,
    fail_describe_task: AtomicBool,
    fail_describe_service: AtomicBool,
    fail_update_desired: AtomicBool,
    fail_clear_protection: AtomicBool,
    fail_min_capacity: AtomicBool,
}

fn injected(operation: &str) -> PlatformError {
    PlatformError::Transport {
        operation: operation.to_string(),
        message: "injected failure".to_string(),
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(self, task: TaskDescription) -> Self {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .insert(task.task_arn.clone(), task);
        self
    }

    pub fn with_service(self, service_arn: &str, desired: u32, min_capacity: u32) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.desired.insert(service_arn.to_string(), desired);
            inner.min_capacity.insert(service_arn.to_string(), min_capacity);
        }
        self
    }

    pub fn set_desired(&self, service_arn: &str, desired: u32) {
        self.inner
            .lock()
            .unwrap()
            .desired
            .insert(service_arn.to_string(), desired);
    }

    pub fn desired(&self, service_arn: &str) -> Option<u32> {
        self.inner.lock().unwrap().desired.get(service_arn).copied()
    }

    pub fn protection_cleared(&self) -> Vec<String> {
        self.inner.lock().unwrap().protection_cleared.clone()
    }

    pub fn desired_updates(&self) -> Vec<(String, u32)> {
        self.inner.lock().unwrap().desired_updates.clone()
    }

    pub fn fail_describe_task(&self, on: bool) {
        self.fail_describe_task.store(on, Ordering::SeqCst);
    }

    pub fn fail_describe_service(&self, on: bool) {
        self.fail_describe_service.store(on, Ordering::SeqCst);
    }

    pub fn fail_update_desired(&self, on: bool) {
        self.fail_update_desired.store(on, Ordering::SeqCst);
    }

    pub fn fail_clear_protection(&self, on: bool) {
        self.fail_clear_protection.store(on, Ordering::SeqCst);
    }

    pub fn fail_min_capacity(&self, on: bool) {
        self.fail_min_capacity.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ControlPlane for FakePlatform {
    async fn describe_task(
        &self,
        _cluster_arn: &str,
        task_arn: &str,
    ) -> PlatformResult<Option<TaskDescription>> {
        if self.fail_describe_task.load(Ordering::SeqCst) {
            return Err(injected("describe-task"));
        }
        Ok(self.inner.lock().unwrap().tasks.get(task_arn).cloned())
    }

    async fn describe_service(
        &self,
        _cluster_arn: &str,
        service_arn: &str,
    ) -> PlatformResult<Option<ServiceDescription>> {
        if self.fail_describe_service.load(Ordering::SeqCst) {
            return Err(injected("describe-service"));
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .desired
            .get(service_arn)
            .map(|&desired_count| ServiceDescription {
                service_arn: service_arn.to_string(),
                desired_count,
            }))
    }

    async fn update_desired_count(
        &self,
        _cluster_arn: &str,
        service_arn: &str,
        desired_count: u32,
    ) -> PlatformResult<()> {
        if self.fail_update_desired.load(Ordering::SeqCst) {
            return Err(injected("update-desired-count"));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.desired.insert(service_arn.to_string(), desired_count);
        inner
            .desired_updates
            .push((service_arn.to_string(), desired_count));
        Ok(())
    }

    async fn clear_scale_in_protection(
        &self,
        _cluster_arn: &str,
        task_arn: &str,
    ) -> PlatformResult<()> {
        if self.fail_clear_protection.load(Ordering::SeqCst) {
            return Err(injected("update-task-protection"));
        }
        self.inner
            .lock()
            .unwrap()
            .protection_cleared
            .push(task_arn.to_string());
        Ok(())
    }

    async fn list_service_tasks(
        &self,
        _cluster_arn: &str,
        service_arn: &str,
    ) -> PlatformResult<Vec<TaskDescription>> {
        let mut tasks: Vec<TaskDescription> = self
            .inner
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| t.service_arn.as_deref() == Some(service_arn))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.task_arn.cmp(&b.task_arn));
        Ok(tasks)
    }
}

#[async_trait]
impl CapacityPolicy for FakePlatform {
    async fn min_capacity(&self, service_arn: &str) -> PlatformResult<u32> {
        if self.fail_min_capacity.load(Ordering::SeqCst) {
            return Err(injected("describe-scalable-target"));
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .min_capacity
            .get(service_arn)
            .copied()
            .unwrap_or(0))
    }
}
