//! Scale-in candidate selection.
//!
//! Picks the most recently started RUNNING task of a service whose drain
//! record is not DRAINING. Newer tasks carry the fewest long-lived calls.

use tracing::debug;

use sipdrain_core::{ControlPlane, TaskDescription};
use sipdrain_state::{DrainState, StateStore};

use crate::error::CoordinatorResult;

pub async fn select_candidate(
    control_plane: &dyn ControlPlane,
    store: &StateStore,
    cluster_arn: &str,
    service_arn: &str,
) -> CoordinatorResult<Option<TaskDescription>> {
    let tasks = control_plane
        .list_service_tasks(cluster_arn, service_arn)
        .await?;

    let mut best: Option<TaskDescription> = None;
    for task in tasks.into_iter().filter(TaskDescription::is_running) {
        if let Some(record) = store.get(&task.task_arn)?
            && record.state == DrainState::Draining
        {
            continue;
        }
        let newer = match &best {
            Some(current) => task.started_at.unwrap_or(0) > current.started_at.unwrap_or(0),
            None => true,
        };
        if newer {
            best = Some(task);
        }
    }

    debug!(
        service = %service_arn,
        candidate = best.as_ref().map(|t| t.task_arn.as_str()),
        "candidate selection complete"
    );
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipdrain_state::RecordUpdate;
    use sipdrain_test_utils::{FakePlatform, running_task};

    const SVC: &str = "arn:aws:ecs:us-east-1:1:service/voice/asterisk";

    #[tokio::test]
    async fn newest_running_task_wins() {
        let platform = FakePlatform::new()
            .with_task(running_task("task-old", SVC, "10.0.0.1", 100))
            .with_task(running_task("task-new", SVC, "10.0.0.2", 300))
            .with_task(running_task("task-mid", SVC, "10.0.0.3", 200));
        let store = StateStore::open_in_memory().unwrap();

        let pick = select_candidate(&platform, &store, "c", SVC).await.unwrap();
        assert_eq!(pick.unwrap().task_arn, "task-new");
    }

    #[tokio::test]
    async fn draining_and_stopped_tasks_are_skipped() {
        let mut stopped = running_task("task-stopped", SVC, "10.0.0.9", 900);
        stopped.last_status = "STOPPED".to_string();
        let platform = FakePlatform::new()
            .with_task(running_task("task-old", SVC, "10.0.0.1", 100))
            .with_task(running_task("task-new", SVC, "10.0.0.2", 300))
            .with_task(stopped);
        let store = StateStore::open_in_memory().unwrap();
        store
            .update("task-new", &RecordUpdate::state(DrainState::Draining))
            .unwrap();

        let pick = select_candidate(&platform, &store, "c", SVC).await.unwrap();
        assert_eq!(pick.unwrap().task_arn, "task-old");
    }

    #[tokio::test]
    async fn rolled_back_task_is_eligible_again() {
        let platform =
            FakePlatform::new().with_task(running_task("task-a", SVC, "10.0.0.1", 100));
        let store = StateStore::open_in_memory().unwrap();
        store
            .update("task-a", &RecordUpdate::state(DrainState::Running))
            .unwrap();

        let pick = select_candidate(&platform, &store, "c", SVC).await.unwrap();
        assert_eq!(pick.unwrap().task_arn, "task-a");
    }

    #[tokio::test]
    async fn empty_service_has_no_candidate() {
        let platform = FakePlatform::new();
        let store = StateStore::open_in_memory().unwrap();
        assert!(select_candidate(&platform, &store, "c", SVC).await.unwrap().is_none());
    }
}
