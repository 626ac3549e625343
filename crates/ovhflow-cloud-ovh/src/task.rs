//! Waiting on OVH asynchronous tasks
//!
//! Load balancer and vRack mutations answer with a task object that has to
//! be polled on its own endpoint. Finished tasks are eventually purged, so a
//! task endpoint answering 404 counts as completed.

use ovhflow_cloud::{ApiClient, NotFoundPolicy, Refresh, Result, StateChangeConf, UnlistedState};
use serde::Deserialize;

pub const TASK_PENDING: &[&str] = &["init", "todo", "doing"];
pub const TASK_DONE: &[&str] = &["done", "completed"];
pub const TASK_FAILED: &[&str] = &["cancelled", "error"];

/// State reported when the task endpoint no longer knows the task
pub const TASK_PURGED: &str = "completed";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
}

/// Poll settings for a task, with task states preset
pub fn task_conf(subject: impl Into<String>) -> StateChangeConf {
    StateChangeConf::new(subject)
        .with_pending(TASK_PENDING)
        .with_target(TASK_DONE)
        .with_failure(TASK_FAILED)
        .with_unlisted(UnlistedState::Fail)
}

/// Poll `endpoint` until the task completes; returns the task id
pub async fn wait_for_task(
    client: &dyn ApiClient,
    endpoint: &str,
    task_id: i64,
    conf: StateChangeConf,
) -> Result<i64> {
    let not_found = NotFoundPolicy::Completes(TASK_PURGED);

    conf.wait_for_state(move || async move {
        match client.get::<Task>(endpoint).await {
            Ok(task) => {
                tracing::debug!(task = task.id, status = %task.status, "Polled task");
                Ok(Refresh::new(task.id, task.status))
            }
            Err(e) => not_found.recover(task_id, e),
        }
    })
    .await
}
