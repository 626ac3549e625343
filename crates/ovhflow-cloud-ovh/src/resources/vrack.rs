//! Attaching a public cloud project to a vRack (`ovh_vrack_publiccloud_attachment`)

use super::{TRANSIENT_RETRIES, delete_if_exists};
use crate::provider::OvhProvider;
use crate::task::{Task, task_conf, wait_for_task};
use async_trait::async_trait;
use ovhflow_cloud::{ApiClient, Reconciler, ResourceData, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TASK_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const TASK_DELAY: Duration = Duration::from_secs(10);
const TASK_MIN_INTERVAL: Duration = Duration::from_secs(3);

pub struct VrackAttachment;

#[derive(Debug, Serialize)]
struct AttachRequest<'a> {
    project: &'a str,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default)]
    vrack: String,
    #[serde(default)]
    project: String,
}

fn attachment_endpoint(vrack: &str, project: &str) -> String {
    format!("/vrack/{}/cloudProject/{}", vrack, project)
}

async fn wait_for_vrack_task(client: &dyn ApiClient, vrack: &str, task: &Task) -> Result<()> {
    let endpoint = format!("/vrack/{}/task/{}", vrack, task.id);
    let conf = task_conf(format!("vrack {} task {}", vrack, task.id))
        .with_timeout(TASK_TIMEOUT)
        .with_delay(TASK_DELAY)
        .with_min_interval(TASK_MIN_INTERVAL)
        .with_transient_retries(TRANSIENT_RETRIES);
    wait_for_task(client, &endpoint, task.id, conf).await?;
    Ok(())
}

#[async_trait]
impl Reconciler for VrackAttachment {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_vrack_publiccloud_attachment"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let vrack = data.require_str("vrack_id")?;
        let project = ctx.project(data, "project_id")?;
        let client = ctx.client();

        let task: Task = client
            .post(
                &format!("/vrack/{}/cloudProject", vrack),
                &AttachRequest { project: &project },
            )
            .await?;
        tracing::debug!(task = task.id, vrack = %vrack, project = %project, "vRack attach task started");

        data.set("project_id", project.as_str());
        let subject = format!("vRack {} attachment of project {}", vrack, project);
        wait_for_vrack_task(client, &vrack, &task)
            .await
            .map_err(|e| e.after_mutation(&subject))?;

        data.set_id(format!("vrack_{}-cloudproject_{}", vrack, project))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(subject))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let vrack = data.require_str("vrack_id")?;
        let project = ctx.project(data, "project_id")?;

        let attachment: Attachment = ctx
            .client()
            .get(&attachment_endpoint(&vrack, &project))
            .await?;
        tracing::debug!(vrack = %attachment.vrack, project = %attachment.project, "vRack attachment present");
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let vrack = data.require_str("vrack_id")?;
        let project = ctx.project(data, "project_id")?;
        let client = ctx.client();

        if let Some(task) =
            delete_if_exists::<Task>(client, &attachment_endpoint(&vrack, &project)).await?
        {
            wait_for_vrack_task(client, &vrack, &task).await?;
        }
        Ok(())
    }
}
