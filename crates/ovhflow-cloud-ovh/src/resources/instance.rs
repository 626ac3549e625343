//! Public cloud instances (`ovh_cloud_instance`)

use super::{TRANSIENT_RETRIES, delete_if_exists};
use crate::lookup::{self, Instance};
use crate::provider::OvhProvider;
use async_trait::async_trait;
use ovhflow_cloud::{ApiClient, Reconciler, Refresh, ResourceData, Result, StateChangeConf};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const CREATE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const CREATE_DELAY: Duration = Duration::from_secs(10);
const CREATE_MIN_INTERVAL: Duration = Duration::from_secs(5);

pub struct CloudInstance;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceRequest<'a> {
    flavor_id: &'a str,
    image_id: &'a str,
    name: &'a str,
    region: &'a str,
    ssh_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<&'a str>,
}

fn endpoint(project: &str, instance_id: &str) -> String {
    format!("/cloud/project/{}/instance/{}", project, instance_id)
}

async fn wait_for_active(conf: StateChangeConf, client: &dyn ApiClient, endpoint: &str) -> Result<()> {
    conf.with_pending(&["BUILD", "BUILDING"])
        .with_target(&["ACTIVE"])
        .with_failure(&["ERROR"])
        .with_timeout(CREATE_TIMEOUT)
        .with_delay(CREATE_DELAY)
        .with_min_interval(CREATE_MIN_INTERVAL)
        .with_transient_retries(TRANSIENT_RETRIES)
        .wait_for_state(move || async move {
            let instance: Instance = client.get(endpoint).await?;
            Ok(Refresh::new((), instance.status))
        })
        .await
}

#[async_trait]
impl Reconciler for CloudInstance {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_cloud_instance"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project")?;
        let region = data.require_str("region")?;
        let name = data.require_str("name")?;
        let ssh_key = data.require_str("ssh_key")?;
        let flavor_name = data.require_str("flavor")?;
        let image_name = data.require_str("image")?;
        let client = ctx.client();

        let flavor = lookup::get_flavor(client, &project, &flavor_name, &region).await?;
        let image = lookup::get_image(client, &project, &image_name, &region).await?;

        let request = CreateInstanceRequest {
            flavor_id: &flavor.id,
            image_id: &image.id,
            name: &name,
            region: &region,
            ssh_key: &ssh_key,
            user_data: data.get_str("userdata"),
        };
        tracing::debug!(?request, "Creating instance");
        let created: Instance = client
            .post(&format!("/cloud/project/{}/instance", project), &request)
            .await?;

        data.set("project", project.as_str());
        data.set("instance_id", created.id.as_str());

        let subject = format!("instance {} (project {})", created.id, project);
        wait_for_active(
            StateChangeConf::new(&subject),
            client,
            &endpoint(&project, &created.id),
        )
        .await
        .map_err(|e| e.after_mutation(&subject))?;

        data.set_id(format!("ovh_cloud_project_{}_instance_{}", project, created.id))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(subject))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project")?;
        let instance_id = data.require_str("instance_id")?;

        let instance = lookup::get_instance(ctx.client(), &project, &instance_id).await?;
        data.set("status", instance.status.as_str());
        data.set_opt("ip", instance.preferred_ip());
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project")?;
        let instance_id = data.require_str("instance_id")?;

        delete_if_exists::<Value>(ctx.client(), &endpoint(&project, &instance_id)).await?;
        Ok(())
    }
}
