//! Block storage volumes (`ovh_cloud_volume`)

use super::{TRANSIENT_RETRIES, delete_if_exists};
use crate::provider::OvhProvider;
use async_trait::async_trait;
use ovhflow_cloud::{Reconciler, Refresh, ResourceData, Result, StateChangeConf, UnlistedState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const CREATE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const CREATE_DELAY: Duration = Duration::from_secs(10);
const CREATE_MIN_INTERVAL: Duration = Duration::from_secs(5);

pub struct CloudVolume;

#[derive(Debug, Serialize)]
struct CreateVolumeRequest<'a> {
    region: &'a str,
    #[serde(rename = "type")]
    volume_type: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    bootable: bool,
}

fn endpoint(project: &str, volume_id: &str) -> String {
    format!("/cloud/project/{}/volume/{}", project, volume_id)
}

#[async_trait]
impl Reconciler for CloudVolume {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_cloud_volume"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project")?;
        let region = data.require_str("region")?;
        let volume_type = data.require_str("type")?;
        let name = data.require_str("name")?;
        let request = CreateVolumeRequest {
            region: &region,
            volume_type: &volume_type,
            name: &name,
            size: data.try_get_int("size")?,
        };
        let client = ctx.client();

        let created: Volume = client
            .post(&format!("/cloud/project/{}/volume", project), &request)
            .await?;
        tracing::debug!(volume = %created.id, status = %created.status, "Volume requested");

        data.set("project", project.as_str());
        data.set("volume_id", created.id.as_str());

        // volumes only advertise their target state
        let endpoint = endpoint(&project, &created.id);
        let endpoint = endpoint.as_str();
        let conf = StateChangeConf::new(format!("volume {} (project {})", created.id, project))
            .with_target(&["available"])
            .with_failure(&["error"])
            .with_unlisted(UnlistedState::KeepWaiting)
            .with_timeout(CREATE_TIMEOUT)
            .with_delay(CREATE_DELAY)
            .with_min_interval(CREATE_MIN_INTERVAL)
            .with_transient_retries(TRANSIENT_RETRIES);
        conf.wait_for_state(move || async move {
            let volume: Volume = client.get(endpoint).await?;
            Ok(Refresh::new((), volume.status))
        })
        .await
        .map_err(|e| e.after_mutation(conf.subject()))?;

        data.set_id(format!("ovh_cloud_project_{}_volume_{}", project, created.id))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(conf.subject()))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project")?;
        let volume_id = data.require_str("volume_id")?;

        let volume: Volume = ctx.client().get(&endpoint(&project, &volume_id)).await?;
        data.set("status", volume.status.as_str());
        data.set("size", volume.size);
        data.set("bootable", volume.bootable);
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project")?;
        let volume_id = data.require_str("volume_id")?;

        delete_if_exists::<Value>(ctx.client(), &endpoint(&project, &volume_id)).await?;
        Ok(())
    }
}
