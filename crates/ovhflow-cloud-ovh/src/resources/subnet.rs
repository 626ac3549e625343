//! Private network subnets (`ovh_publiccloud_private_network_subnet`)
//!
//! Subnets are created synchronously. The API has no endpoint for a single
//! subnet, so reads list the network's subnets and pick ours.

use super::delete_if_exists;
use crate::provider::OvhProvider;
use async_trait::async_trait;
use ovhflow_cloud::{ApiError, CloudError, Reconciler, ResourceData, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct PrivateNetworkSubnet;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubnetRequest<'a> {
    start: &'a str,
    end: &'a str,
    network: &'a str,
    region: &'a str,
    dhcp: bool,
    no_gateway: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subnet {
    id: String,
    #[serde(default)]
    cidr: String,
    #[serde(default)]
    gateway_ip: Option<String>,
}

fn subnets_endpoint(project: &str, network_id: &str) -> String {
    format!("/cloud/project/{}/network/private/{}/subnet", project, network_id)
}

#[async_trait]
impl Reconciler for PrivateNetworkSubnet {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_publiccloud_private_network_subnet"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let network_id = data.require_str("network_id")?;
        let start = data.require_str("start")?;
        let end = data.require_str("end")?;
        let network = data.require_str("network")?;
        let region = data.require_str("region")?;

        let request = CreateSubnetRequest {
            start: &start,
            end: &end,
            network: &network,
            region: &region,
            dhcp: data.try_get_bool("dhcp")?.unwrap_or(false),
            no_gateway: data.try_get_bool("no_gateway")?.unwrap_or(false),
        };
        let created: Subnet = ctx
            .client()
            .post(&subnets_endpoint(&project, &network_id), &request)
            .await?;
        tracing::info!(subnet = %created.id, cidr = %created.cidr, "Subnet created");

        data.set("project_id", project.as_str());
        data.set("subnet_id", created.id.as_str());
        data.set_id(format!(
            "ovh_cloud_project_{}_network_{}_subnet_{}",
            project, network_id, created.id
        ))?;
        self.read(ctx, data).await.map_err(|e| {
            e.after_mutation(format!("subnet {} of network {}", created.id, network_id))
        })
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let network_id = data.require_str("network_id")?;
        let subnet_id = data.require_str("subnet_id")?;

        let endpoint = subnets_endpoint(&project, &network_id);
        let subnets: Vec<Subnet> = ctx.client().get(&endpoint).await?;
        let subnet = subnets
            .into_iter()
            .find(|s| s.id == subnet_id)
            .ok_or_else(|| {
                CloudError::remote(
                    endpoint.as_str(),
                    ApiError::not_found(format!("subnet {} not found in network {}", subnet_id, network_id)),
                )
            })?;

        data.set("cidr", subnet.cidr.as_str());
        data.set_opt("gateway_ip", subnet.gateway_ip);
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let network_id = data.require_str("network_id")?;
        let subnet_id = data.require_str("subnet_id")?;

        let endpoint = format!("{}/{}", subnets_endpoint(&project, &network_id), subnet_id);
        delete_if_exists::<Value>(ctx.client(), &endpoint).await?;
        Ok(())
    }
}
