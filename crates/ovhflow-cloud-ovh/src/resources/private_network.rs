//! vRack private networks (`ovh_publiccloud_private_network`)

use super::{TRANSIENT_RETRIES, delete_if_exists, wait_until_gone};
use crate::provider::OvhProvider;
use async_trait::async_trait;
use ovhflow_cloud::{Reconciler, Refresh, ResourceData, Result, StateChangeConf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DELAY: Duration = Duration::from_secs(10);
const MIN_INTERVAL: Duration = Duration::from_secs(3);

pub struct PrivateNetwork;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateNetworkRequest<'a> {
    name: &'a str,
    vlan_id: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    regions: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Network {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    vlan_id: i64,
}

fn endpoint(project: &str, network_id: &str) -> String {
    format!("/cloud/project/{}/network/private/{}", project, network_id)
}

fn conf(subject: String) -> StateChangeConf {
    StateChangeConf::new(subject)
        .with_timeout(TIMEOUT)
        .with_delay(DELAY)
        .with_min_interval(MIN_INTERVAL)
        .with_transient_retries(TRANSIENT_RETRIES)
}

#[async_trait]
impl Reconciler for PrivateNetwork {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_publiccloud_private_network"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let name = data.require_str("name")?;
        let regions = data.get_str("regions").unwrap_or_default().to_string();
        let client = ctx.client();

        let request = CreateNetworkRequest {
            name: &name,
            vlan_id: data.try_get_int("vlan_id")?.unwrap_or(0),
            regions: regions
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .collect(),
        };
        let created: Network = client
            .post(&format!("/cloud/project/{}/network/private", project), &request)
            .await?;

        data.set("project_id", project.as_str());
        data.set("network_id", created.id.as_str());

        let endpoint = endpoint(&project, &created.id);
        let endpoint = endpoint.as_str();
        let poll = conf(format!("private network {} (project {})", created.id, project))
            .with_pending(&["BUILDING"])
            .with_target(&["ACTIVE"]);
        poll.wait_for_state(move || async move {
            let network: Network = client.get(endpoint).await?;
            Ok(Refresh::new((), network.status))
        })
        .await
        .map_err(|e| e.after_mutation(poll.subject()))?;

        data.set_id(format!("ovh_cloud_project_{}_network_{}", project, created.id))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(poll.subject()))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let network_id = data.require_str("network_id")?;

        let network: Network = ctx.client().get(&endpoint(&project, &network_id)).await?;
        data.set("status", network.status.as_str());
        data.set("type", network.kind.as_str());
        data.set("vlan_id", network.vlan_id);
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let network_id = data.require_str("network_id")?;
        let client = ctx.client();
        let endpoint = endpoint(&project, &network_id);

        if delete_if_exists::<Value>(client, &endpoint).await?.is_none() {
            return Ok(());
        }
        wait_until_gone(
            client,
            &endpoint,
            "DELETED",
            conf(format!("private network {} deletion (project {})", network_id, project)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovhflow_cloud::testing::StubApiClient;
    use ovhflow_cloud::{ApiError, CloudError, Method, create_resource, delete_resource};
    use serde_json::json;
    use std::sync::Arc;

    const NETWORK: &str = "/cloud/project/p1/network/private/pn-1";

    fn network(status: &str) -> Value {
        json!({"id": "pn-1", "name": "backend", "vlanId": 12, "status": status, "type": "private"})
    }

    #[tokio::test(start_paused = true)]
    async fn test_create() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(Method::Post, "/cloud/project/p1/network/private", network("BUILDING"))
            .ok(Method::Get, NETWORK, network("BUILDING"))
            .ok(Method::Get, NETWORK, network("ACTIVE"));

        let provider = OvhProvider::new(stub.clone());
        let mut data = ResourceData::new()
            .with("project_id", "p1")
            .with("name", "backend")
            .with("vlan_id", 12i64)
            .with("regions", "GRA1, SBG1");
        create_resource(&PrivateNetwork, &provider, &mut data).await.unwrap();

        assert_eq!(data.id(), Some("ovh_cloud_project_p1_network_pn-1"));
        assert_eq!(data.get_str("type"), Some("private"));
        assert_eq!(
            stub.calls()[0].body,
            Some(json!({"name": "backend", "vlanId": 12, "regions": ["GRA1", "SBG1"]}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_create_state_fails() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(Method::Post, "/cloud/project/p1/network/private", network("BUILDING"))
            .ok(Method::Get, NETWORK, network("DELETING"));

        let provider = OvhProvider::new(stub.clone());
        let mut data = ResourceData::new().with("project_id", "p1").with("name", "backend");
        let err = create_resource(&PrivateNetwork, &provider, &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Convergence { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_polls_until_not_found() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(Method::Delete, NETWORK, Value::Null)
            .ok(Method::Get, NETWORK, network("DELETING"))
            .fail(Method::Get, NETWORK, ApiError::not_found("network gone"));

        let provider = OvhProvider::new(stub.clone());
        let mut data = ResourceData::new()
            .with("project_id", "p1")
            .with("network_id", "pn-1");
        data.set_id("ovh_cloud_project_p1_network_pn-1").unwrap();
        delete_resource(&PrivateNetwork, &provider, &mut data).await.unwrap();

        assert_eq!(stub.count(Method::Get, NETWORK), 2);
        assert_eq!(data.id(), None);
    }
}
