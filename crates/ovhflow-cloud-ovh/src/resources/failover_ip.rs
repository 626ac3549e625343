//! Failover IP routing to an instance (`ovh_publiccloud_failover_ip`)
//!
//! Attaching routes the IP to an instance. The IP can only be routed to
//! instances in a region compatible with its geolocation, which is checked
//! before anything is attached. There is no detach call: deleting only
//! forgets the attachment, the IP stays routed until it is attached
//! elsewhere.

use super::TRANSIENT_RETRIES;
use crate::lookup::{self, FailoverIp};
use crate::provider::OvhProvider;
use crate::regions::is_region_compatible;
use async_trait::async_trait;
use ovhflow_cloud::{CloudError, Reconciler, Refresh, ResourceData, Result, StateChangeConf};
use serde::Serialize;
use std::time::Duration;

const ATTACH_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const ATTACH_DELAY: Duration = Duration::from_secs(10);
const ATTACH_MIN_INTERVAL: Duration = Duration::from_secs(3);

pub struct FailoverIpAttachment;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachRequest<'a> {
    instance_id: &'a str,
}

#[async_trait]
impl Reconciler for FailoverIpAttachment {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_publiccloud_failover_ip"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let instance_id = data.require_str("instance_id")?;
        let client = ctx.client();

        let ip = lookup::failover_ip_from_descriptor(client, &project, data).await?;
        let instance = lookup::get_instance(client, &project, &instance_id).await?;

        if !is_region_compatible(&ip.geoloc, &instance.region) {
            return Err(CloudError::Validation(format!(
                "failover IP {} (geolocation {:?}) cannot be routed to instance {} in region {}, allowed regions: {:?}",
                ip.ip, ip.geoloc, instance_id, instance.region, ip.regions
            )));
        }

        let ip_endpoint = format!("/cloud/project/{}/ip/failover/{}", project, ip.id);
        let _: FailoverIp = client
            .post(
                &format!("{}/attach", ip_endpoint),
                &AttachRequest {
                    instance_id: &instance_id,
                },
            )
            .await?;
        tracing::info!(ip = %ip.ip, instance = %instance_id, "Failover IP attach requested");

        data.set("project_id", project.as_str());
        data.set("ip_id", ip.id.as_str());

        let endpoint = ip_endpoint.as_str();
        let conf = StateChangeConf::new(format!(
            "failover IP {} ({}) attached to instance {}",
            ip.ip, ip.id, instance_id
        ))
        .with_pending(&["operationPending"])
        .with_target(&["ok"])
        .with_timeout(ATTACH_TIMEOUT)
        .with_delay(ATTACH_DELAY)
        .with_min_interval(ATTACH_MIN_INTERVAL)
        .with_transient_retries(TRANSIENT_RETRIES);
        conf.wait_for_state(move || async move {
            let current: FailoverIp = client.get(endpoint).await?;
            Ok(Refresh::new((), current.status))
        })
        .await
        .map_err(|e| e.after_mutation(conf.subject()))?;

        data.set_id(format!("failover_ip_{}-instance_{}", ip.id, instance_id))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(conf.subject()))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;

        let ip = lookup::failover_ip_from_descriptor(ctx.client(), &project, data).await?;
        data.set("ip_address", ip.ip.as_str());
        data.set("ip_id", ip.id.as_str());
        data.set_opt("instance_id", ip.routed_to.as_deref());
        data.set("geoloc", ip.geoloc.as_str());
        data.set("status", ip.status.as_str());
        Ok(())
    }

    async fn delete(&self, _ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        tracing::warn!(
            ip = data.get_str("ip_address").unwrap_or_default(),
            "Failover IPs cannot be detached, leaving the IP routed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovhflow_cloud::testing::StubApiClient;
    use ovhflow_cloud::{ApiError, ConvergenceError, Method, create_resource, delete_resource};
    use serde_json::{Value, json};
    use std::sync::Arc;

    const IP: &str = "/cloud/project/p1/ip/failover/ip-us";
    const ATTACH: &str = "/cloud/project/p1/ip/failover/ip-us/attach";

    fn stub_with_instance(region: &str) -> Arc<StubApiClient> {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(
            Method::Get,
            "/cloud/project/p1/ip/failover",
            json!([{"id": "ip-us", "ip": "198.51.100.4", "geoloc": "US", "status": "ok"}]),
        )
        .ok(
            Method::Get,
            "/cloud/project/p1/instance/i-1",
            json!({"id": "i-1", "region": region, "status": "ACTIVE"}),
        );
        stub
    }

    fn descriptor() -> ResourceData {
        ResourceData::new()
            .with("ip_address", "198.51.100.4")
            .with("instance_id", "i-1")
    }

    fn provider(stub: &Arc<StubApiClient>) -> OvhProvider {
        OvhProvider::new(stub.clone()).with_default_project("p1")
    }

    fn ip(status: &str, routed_to: Value) -> Value {
        json!({
            "id": "ip-us",
            "ip": "198.51.100.4",
            "geoloc": "US",
            "status": status,
            "routedTo": routed_to,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_incompatible_region_rejected_before_attach() {
        let stub = stub_with_instance("GRA1");

        let mut data = descriptor();
        let err = create_resource(&FailoverIpAttachment, &provider(&stub), &mut data)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Validation(_)));
        assert_eq!(stub.mutations(), 0);
        assert_eq!(data.id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compatible_region_attaches() {
        let stub = stub_with_instance("BHS1");
        stub.ok(Method::Post, ATTACH, ip("operationPending", Value::Null))
            .ok(Method::Get, IP, ip("operationPending", Value::Null))
            .ok(Method::Get, IP, ip("ok", json!("i-1")));

        let mut data = descriptor();
        create_resource(&FailoverIpAttachment, &provider(&stub), &mut data)
            .await
            .unwrap();

        assert_eq!(stub.count(Method::Post, ATTACH), 1);
        let attach = stub
            .calls()
            .into_iter()
            .find(|c| c.path == ATTACH)
            .unwrap();
        assert_eq!(attach.body, Some(json!({"instanceId": "i-1"})));

        assert_eq!(data.id(), Some("failover_ip_ip-us-instance_i-1"));
        assert_eq!(data.get_str("project_id"), Some("p1"));
        assert_eq!(data.get_str("ip_id"), Some("ip-us"));
        assert_eq!(data.get_str("geoloc"), Some("US"));
        assert_eq!(data.get_str("status"), Some("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_after_attach_is_convergence() {
        let stub = stub_with_instance("BHS1");
        stub.ok(Method::Post, ATTACH, ip("operationPending", Value::Null))
            .fail(Method::Get, IP, ApiError::status(403, "denied"));

        let mut data = descriptor();
        let err = create_resource(&FailoverIpAttachment, &provider(&stub), &mut data)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CloudError::Convergence {
                ref subject,
                reason: ConvergenceError::Interrupted { .. },
            } if subject.contains("ip-us") && subject.contains("i-1")
        ));
        assert_eq!(data.get_str("ip_id"), Some("ip-us"));
        assert_eq!(data.id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_selector_is_validation_error() {
        let stub = stub_with_instance("BHS1");
        let mut data = ResourceData::new().with("instance_id", "i-1");

        let err = create_resource(&FailoverIpAttachment, &provider(&stub), &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
        assert_eq!(stub.mutations(), 0);
    }

    #[tokio::test]
    async fn test_delete_only_clears_identity() {
        let stub = stub_with_instance("BHS1");
        let mut data = descriptor();
        data.set_id("failover_ip_ip-us-instance_i-1").unwrap();

        delete_resource(&FailoverIpAttachment, &provider(&stub), &mut data)
            .await
            .unwrap();
        assert_eq!(data.id(), None);
        assert!(stub.calls().is_empty());
    }
}
