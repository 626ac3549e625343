//! IP load balancer backends (`ovh_ip_loadbalancing_backend`)

use super::{TRANSIENT_RETRIES, delete_if_exists};
use crate::provider::OvhProvider;
use crate::task::{Task, task_conf, wait_for_task};
use async_trait::async_trait;
use ovhflow_cloud::{ApiClient, Reconciler, ResourceData, Result, StateChangeConf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TASK_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const TASK_DELAY: Duration = Duration::from_secs(15);
const TASK_MIN_INTERVAL: Duration = Duration::from_secs(5);

pub struct LoadBalancerBackend;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBackendRequest<'a> {
    ip_backend: &'a str,
    probe: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Backend {
    #[serde(default)]
    probe: String,
    #[serde(default)]
    weight: Option<i64>,
    #[serde(default)]
    zone: String,
}

fn backend_endpoint(service: &str, backend_ip: &str) -> String {
    format!("/ip/loadBalancing/{}/backend/{}", service, backend_ip)
}

fn task_timing(subject: String) -> StateChangeConf {
    task_conf(subject)
        .with_timeout(TASK_TIMEOUT)
        .with_delay(TASK_DELAY)
        .with_min_interval(TASK_MIN_INTERVAL)
        .with_transient_retries(TRANSIENT_RETRIES)
}

async fn wait_for_lb_task(client: &dyn ApiClient, service: &str, task: &Task) -> Result<()> {
    let endpoint = format!("/ip/loadBalancing/{}/task/{}", service, task.id);
    let conf = task_timing(format!("load balancer {} task {}", service, task.id));
    wait_for_task(client, &endpoint, task.id, conf).await?;
    Ok(())
}

#[async_trait]
impl Reconciler for LoadBalancerBackend {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_ip_loadbalancing_backend"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let service = data.require_str("service_name")?;
        let backend_ip = data.require_str("backend_ip")?;
        let probe = data.require_str("probe")?;
        let client = ctx.client();

        let request = CreateBackendRequest {
            ip_backend: &backend_ip,
            probe: &probe,
            weight: data.try_get_int("weight")?,
        };
        let task: Task = client
            .post(&format!("/ip/loadBalancing/{}/backend", service), &request)
            .await?;
        tracing::debug!(task = task.id, service = %service, "Backend creation task started");

        let subject = format!("backend {} of load balancer {}", backend_ip, service);
        wait_for_lb_task(client, &service, &task)
            .await
            .map_err(|e| e.after_mutation(&subject))?;

        data.set_id(format!("ip_loadbalancer_{}_backend_{}", service, backend_ip))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(subject))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let service = data.require_str("service_name")?;
        let backend_ip = data.require_str("backend_ip")?;

        let backend: Backend = ctx
            .client()
            .get(&backend_endpoint(&service, &backend_ip))
            .await?;
        data.set("probe", backend.probe.as_str());
        data.set_opt("weight", backend.weight);
        data.set("zone", backend.zone.as_str());
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let service = data.require_str("service_name")?;
        let backend_ip = data.require_str("backend_ip")?;
        let client = ctx.client();

        if let Some(task) =
            delete_if_exists::<Task>(client, &backend_endpoint(&service, &backend_ip)).await?
        {
            wait_for_lb_task(client, &service, &task).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovhflow_cloud::testing::StubApiClient;
    use ovhflow_cloud::{ApiError, CloudError, Method, create_resource, delete_resource};
    use serde_json::json;
    use std::sync::Arc;

    const BACKEND: &str = "/ip/loadBalancing/lb-1/backend/10.0.0.7";
    const TASK: &str = "/ip/loadBalancing/lb-1/task/42";

    fn descriptor() -> ResourceData {
        ResourceData::new()
            .with("service_name", "lb-1")
            .with("backend_ip", "10.0.0.7")
            .with("probe", "http")
            .with("weight", 8i64)
    }

    fn backend() -> serde_json::Value {
        json!({"backend": "10.0.0.7", "probe": "http", "weight": 8, "zone": "gra"})
    }

    #[tokio::test(start_paused = true)]
    async fn test_purged_task_completes_create() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(
            Method::Post,
            "/ip/loadBalancing/lb-1/backend",
            json!({"id": 42, "action": "addBackend", "status": "todo"}),
        )
        .ok(Method::Get, TASK, json!({"id": 42, "status": "doing"}))
        .fail(Method::Get, TASK, ApiError::not_found("task not found"))
        .ok(Method::Get, BACKEND, backend());

        let provider = OvhProvider::new(stub.clone());
        let mut data = descriptor();
        create_resource(&LoadBalancerBackend, &provider, &mut data)
            .await
            .unwrap();

        assert_eq!(data.id(), Some("ip_loadbalancer_lb-1_backend_10.0.0.7"));
        assert_eq!(data.get_str("zone"), Some("gra"));
        assert_eq!(stub.count(Method::Get, TASK), 2);
        assert_eq!(
            stub.calls()[0].body,
            Some(json!({"ipBackend": "10.0.0.7", "probe": "http", "weight": 8}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_task_state_fails() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(
            Method::Post,
            "/ip/loadBalancing/lb-1/backend",
            json!({"id": 42, "status": "todo"}),
        )
        .ok(Method::Get, TASK, json!({"id": 42, "status": "blocked"}));

        let provider = OvhProvider::new(stub.clone());
        let mut data = descriptor();
        let err = create_resource(&LoadBalancerBackend, &provider, &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Convergence { .. }));
        assert_eq!(data.id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_read_back_is_convergence() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(
            Method::Post,
            "/ip/loadBalancing/lb-1/backend",
            json!({"id": 42, "status": "todo"}),
        )
        .ok(Method::Get, TASK, json!({"id": 42, "status": "completed"}))
        .fail(Method::Get, BACKEND, ApiError::status(500, "internal"));

        let provider = OvhProvider::new(stub.clone());
        let mut data = descriptor();
        let err = create_resource(&LoadBalancerBackend, &provider, &mut data)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Convergence { ref subject, .. } if subject.contains("lb-1")));
        assert_eq!(data.id(), Some("ip_loadbalancer_lb-1_backend_10.0.0.7"));
    }

    #[tokio::test]
    async fn test_mistyped_weight_rejected_before_post() {
        let stub = Arc::new(StubApiClient::new());
        let provider = OvhProvider::new(stub.clone());
        let mut data = descriptor().with("weight", "8");

        let err = create_resource(&LoadBalancerBackend, &provider, &mut data)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
        assert_eq!(stub.mutations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_for_task() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(Method::Delete, BACKEND, json!({"id": 42, "status": "todo"}))
            .ok(Method::Get, TASK, json!({"id": 42, "status": "done"}));

        let provider = OvhProvider::new(stub.clone());
        let mut data = descriptor();
        data.set_id("ip_loadbalancer_lb-1_backend_10.0.0.7").unwrap();
        delete_resource(&LoadBalancerBackend, &provider, &mut data)
            .await
            .unwrap();

        assert_eq!(stub.count(Method::Get, TASK), 1);
        assert_eq!(data.id(), None);
    }
}
