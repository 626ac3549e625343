//! OVH provider handle and resource registry

use crate::client::OvhClient;
use crate::config::OvhConfig;
use crate::error::Result as OvhResult;
use crate::resources::{
    CloudInstance, CloudUser, CloudVolume, FailoverIpAttachment, LoadBalancerBackend,
    PrivateNetwork, PrivateNetworkSubnet, VrackAttachment,
};
use ovhflow_cloud::{
    ApiClient, CloudError, Reconciler, ResourceData, Result, create_resource, delete_resource,
    discard_partial, read_resource,
};
use std::sync::Arc;

type OvhReconciler = dyn Reconciler<Context = OvhProvider>;

static RESOURCES: &[&OvhReconciler] = &[
    &CloudInstance,
    &CloudVolume,
    &LoadBalancerBackend,
    &FailoverIpAttachment,
    &PrivateNetwork,
    &PrivateNetworkSubnet,
    &CloudUser,
    &VrackAttachment,
];

/// Shared context passed to every OVH reconciler
pub struct OvhProvider {
    client: Arc<dyn ApiClient>,
    default_project: Option<String>,
}

impl OvhProvider {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            default_project: None,
        }
    }

    /// Build a provider backed by a signed [`OvhClient`]
    pub fn from_config(config: &OvhConfig) -> OvhResult<Self> {
        let client = OvhClient::new(config)?;
        tracing::debug!(endpoint = client.base_url(), "OVH client ready");
        Ok(Self {
            client: Arc::new(client),
            default_project: config.default_project.clone(),
        })
    }

    pub fn with_default_project(mut self, project: impl Into<String>) -> Self {
        self.default_project = Some(project.into());
        self
    }

    pub fn client(&self) -> &dyn ApiClient {
        self.client.as_ref()
    }

    /// Project named by `key` in the descriptor, else the provider default
    pub fn project(&self, data: &ResourceData, key: &str) -> Result<String> {
        data.get_str(key)
            .or(self.default_project.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                CloudError::Validation(format!(
                    "{} is not set and no default public cloud project is configured",
                    key
                ))
            })
    }

    /// Names of every resource type this provider manages
    pub fn resource_types() -> impl Iterator<Item = &'static str> {
        RESOURCES.iter().map(|r| r.resource_type())
    }

    pub fn reconciler(resource_type: &str) -> Result<&'static OvhReconciler> {
        RESOURCES
            .iter()
            .copied()
            .find(|r| r.resource_type() == resource_type)
            .ok_or_else(|| CloudError::UnknownResourceType(resource_type.to_string()))
    }

    pub async fn create(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        create_resource(Self::reconciler(resource_type)?, self, data).await
    }

    pub async fn read(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        read_resource(Self::reconciler(resource_type)?, self, data).await
    }

    pub async fn delete(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        delete_resource(Self::reconciler(resource_type)?, self, data).await
    }

    /// Delete what a failed create left behind (descriptor without identity)
    pub async fn discard(&self, resource_type: &str, data: &mut ResourceData) -> Result<()> {
        discard_partial(Self::reconciler(resource_type)?, self, data).await
    }
}
