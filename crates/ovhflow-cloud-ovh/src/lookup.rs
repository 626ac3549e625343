//! Name and address resolution against the OVH API
//!
//! Descriptors refer to flavors and images by name and to failover IPs by
//! address. These helpers turn them into remote ids before anything is
//! mutated. A failed match is a [`CloudError::Resolution`].

use crate::regions::regions_for_geolocation;
use ovhflow_cloud::{ApiClient, CloudError, ResourceData, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub vcpus: i64,
    #[serde(default)]
    pub ram: i64,
    #[serde(default)]
    pub disk: i64,
    #[serde(default)]
    pub os_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub min_disk: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub ip: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddress>,
}

impl Instance {
    /// First public IPv4 address, falling back to the first address listed
    pub fn preferred_ip(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|a| a.kind == "public" && a.version == 4)
            .or_else(|| self.ip_addresses.first())
            .map(|a| a.ip.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverIp {
    pub id: String,
    pub ip: String,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub routed_to: Option<String>,
    #[serde(default)]
    pub geoloc: String,
    #[serde(default)]
    pub continent_code: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub progress: i64,
    /// Regions the IP can be routed to, derived from `geoloc`
    #[serde(skip)]
    pub regions: Vec<&'static str>,
}

impl FailoverIp {
    fn with_regions(mut self) -> Self {
        self.regions = regions_for_geolocation(&self.geoloc).to_vec();
        self
    }
}

pub async fn get_flavor(
    client: &dyn ApiClient,
    project: &str,
    name: &str,
    region: &str,
) -> Result<Flavor> {
    let flavors: Vec<Flavor> = client
        .get(&format!("/cloud/project/{}/flavor", project))
        .await?;

    flavors
        .into_iter()
        .find(|f| f.name == name && f.region == region && f.available)
        .ok_or_else(|| {
            CloudError::resolution(
                "flavor",
                format!("name {:?} in region {} (project {})", name, region, project),
            )
        })
}

pub async fn get_image(
    client: &dyn ApiClient,
    project: &str,
    name: &str,
    region: &str,
) -> Result<Image> {
    let images: Vec<Image> = client
        .get(&format!("/cloud/project/{}/image?region={}", project, region))
        .await?;

    images
        .into_iter()
        .find(|i| i.name == name && i.status == "active")
        .ok_or_else(|| {
            CloudError::resolution(
                "image",
                format!("name {:?} in region {} (project {})", name, region, project),
            )
        })
}

pub async fn get_instance(client: &dyn ApiClient, project: &str, instance_id: &str) -> Result<Instance> {
    client
        .get(&format!("/cloud/project/{}/instance/{}", project, instance_id))
        .await
}

pub async fn failover_ip_by_id(client: &dyn ApiClient, project: &str, ip_id: &str) -> Result<FailoverIp> {
    let endpoint = format!("/cloud/project/{}/ip/failover/{}", project, ip_id);
    match client.get::<FailoverIp>(&endpoint).await {
        Ok(ip) => Ok(ip.with_regions()),
        Err(e) if e.is_not_found() => Err(CloudError::resolution(
            "failover IP",
            format!("id {} (project {})", ip_id, project),
        )),
        Err(e) => Err(e),
    }
}

pub async fn failover_ip_by_address(
    client: &dyn ApiClient,
    project: &str,
    address: &str,
) -> Result<FailoverIp> {
    let ips: Vec<FailoverIp> = client
        .get(&format!("/cloud/project/{}/ip/failover", project))
        .await?;

    ips.into_iter()
        .find(|ip| ip.ip == address)
        .map(FailoverIp::with_regions)
        .ok_or_else(|| {
            CloudError::resolution(
                "failover IP",
                format!("address {} (project {})", address, project),
            )
        })
}

/// Resolve the failover IP named by `ip_id` or, failing that, `ip_address`
pub async fn failover_ip_from_descriptor(
    client: &dyn ApiClient,
    project: &str,
    data: &ResourceData,
) -> Result<FailoverIp> {
    if let Some(ip_id) = data.get_str("ip_id") {
        return failover_ip_by_id(client, project, ip_id).await;
    }
    if let Some(address) = data.get_str("ip_address") {
        return failover_ip_by_address(client, project, address).await;
    }
    Err(CloudError::Validation(
        "one of ip_id or ip_address must be set".to_string(),
    ))
}
