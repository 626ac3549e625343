//! OVH provider for ovhflow
//!
//! This crate implements [`ovhflow_cloud::Reconciler`] for OVH public cloud
//! resources and provides the signed HTTP client they talk through.
//!
//! # Resources
//!
//! - `ovh_cloud_instance`, `ovh_cloud_volume`
//! - `ovh_ip_loadbalancing_backend`
//! - `ovh_publiccloud_failover_ip`
//! - `ovh_publiccloud_private_network`, `ovh_publiccloud_private_network_subnet`
//! - `ovh_publiccloud_user`
//! - `ovh_vrack_publiccloud_attachment`
//!
//! # Requirements
//!
//! - `OVH_ENDPOINT` (`ovh-eu`, `ovh-ca`, ... or a URL)
//! - `OVH_APPLICATION_KEY`, `OVH_APPLICATION_SECRET`, `OVH_CONSUMER_KEY`
//! - optionally `OVH_PUBLIC_CLOUD_PROJECT_ID` as the default project
//!
//! # Example
//!
//! ```ignore
//! use ovhflow_cloud::ResourceData;
//! use ovhflow_cloud_ovh::{OvhConfig, OvhProvider};
//!
//! let provider = OvhProvider::from_config(&OvhConfig::from_env()?)?;
//!
//! let mut volume = ResourceData::new()
//!     .with("project", "0123456789abcdef")
//!     .with("region", "GRA1")
//!     .with("type", "classic")
//!     .with("name", "data")
//!     .with("size", 20i64);
//! provider.create("ovh_cloud_volume", &mut volume).await?;
//! println!("{:?} is {:?}", volume.id(), volume.get_str("status"));
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lookup;
pub mod provider;
pub mod regions;
pub mod resources;
pub mod task;

pub use client::OvhClient;
pub use config::OvhConfig;
pub use error::{OvhError, Result};
pub use provider::OvhProvider;
pub use regions::regions_for_geolocation;
