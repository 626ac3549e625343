//! Provider configuration
//!
//! Credentials come from explicit values or from the `OVH_*` environment
//! variables. The endpoint may be a full URL or one of the well-known
//! aliases (`ovh-eu`, `ovh-ca`, ...).

use crate::error::{OvhError, Result};

/// Well-known API endpoints
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("ovh-eu", "https://eu.api.ovh.com/1.0"),
    ("ovh-ca", "https://ca.api.ovh.com/1.0"),
    ("ovh-us", "https://api.us.ovhcloud.com/1.0"),
    ("kimsufi-eu", "https://eu.api.kimsufi.com/1.0"),
    ("kimsufi-ca", "https://ca.api.kimsufi.com/1.0"),
    ("soyoustart-eu", "https://eu.api.soyoustart.com/1.0"),
    ("soyoustart-ca", "https://ca.api.soyoustart.com/1.0"),
];

pub const ENV_ENDPOINT: &str = "OVH_ENDPOINT";
pub const ENV_APPLICATION_KEY: &str = "OVH_APPLICATION_KEY";
pub const ENV_APPLICATION_SECRET: &str = "OVH_APPLICATION_SECRET";
pub const ENV_CONSUMER_KEY: &str = "OVH_CONSUMER_KEY";
pub const ENV_PROJECT_ID: &str = "OVH_PUBLIC_CLOUD_PROJECT_ID";

/// Configuration for the OVH API client
#[derive(Clone, Default)]
pub struct OvhConfig {
    pub endpoint: String,
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
    /// Public cloud project used when a descriptor does not name one
    pub default_project: Option<String>,
}

impl std::fmt::Debug for OvhConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OvhConfig")
            .field("endpoint", &self.endpoint)
            .field("application_key", &self.application_key)
            .field("application_secret", &"<redacted>")
            .field("consumer_key", &"<redacted>")
            .field("default_project", &self.default_project)
            .finish()
    }
}

impl OvhConfig {
    /// Create OvhConfig from environment variables
    ///
    /// `OVH_ENDPOINT` is required; the credentials default to empty and are
    /// checked by [`OvhConfig::validate`].
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(ENV_ENDPOINT)
            .map_err(|_| OvhError::MissingEnvVar(ENV_ENDPOINT.to_string()))?;

        Ok(Self {
            endpoint,
            application_key: std::env::var(ENV_APPLICATION_KEY).unwrap_or_default(),
            application_secret: std::env::var(ENV_APPLICATION_SECRET).unwrap_or_default(),
            consumer_key: std::env::var(ENV_CONSUMER_KEY).unwrap_or_default(),
            default_project: std::env::var(ENV_PROJECT_ID).ok().filter(|p| !p.is_empty()),
        })
    }

    /// Base URL of the API, with aliases expanded
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim();
        ENDPOINTS
            .iter()
            .find(|(alias, _)| *alias == endpoint)
            .map(|(_, url)| url.to_string())
            .unwrap_or_else(|| endpoint.trim_end_matches('/').to_string())
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url();
        if base_url.is_empty() {
            return Err(OvhError::InvalidConfig("endpoint must be set".to_string()));
        }
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(OvhError::InvalidConfig(format!(
                "unknown endpoint {:?}, expected a URL or one of: {}",
                self.endpoint,
                ENDPOINTS
                    .iter()
                    .map(|(alias, _)| *alias)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        if self.application_key.is_empty() || self.application_secret.is_empty() {
            return Err(OvhError::InvalidConfig(
                "application key and application secret are required".to_string(),
            ));
        }
        if self.consumer_key.is_empty() {
            tracing::warn!("No consumer key configured, authenticated calls will be rejected");
        }
        Ok(())
    }
}
