//! OVH provider error types

use ovhflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OvhError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

impl From<OvhError> for CloudError {
    fn from(err: OvhError) -> Self {
        match err {
            OvhError::Cloud(inner) => inner,
            other => CloudError::InvalidConfig(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OvhError>;
