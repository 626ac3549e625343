//! Cloud provider error types

use crate::api::ApiError;
use std::time::Duration;
use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// A named lookup (flavor, image, failover IP, ...) matched nothing.
    #[error("No {kind} found matching {selector}")]
    Resolution { kind: String, selector: String },

    /// Transport failure or non-success response from the remote API.
    #[error("calling {endpoint}: {source}")]
    RemoteCall {
        endpoint: String,
        #[source]
        source: ApiError,
    },

    /// The remote object did not reach its target state.
    #[error("{subject} did not converge: {reason}")]
    Convergence {
        subject: String,
        #[source]
        reason: ConvergenceError,
    },

    /// Descriptor values that are missing or incompatible with each other.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource type not found: {0}")]
    UnknownResourceType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a poll loop gave up
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceError {
    #[error("timed out after {elapsed:?} waiting for {target:?} (last state: {})", last_state.as_deref().unwrap_or("none"))]
    Timeout {
        target: Vec<String>,
        last_state: Option<String>,
        elapsed: Duration,
    },

    #[error("unexpected state {state:?}, wanted one of {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    #[error("reached failure state {state:?}")]
    FailureState { state: String },

    /// A call made after the creating request went through failed.
    #[error("interrupted by a failed call to {endpoint}: {source}")]
    Interrupted {
        endpoint: String,
        #[source]
        source: ApiError,
    },
}

impl CloudError {
    pub fn remote(endpoint: impl Into<String>, source: ApiError) -> Self {
        CloudError::RemoteCall {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn resolution(kind: impl Into<String>, selector: impl Into<String>) -> Self {
        CloudError::Resolution {
            kind: kind.into(),
            selector: selector.into(),
        }
    }

    /// Report a failure that happened once the remote object already exists.
    ///
    /// Remote call failures become [`CloudError::Convergence`] naming
    /// `subject`, so the caller knows there is something left to clean up.
    pub fn after_mutation(self, subject: impl Into<String>) -> Self {
        match self {
            CloudError::RemoteCall { endpoint, source } => CloudError::Convergence {
                subject: subject.into(),
                reason: ConvergenceError::Interrupted { endpoint, source },
            },
            other => other,
        }
    }

    /// True when the remote API answered "not found" (HTTP 404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::RemoteCall { source, .. } if source.is_not_found())
    }

    /// True for transport failures and 5xx answers
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::RemoteCall { source, .. } if source.is_transient())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CloudError::Convergence {
                reason: ConvergenceError::Timeout { .. },
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = CloudError::remote("/cloud/project/p/instance/i", ApiError::not_found("gone"));
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());
        assert!(!not_found.is_timeout());

        let unavailable = CloudError::remote("/x", ApiError::status(503, "maintenance"));
        assert!(unavailable.is_transient());
        assert!(!unavailable.is_not_found());

        let timeout = CloudError::Convergence {
            subject: "instance abc".to_string(),
            reason: ConvergenceError::Timeout {
                target: vec!["ACTIVE".to_string()],
                last_state: Some("BUILD".to_string()),
                elapsed: Duration::from_secs(900),
            },
        };
        assert!(timeout.is_timeout());
        assert!(timeout.to_string().contains("instance abc"));
        assert!(timeout.to_string().contains("BUILD"));
    }

    #[test]
    fn test_after_mutation_keeps_cause() {
        let err = CloudError::remote("/cloud/project/p/volume/v-1", ApiError::status(503, "busy"))
            .after_mutation("volume v-1 (project p)");

        assert!(matches!(
            &err,
            CloudError::Convergence {
                reason: ConvergenceError::Interrupted { endpoint, source },
                ..
            } if endpoint == "/cloud/project/p/volume/v-1" && source.status == Some(503)
        ));
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("volume v-1"));
        assert!(std::error::Error::source(&err).is_some());

        // local failures stay as they are
        let validation = CloudError::Validation("bad".to_string()).after_mutation("volume v-1");
        assert!(matches!(validation, CloudError::Validation(_)));
    }

    #[test]
    fn test_remote_call_message_names_endpoint() {
        let err = CloudError::remote("/ip/loadBalancing/lb-1/backend", ApiError::status(400, "bad probe"));
        let message = err.to_string();
        assert!(message.contains("/ip/loadBalancing/lb-1/backend"));
        assert!(message.contains("bad probe"));
    }
}
