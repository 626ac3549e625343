//! Remote API client abstraction
//!
//! Reconcilers never talk HTTP directly. They go through [`ApiClient`],
//! which moves JSON values to and from templated REST endpoints. The typed
//! helpers on `dyn ApiClient` attach the endpoint to every failure so that
//! errors surfaced to the orchestrator say which call went wrong.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const INVALID_RESPONSE: &str = "InvalidResponse";

/// HTTP verbs used against the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an [`ApiClient`]
///
/// `status` is `None` when the request never produced an HTTP answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct ApiError {
    pub status: Option<u16>,
    pub class: Option<String>,
    pub message: String,
    pub query_id: Option<String>,
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            class: None,
            message: message.into(),
            query_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(404, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            class: None,
            message: message.into(),
            query_id: None,
        }
    }

    /// A 2xx answer whose body did not decode into the expected shape
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            class: Some(INVALID_RESPONSE.to_string()),
            ..Self::transport(message)
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_transient(&self) -> bool {
        match self.status {
            None => self.class.as_deref() != Some(INVALID_RESPONSE),
            Some(code) => code >= 500,
        }
    }

    fn describe(&self) -> String {
        let mut out = match self.status {
            Some(code) => format!("HTTP {}", code),
            None => "transport error".to_string(),
        };
        if let Some(class) = &self.class {
            out.push_str(&format!(" {}", class));
        }
        out.push_str(&format!(": {}", self.message));
        if let Some(query_id) = &self.query_id {
            out.push_str(&format!(" (query id {})", query_id));
        }
        out
    }
}

/// Authenticated transport to the provider's REST API
///
/// Implementations must be safe to share between concurrent reconciler
/// calls; connection pooling and rate limiting are their own business.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, ApiError>;
}

impl<'a> dyn ApiClient + 'a {
    /// GET `path` and decode the answer
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.send(Method::Get, path, None).await?;
        decode(path, value)
    }

    /// POST `body` to `path` and decode the answer
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let value = self.send(Method::Post, path, Some(body)).await?;
        decode(path, value)
    }

    /// DELETE `path` and decode the answer
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.send(Method::Delete, path, None).await?;
        decode(path, value)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        tracing::debug!(%method, path, "Calling remote API");
        self.call(method, path, body).await.map_err(|e| {
            tracing::debug!(%method, path, error = %e, "Remote API call failed");
            CloudError::remote(path, e)
        })
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        CloudError::remote(
            path,
            ApiError::invalid_response(format!("unexpected response body: {}", e)),
        )
    })
}
