//! Signed HTTP client for the OVH API
//!
//! Every request carries the application key, the consumer key, a
//! timestamp aligned on the server clock and a SHA-1 signature over the
//! whole request. The server clock offset is fetched once from
//! `/auth/time` and reused afterwards.

use crate::config::OvhConfig;
use crate::error::Result;
use async_trait::async_trait;
use ovhflow_cloud::{ApiClient, ApiError, Method};
use serde::Deserialize;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tokio::sync::OnceCell;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const QUERY_ID_HEADER: &str = "X-Ovh-QueryID";

/// OVH API client
pub struct OvhClient {
    http: reqwest::Client,
    base_url: String,
    application_key: String,
    application_secret: String,
    consumer_key: String,
    /// Server time minus local time, in seconds
    time_delta: OnceCell<i64>,
}

/// Error body returned by the API on non-success answers
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl OvhClient {
    pub fn new(config: &OvhConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("ovhflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            application_key: config.application_key.clone(),
            application_secret: config.application_secret.clone(),
            consumer_key: config.consumer_key.clone(),
            time_delta: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn time_delta(&self) -> std::result::Result<i64, ApiError> {
        self.time_delta
            .get_or_try_init(|| async {
                let url = self.url("/auth/time");
                let response = self
                    .http
                    .get(&url)
                    .header("X-Ovh-Application", &self.application_key)
                    .send()
                    .await
                    .map_err(|e| ApiError::transport(format!("fetching server time: {}", e)))?;
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|e| ApiError::transport(format!("reading server time: {}", e)))?;
                if !status.is_success() {
                    return Err(ApiError::status(
                        status.as_u16(),
                        format!("fetching server time: {}", text.trim()),
                    ));
                }
                let server_time: i64 = text.trim().parse().map_err(|_| {
                    ApiError::invalid_response(format!("server time {:?} is not a number", text))
                })?;
                let delta = server_time - chrono::Utc::now().timestamp();
                tracing::debug!(delta, "Synchronized with API server clock");
                Ok::<i64, ApiError>(delta)
            })
            .await
            .copied()
    }
}

/// Compute the `X-Ovh-Signature` header value
pub fn signature(
    application_secret: &str,
    consumer_key: &str,
    method: Method,
    url: &str,
    body: &str,
    timestamp: &str,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(
        format!(
            "{}+{}+{}+{}+{}+{}",
            application_secret,
            consumer_key,
            method.as_str(),
            url,
            body,
            timestamp
        )
        .as_bytes(),
    );
    format!("$1${}", hex::encode(hasher.finalize()))
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl ApiClient for OvhClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, ApiError> {
        let url = self.url(path);
        let body = match body {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        let timestamp = (chrono::Utc::now().timestamp() + self.time_delta().await?).to_string();
        let signature = signature(
            &self.application_secret,
            &self.consumer_key,
            method,
            &url,
            &body,
            &timestamp,
        );

        let mut request = self
            .http
            .request(http_method(method), &url)
            .header("X-Ovh-Application", &self.application_key)
            .header("X-Ovh-Consumer", &self.consumer_key)
            .header("X-Ovh-Timestamp", &timestamp)
            .header("X-Ovh-Signature", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let status = response.status();
        let query_id = response
            .headers()
            .get(QUERY_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(format!("reading response body: {}", e)))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text)
                .map_err(|e| ApiError::invalid_response(format!("response is not JSON: {}", e)));
        }

        let parsed: Option<ErrorBody> = serde_json::from_str(&text).ok();
        let (class, message) = match parsed {
            Some(ErrorBody { class, message }) => (class, message),
            None => (None, None),
        };
        let message = message.unwrap_or_else(|| {
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text.trim().to_string()
            }
        });

        Err(ApiError {
            status: Some(status.as_u16()),
            class,
            message,
            query_id,
        })
    }
}
