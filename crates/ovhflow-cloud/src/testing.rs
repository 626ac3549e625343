//! Scripted [`ApiClient`] for tests
//!
//! Responses are queued per `(method, path)`. Each call pops the next one;
//! the last queued response keeps being answered once the queue is down to
//! a single entry, which makes "pending, pending, then done" sequences easy
//! to express. Every call is recorded.

use crate::api::{ApiClient, ApiError, Method};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A call seen by [`StubApiClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

type Route = (Method, String);

#[derive(Default)]
pub struct StubApiClient {
    routes: Mutex<HashMap<Route, VecDeque<Result<Value, ApiError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer
    pub fn ok(&self, method: Method, path: &str, body: Value) -> &Self {
        self.push(method, path, Ok(body))
    }

    /// Queue a failure
    pub fn fail(&self, method: Method, path: &str, error: ApiError) -> &Self {
        self.push(method, path, Err(error))
    }

    fn push(&self, method: Method, path: &str, response: Result<Value, ApiError>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made to `(method, path)`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Number of POST and DELETE calls
    pub fn mutations(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method != Method::Get)
            .count()
    }
}

#[async_trait]
impl ApiClient for StubApiClient {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(method, path.to_string())) else {
            return Err(ApiError::status(
                501,
                format!("no stubbed response for {} {}", method, path),
            ));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Err(ApiError::transport("empty queue")))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ApiError::transport("empty queue")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_queue_repeats_last_answer() {
        let stub = StubApiClient::new();
        stub.ok(Method::Get, "/a", json!(1)).ok(Method::Get, "/a", json!(2));

        assert_eq!(stub.call(Method::Get, "/a", None).await.unwrap(), json!(1));
        assert_eq!(stub.call(Method::Get, "/a", None).await.unwrap(), json!(2));
        assert_eq!(stub.call(Method::Get, "/a", None).await.unwrap(), json!(2));
        assert!(stub.call(Method::Post, "/a", None).await.is_err());

        assert_eq!(stub.count(Method::Get, "/a"), 3);
        assert_eq!(stub.mutations(), 1);
    }
}
