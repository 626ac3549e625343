//! Public cloud project users (`ovh_publiccloud_user`)
//!
//! The password is only returned by the creation call and is kept in the
//! descriptor as given then.

use super::{TRANSIENT_RETRIES, delete_if_exists, wait_until_gone};
use crate::provider::OvhProvider;
use async_trait::async_trait;
use ovhflow_cloud::{Reconciler, Refresh, ResourceData, Result, StateChangeConf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DELAY: Duration = Duration::from_secs(10);
const MIN_INTERVAL: Duration = Duration::from_secs(3);

pub struct CloudUser;

#[derive(Debug, Serialize)]
struct CreateUserRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: i64,
    #[serde(default)]
    username: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    creation_date: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

fn endpoint(project: &str, user_id: &str) -> String {
    format!("/cloud/project/{}/user/{}", project, user_id)
}

fn conf(subject: String) -> StateChangeConf {
    StateChangeConf::new(subject)
        .with_timeout(TIMEOUT)
        .with_delay(DELAY)
        .with_min_interval(MIN_INTERVAL)
        .with_transient_retries(TRANSIENT_RETRIES)
}

#[async_trait]
impl Reconciler for CloudUser {
    type Context = OvhProvider;

    fn resource_type(&self) -> &'static str {
        "ovh_publiccloud_user"
    }

    async fn create(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let client = ctx.client();

        let request = CreateUserRequest {
            description: data.get_str("description"),
        };
        let created: User = client
            .post(&format!("/cloud/project/{}/user", project), &request)
            .await?;
        let user_id = created.id.to_string();

        data.set("project_id", project.as_str());
        data.set("user_id", user_id.as_str());
        data.set_opt("password", created.password);

        let endpoint = endpoint(&project, &user_id);
        let endpoint = endpoint.as_str();
        let poll = conf(format!("user {} (project {})", user_id, project))
            .with_pending(&["creating"])
            .with_target(&["ok"]);
        poll.wait_for_state(move || async move {
            let user: User = client.get(endpoint).await?;
            Ok(Refresh::new((), user.status))
        })
        .await
        .map_err(|e| e.after_mutation(poll.subject()))?;

        data.set_id(format!("ovh_cloud_project_{}_user_{}", project, user_id))?;
        self.read(ctx, data)
            .await
            .map_err(|e| e.after_mutation(poll.subject()))
    }

    async fn read(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let user_id = data.require_str("user_id")?;

        let user: User = ctx.client().get(&endpoint(&project, &user_id)).await?;
        data.set("username", user.username);
        data.set("status", user.status);
        data.set_opt("description", user.description);
        data.set_opt("creation_date", user.creation_date);
        Ok(())
    }

    async fn delete(&self, ctx: &OvhProvider, data: &mut ResourceData) -> Result<()> {
        let project = ctx.project(data, "project_id")?;
        let user_id = data.require_str("user_id")?;
        let client = ctx.client();
        let endpoint = endpoint(&project, &user_id);

        if delete_if_exists::<Value>(client, &endpoint).await?.is_none() {
            return Ok(());
        }
        wait_until_gone(
            client,
            &endpoint,
            "deleted",
            conf(format!("user {} deletion (project {})", user_id, project)),
        )
        .await?;
        data.remove("password");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovhflow_cloud::testing::StubApiClient;
    use ovhflow_cloud::{ApiError, Method, create_resource, delete_resource};
    use serde_json::json;
    use std::sync::Arc;

    const USER: &str = "/cloud/project/p1/user/9001";

    fn user(status: &str) -> Value {
        json!({
            "id": 9001,
            "username": "user-abc",
            "status": status,
            "description": "ci",
            "creationDate": "2026-10-17T08:00:00Z",
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_keeps_password() {
        let stub = Arc::new(StubApiClient::new());
        let mut created = user("creating");
        created["password"] = json!("s3cret");
        stub.ok(Method::Post, "/cloud/project/p1/user", created)
            .ok(Method::Get, USER, user("creating"))
            .ok(Method::Get, USER, user("ok"));

        let provider = OvhProvider::new(stub.clone()).with_default_project("p1");
        let mut data = ResourceData::new().with("description", "ci");
        create_resource(&CloudUser, &provider, &mut data).await.unwrap();

        assert_eq!(data.id(), Some("ovh_cloud_project_p1_user_9001"));
        assert_eq!(data.get_str("password"), Some("s3cret"));
        assert_eq!(data.get_str("username"), Some("user-abc"));
        assert_eq!(data.get_str("status"), Some("ok"));
        assert_eq!(stub.calls()[0].body, Some(json!({"description": "ci"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_for_not_found() {
        let stub = Arc::new(StubApiClient::new());
        stub.ok(Method::Delete, USER, Value::Null)
            .ok(Method::Get, USER, user("deleting"))
            .fail(Method::Get, USER, ApiError::not_found("user gone"));

        let provider = OvhProvider::new(stub.clone());
        let mut data = ResourceData::new()
            .with("project_id", "p1")
            .with("user_id", "9001")
            .with("password", "s3cret");
        data.set_id("ovh_cloud_project_p1_user_9001").unwrap();
        delete_resource(&CloudUser, &provider, &mut data).await.unwrap();

        assert_eq!(stub.count(Method::Get, USER), 2);
        assert_eq!(data.id(), None);
        assert_eq!(data.get_str("password"), None);
    }
}
